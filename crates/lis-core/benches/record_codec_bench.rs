//! Criterion benchmarks for the LIS2-A record codec.
//!
//! Measures per-line parse and format latency for every record kind, and the
//! cost of converting a full analyzer run (header, patient, order, 35
//! results, terminator) into records.
//!
//! Run with:
//! ```bash
//! cargo bench --package lis-core --bench record_codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lis_core::protocol::{convert_message, records::parse_record, sanitize_transmission};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const LINES: &[(&str, &str)] = &[
    ("Header", r"H|\^&|||40009603A^CDRuby^R5-4H^1.0|||||||P|LIS2-A"),
    ("Patient", "P|1||A56342||David Jones||19640315|M|||||Roberts||Phillips^sickle crisis"),
    ("TestOrder", "O|1|19345||^^^CBC^5^0|||19960810153028||||||||Patient^Human"),
    ("RequestInformation", "Q|1|^ALL"),
    ("Comment", "C|1|I|Order List Add Failed^RecordID|G"),
    ("Results", "R|1|^^^CBC^^^MCHC|33.21|||||F|||19960810082234||40009603A"),
    ("Terminator", "L|1|N"),
];

const ASSAYS: &[&str] = &[
    "WBC", "NEU", "LYM", "MONO", "EOS", "BASO", "RBC", "HGB", "HCT", "MCV", "MCH", "MCHC", "RDW",
    "PLT", "MPV", "PCT", "PDW", "%N", "%L", "%M", "%E", "%B", "DFLT(N)", "DFLT(E)", "DFLT(L)",
    "IG", "BAND", "DFLT(M)", "WBC", "NRBC", "RRBC", "RBC MORPH", "LRI", "URI", "MCHC",
];

/// A raw transmission body as framed by the analyzer: STX, CR-terminated
/// lines, ETX.
fn make_full_run() -> String {
    let mut body = String::from("\u{2}");
    body.push_str("H|\\^&|||40009603A^CDRuby^R5-4H^1.0|||||||P|LIS2-A\r");
    body.push_str("P|1|||||||U|||||||^\r");
    body.push_str("O|1|26804103|8958|^^^CBC^1^1|||||||||||Patient^||||||||||F\r");
    for (i, assay) in ASSAYS.iter().enumerate() {
        body.push_str(&format!(
            "R|{}|^^^CBC^^^{assay}|11.71|||||W||Guest|20231005081747||  71114BG\r",
            i + 1
        ));
    }
    body.push_str("L|1|N\r\u{3}");
    body
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `parse_record` for every record kind.
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_record");
    for (name, line) in LINES {
        group.bench_with_input(BenchmarkId::new("kind", name), line, |b, line| {
            b.iter(|| parse_record(black_box(line)).expect("parse must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks formatting of pre-parsed records.
fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_record");
    for (name, line) in LINES {
        let record = parse_record(line)
            .expect("parse must succeed for benchmark setup")
            .expect("kind must be recognised for benchmark setup");
        group.bench_with_input(BenchmarkId::new("kind", name), &record, |b, record| {
            b.iter(|| black_box(record).to_string())
        });
    }
    group.finish();
}

/// Benchmarks the sanitise + convert path for one complete analyzer run.
fn bench_full_run(c: &mut Criterion) {
    let raw = make_full_run();
    c.bench_function("convert_full_run", |b| {
        b.iter(|| {
            let text = sanitize_transmission(black_box(&raw));
            convert_message(&text)
        })
    });
}

criterion_group!(benches, bench_parse, bench_format, bench_full_run);
criterion_main!(benches);
