//! Transmission-control bytes and in-band text normalisation.
//!
//! # How a transmission looks on the wire (for beginners)
//!
//! ```text
//! analyzer ──ENQ──►  gateway        "I want to send"
//! analyzer ◄──ACK──  gateway
//! analyzer ──text─►  gateway        record lines, possibly wrapped in STX…ETX
//! analyzer ◄──ACK──  gateway
//! analyzer ──EOT──►  gateway        "done"; the gateway processes the message
//! ```
//!
//! The control bytes ENQ, EOT and ACK travel as single-byte chunks.  STX, ETX
//! and CR appear *inside* the text and are normalised away before the message
//! is split into records.

/// Enquiry: the peer is starting a new transmission.
pub const ENQ: u8 = 0x05;
/// End of transmission: the buffered message is complete.
pub const EOT: u8 = 0x04;
/// Acknowledge.  Only ever written, never matched on read.
pub const ACK: u8 = 0x06;
/// Start of text.  Discarded during sanitisation.
pub const STX: u8 = 0x02;
/// End of text.  Converted to a line break during sanitisation.
pub const ETX: u8 = 0x03;
/// Carriage return.  Converted to a line break during sanitisation.
pub const CR: u8 = 0x0D;

/// Line separator emitted in place of ETX and CR.
pub const LINE_SEPARATOR: char = '\n';

/// Normalises the raw text of a completed transmission.
///
/// STX characters are removed entirely; ETX and CR characters are each
/// replaced by a single [`LINE_SEPARATOR`].  All other characters pass
/// through unchanged.
///
/// # Examples
///
/// ```rust
/// use lis_core::protocol::sanitize_transmission;
///
/// let raw = "\u{2}H|\\^&\r\u{3}L|1|N\r";
/// assert_eq!(sanitize_transmission(raw), "H|\\^&\n\nL|1|N\n");
/// ```
pub fn sanitize_transmission(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            c if c == char::from(STX) => {}
            c if c == char::from(ETX) || c == char::from(CR) => out.push(LINE_SEPARATOR),
            c => out.push(c),
        }
    }
    out
}
