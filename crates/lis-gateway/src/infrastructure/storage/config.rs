//! TOML-based configuration for the gateway.
//!
//! The file is located by the `--config` command-line option (or the
//! `LIS_GATEWAY_CONFIG` environment variable); when it does not exist the
//! gateway runs on defaults.
//!
//! ```toml
//! [gateway]
//! client_name = "Ruby_01"
//! log_level = "info"
//! ack_policy = "every_chunk"
//! terminator_policy = "ignore"
//!
//! [link]
//! baud_rate = 9600
//! parity = "none"
//! data_bits = 8
//! stop_bits = "one"
//!
//! [discovery]
//! poll_interval_ms = 5000
//!
//! [simulation]
//! enabled = false
//! port_name = "SIMCOM1"
//!
//! [sink]
//! path = "results.jsonl"
//! ```
//!
//! # Serde default values
//!
//! Every section and every field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` take the return value of `some_fn()` when
//! absent, so a partial file only overrides what it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lis_core::LinkConfig;

use crate::application::assemble_frames::AckPolicy;
use crate::application::dispatch_records::{DispatcherConfig, TerminatorPolicy, DEFAULT_CLIENT_NAME};
use crate::infrastructure::transport::simulated::DEFAULT_SIMULATED_PORT_NAME;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The TOML parsed but holds a value the gateway cannot run with.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level gateway configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub sink: SinkSection,
}

/// Identity and protocol behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySection {
    /// Written into every stored result.
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ack_policy: AckPolicy,
    #[serde(default)]
    pub terminator_policy: TerminatorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySection {
    /// How often the host's serial ports are re-enumerated.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Built-in analyzer simulator for running without hardware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_simulated_port_name")]
    pub port_name: String,
    /// Delay before each transmission starts.
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,
    /// Delay between the ENQ, message and EOT chunks.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    /// Pause after a transmission before the next may start.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkSection {
    /// JSON-lines file results are appended to.
    #[serde(default = "default_sink_path")]
    pub path: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval_ms() -> u64 {
    5_000
}
fn default_simulated_port_name() -> String {
    DEFAULT_SIMULATED_PORT_NAME.to_string()
}
fn default_start_delay_ms() -> u64 {
    2_000
}
fn default_chunk_delay_ms() -> u64 {
    500
}
fn default_cooldown_ms() -> u64 {
    30_000
}
fn default_sink_path() -> PathBuf {
    PathBuf::from("results.jsonl")
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            log_level: default_log_level(),
            ack_policy: AckPolicy::default(),
            terminator_policy: TerminatorPolicy::default(),
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port_name: default_simulated_port_name(),
            start_delay_ms: default_start_delay_ms(),
            chunk_delay_ms: default_chunk_delay_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            path: default_sink_path(),
        }
    }
}

impl GatewayConfig {
    /// Rejects values that parse but cannot drive the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "discovery.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            client_name: self.gateway.client_name.clone(),
            terminator_policy: self.gateway.terminator_policy,
        }
    }
}

impl DiscoverySection {
    /// The sweep period, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `GatewayConfig` from `path`, returning `GatewayConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value fails [`GatewayConfig::validate`].
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: GatewayConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GatewayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &GatewayConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lis_core::{DataBits, Parity, StopBits};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("lis_gateway_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_default_config_matches_documented_values() {
        // Arrange / Act
        let cfg = GatewayConfig::default();

        // Assert
        assert_eq!(cfg.gateway.client_name, "Ruby_01");
        assert_eq!(cfg.gateway.log_level, "info");
        assert_eq!(cfg.gateway.ack_policy, AckPolicy::EveryChunk);
        assert_eq!(cfg.gateway.terminator_policy, TerminatorPolicy::Ignore);
        assert_eq!(cfg.link, LinkConfig::default());
        assert_eq!(cfg.discovery.poll_interval(), Duration::from_secs(5));
        assert!(!cfg.simulation.enabled);
        assert_eq!(cfg.simulation.port_name, "SIMCOM1");
        assert_eq!(cfg.sink.path, PathBuf::from("results.jsonl"));
    }

    #[test]
    fn test_load_config_rejects_zero_poll_interval() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("gateway.toml");
        std::fs::write(&path, "[discovery]\npoll_interval_ms = 0\n").expect("write");

        // Act
        let result = load_config(&path);

        // Assert
        match result {
            Err(ConfigError::Invalid { field, .. }) => {
                assert_eq!(field, "discovery.poll_interval_ms")
            }
            other => panic!("expected Invalid, got {other:?}"),
        }

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_poll_interval_is_never_zero() {
        let section = DiscoverySection { poll_interval_ms: 0 };
        assert_eq!(section.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: GatewayConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, GatewayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[gateway]
client_name = "Ruby_02"
ack_policy = "skip_end_of_transmission"
terminator_policy = "discard_on_abort"

[link]
baud_rate = 19200
parity = "even"
data_bits = 7
stop_bits = "two"

[simulation]
enabled = true
"#;

        // Act
        let cfg: GatewayConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.gateway.client_name, "Ruby_02");
        assert_eq!(cfg.gateway.log_level, "info");
        assert_eq!(cfg.gateway.ack_policy, AckPolicy::SkipEndOfTransmission);
        assert_eq!(cfg.gateway.terminator_policy, TerminatorPolicy::DiscardOnAbort);
        assert_eq!(cfg.link.baud_rate, 19_200);
        assert_eq!(cfg.link.parity, Parity::Even);
        assert_eq!(cfg.link.data_bits, DataBits::Seven);
        assert_eq!(cfg.link.stop_bits, StopBits::Two);
        assert!(cfg.simulation.enabled);
        assert_eq!(cfg.simulation.chunk_delay_ms, 500);
    }

    #[test]
    fn test_invalid_data_bits_is_a_parse_error() {
        let result: Result<GatewayConfig, _> = toml::from_str("[link]\ndata_bits = 9\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_ack_policy_is_a_parse_error() {
        let result: Result<GatewayConfig, _> = toml::from_str("[gateway]\nack_policy = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_dispatcher_config_takes_gateway_section() {
        let mut cfg = GatewayConfig::default();
        cfg.gateway.client_name = "Ruby_07".to_string();
        cfg.gateway.terminator_policy = TerminatorPolicy::DiscardOnAbort;

        let dispatcher = cfg.dispatcher_config();

        assert_eq!(dispatcher.client_name, "Ruby_07");
        assert_eq!(dispatcher.terminator_policy, TerminatorPolicy::DiscardOnAbort);
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        // Arrange
        let path = temp_dir().join("missing.toml");

        // Act
        let cfg = load_config(&path).expect("missing file is not an error");

        // Assert
        assert_eq!(cfg, GatewayConfig::default());
    }

    #[test]
    fn test_load_config_reports_malformed_toml() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("gateway.toml");
        let mut cfg = GatewayConfig::default();
        cfg.gateway.log_level = "debug".to_string();
        cfg.link.baud_rate = 115_200;
        cfg.sink.path = PathBuf::from("/var/lib/lis/results.jsonl");

        // Act
        save_config(&path, &cfg).expect("save creates parent directories");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
