//! Storage infrastructure: configuration file persistence and the result
//! sink that stores correlated analyzer results.
//!
//! - `config`      – reads and writes the TOML configuration file, falling
//!   back to defaults when it does not exist yet.
//! - `result_sink` – appends each stored result to a JSON-lines file.

pub mod config;
pub mod result_sink;
