//! Endpoint status and serial link settings.
//!
//! An *endpoint* is one byte-stream channel the gateway can listen on: a
//! physical serial device such as `/dev/ttyUSB0` or `COM3`, or the simulated
//! port used in development.  Endpoints are identified by name only; the
//! types here describe their observable state and how the line is clocked.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Observable state of an endpoint.
///
/// Transitions are driven by the transport implementation:
///
/// ```text
/// Offline ──open──► Connected ──read──► ReadingData
///    ▲                  │  ▲                 │
///    └──────close───────┘  └──────write──► WritingData
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    /// Open and idle.
    Connected,
    /// A read is in progress or data has just arrived.
    ReadingData,
    /// A write is in progress.
    WritingData,
    /// Closed, or never opened.
    #[default]
    Offline,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PortStatus::Connected => "Connected",
            PortStatus::ReadingData => "Reading Data",
            PortStatus::WritingData => "Writing Data",
            PortStatus::Offline => "Offline",
        };
        f.write_str(label)
    }
}

/// Parity checking mode of a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Number of stop bits terminating each character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Number of data bits per character.
///
/// Serialized as the plain integer (`data_bits = 8`) so configuration files
/// read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

/// Returned when a data-bit count outside 5..=8 is requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported data bit count: {0} (expected 5, 6, 7 or 8)")]
pub struct InvalidDataBits(pub u8);

impl TryFrom<u8> for DataBits {
    type Error = InvalidDataBits;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(InvalidDataBits(other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Serial line settings for an endpoint.
///
/// The defaults (9600 baud, no parity, 8 data bits, 1 stop bit) match the
/// factory configuration of the analyzers this gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub data_bits: DataBits,
    #[serde(default)]
    pub stop_bits: StopBits,
}

fn default_baud_rate() -> u32 {
    9600
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            parity: Parity::default(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
        }
    }
}

impl fmt::Display for LinkConfig {
    /// Formats the settings in the conventional `9600 8N1` notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate,
            u8::from(self.data_bits),
            parity,
            stop
        )
    }
}
