//! FrameAssembler: turns raw byte chunks from the active endpoint into
//! complete, sanitised messages.
//!
//! # State machine
//!
//! ```text
//!            ENQ (clear buffer)          data (append)
//!   ┌──────┐ ─────────────────► ┌─────────────┐ ◄──┐
//!   │ Idle │                    │ SessionOpen │ ───┘
//!   └──────┘ ◄───────────────── └─────────────┘
//!            EOT (emit message if buffer non-empty, clear)
//! ```
//!
//! Chunks are compared as whole byte sequences: only a chunk that is exactly
//! `[ENQ]` or exactly `[EOT]` is a control chunk.  Every other chunk is text
//! and is appended to the session buffer, even in `Idle` (which then becomes
//! `SessionOpen`).
//!
//! The assembler is pure: it performs no I/O.  Whether an ACK should be
//! written after a chunk is answered by [`AckPolicy::acknowledges`]; the port
//! registry does the actual write on the active endpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

use lis_core::protocol::{sanitize_transmission, ENQ, EOT};

/// When the gateway answers a received chunk with ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// ACK after every chunk, including ENQ, data and EOT.
    #[default]
    EveryChunk,
    /// ACK after ENQ and data chunks but not after EOT.
    SkipEndOfTransmission,
    /// Never ACK.  For listen-only deployments.
    Disabled,
}

impl AckPolicy {
    pub fn acknowledges(self, outcome: &ChunkOutcome) -> bool {
        match self {
            AckPolicy::EveryChunk => true,
            AckPolicy::SkipEndOfTransmission => !outcome.is_end_of_transmission(),
            AckPolicy::Disabled => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    SessionOpen,
}

/// What a single chunk did to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// ENQ received; the buffer was cleared.
    SessionStarted,
    /// Text was appended to the buffer.
    Appended { bytes: usize },
    /// EOT received with a non-empty buffer; carries the sanitised message.
    MessageCompleted(String),
    /// EOT received with nothing buffered.
    EmptyTransmission,
}

impl ChunkOutcome {
    pub fn is_end_of_transmission(&self) -> bool {
        matches!(
            self,
            ChunkOutcome::MessageCompleted(_) | ChunkOutcome::EmptyTransmission
        )
    }
}

/// Per-endpoint session state: the framing state plus the session buffer.
#[derive(Debug)]
pub struct FrameAssembler {
    state: AssemblerState,
    buffer: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            buffer: String::new(),
        }
    }

    /// Feeds one chunk, exactly as delivered by the transport.
    pub fn push(&mut self, chunk: &[u8]) -> ChunkOutcome {
        match chunk {
            [ENQ] => {
                self.buffer.clear();
                self.state = AssemblerState::SessionOpen;
                debug!("ENQ received, session opened");
                ChunkOutcome::SessionStarted
            }
            [EOT] => {
                self.state = AssemblerState::Idle;
                if self.buffer.is_empty() {
                    debug!("EOT received with an empty buffer, no records");
                    return ChunkOutcome::EmptyTransmission;
                }
                let raw = std::mem::take(&mut self.buffer);
                debug!(bytes = raw.len(), "EOT received, message complete");
                ChunkOutcome::MessageCompleted(sanitize_transmission(&raw))
            }
            data => {
                self.buffer.push_str(&String::from_utf8_lossy(data));
                self.state = AssemblerState::SessionOpen;
                ChunkOutcome::Appended { bytes: data.len() }
            }
        }
    }

    /// Discards any partially buffered transmission and returns to `Idle`.
    ///
    /// Returns the number of buffered bytes that were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.state = AssemblerState::Idle;
        dropped
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
