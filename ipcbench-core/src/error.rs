//! Error types for ipcbench core operations.

use thiserror::Error;

/// Core error type for configuration and timing failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Mechanism selector outside `0..=3`.
    #[error("invalid mechanism selector {value}: expected 0 (anonymous pipe), 1 (named pipe), 2 (socket) or 3 (shared memory)")]
    InvalidMechanism {
        /// Selector received.
        value: i64,
    },

    /// Payload size outside `1..=max` size-units.
    #[error("payload size {size} out of range: expected 1..={max} size-units")]
    PayloadOutOfRange {
        /// Requested size in size-units.
        size: i64,
        /// Maximum accepted size.
        max: u32,
    },

    /// Command-line value that is not a number or a known name.
    #[error("cannot parse {what} from {text:?}")]
    Unparsable {
        /// Which value was being parsed.
        what: &'static str,
        /// Offending text.
        text: String,
    },

    /// Consumer end timestamp precedes the producer start timestamp.
    #[error("negative transfer duration: start {start_ms} ms is after end {end_ms} ms")]
    NegativeDuration {
        /// Producer start timestamp in milliseconds.
        start_ms: f64,
        /// Consumer end timestamp in milliseconds.
        end_ms: f64,
    },

    /// Timestamp text could not be parsed.
    #[error("invalid timestamp text: {text:?}")]
    InvalidTimestamp {
        /// Offending text.
        text: String,
    },

    /// Ring buffer capacity too small to hold a message next to the guard slot,
    /// or too large for a semaphore count.
    #[error("invalid ring capacity {capacity}: expected 2..=2147483647 slots")]
    InvalidCapacity {
        /// Requested capacity in slots.
        capacity: usize,
    },

    /// A session was asked for its duration before both timestamps were recorded.
    #[error("transfer session incomplete: missing {missing} timestamp")]
    IncompleteSession {
        /// Which timestamp is missing.
        missing: &'static str,
    },
}

impl Error {
    /// Returns true for errors caused by bad user input, rejected before any
    /// transport resource is created.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidMechanism { .. }
                | Self::PayloadOutOfRange { .. }
                | Self::Unparsable { .. }
                | Self::InvalidCapacity { .. }
        )
    }
}

/// Result type alias for ipcbench core operations.
pub type Result<T> = std::result::Result<T, Error>;
