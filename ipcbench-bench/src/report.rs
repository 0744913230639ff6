//! Transfer report.

use ipcbench_core::{
    Mechanism, PayloadSize, Result as CoreResult, Timestamp, TransferSession, format_elapsed,
};
use std::fmt;

/// Outcome of one completed transfer, as seen by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    /// Mechanism used.
    pub mechanism: Mechanism,
    /// Payload size.
    pub payload: PayloadSize,
    /// Messages transferred.
    pub messages: usize,
    /// Start timestamp published by the producer.
    pub start: Timestamp,
    /// End timestamp recorded by the consumer.
    pub end: Timestamp,
    /// Elapsed time in seconds.
    pub duration_secs: f64,
}

impl TransferReport {
    /// Builds the report of a session with both timestamps recorded.
    ///
    /// # Errors
    /// Returns [`ipcbench_core::Error::IncompleteSession`] if a timestamp is
    /// missing and [`ipcbench_core::Error::NegativeDuration`] if the end
    /// precedes the start.
    pub fn from_session(session: &TransferSession) -> CoreResult<Self> {
        let duration_secs = session.elapsed_secs()?;
        let (Some(start), Some(end)) = (session.start(), session.end()) else {
            return Err(ipcbench_core::Error::IncompleteSession {
                missing: "timestamp",
            });
        };
        Ok(Self {
            mechanism: session.mechanism(),
            payload: session.payload(),
            messages: session.payload().message_count(),
            start,
            end,
            duration_secs,
        })
    }

    /// Returns bytes transferred.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.payload.bytes()
    }

    /// Returns messages per second.
    #[must_use]
    pub fn messages_per_second(&self) -> f64 {
        self.messages as f64 / self.duration_secs
    }

    /// Returns megabytes per second.
    #[must_use]
    pub fn mb_per_second(&self) -> f64 {
        self.bytes() as f64 / (1024.0 * 1024.0) / self.duration_secs
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_elapsed(self.duration_secs))
    }
}
