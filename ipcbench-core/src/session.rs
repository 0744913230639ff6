//! Wall-clock timestamps and per-run transfer sessions.
//!
//! Producer and consumer are separate processes, so elapsed time is computed
//! from two wall-clock readings taken in different address spaces: the
//! producer's start time travels to the consumer through the handshake, the
//! consumer's end time never leaves its process.

use crate::error::{Error, Result};
use crate::mechanism::Mechanism;
use crate::payload::PayloadSize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock instant in whole milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Reads the realtime clock, rounded to the nearest millisecond.
    #[must_use]
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut secs = since_epoch.as_secs();
        let mut millis = (f64::from(since_epoch.subsec_nanos()) / 1.0e6).round() as u64;
        if millis > 999 {
            secs += 1;
            millis = 0;
        }
        Self((secs * 1000 + millis) as f64)
    }

    /// Wraps a millisecond value.
    #[must_use]
    pub const fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    /// Returns the value in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> f64 {
        self.0
    }

    /// Parses the decimal text representation written by [`Timestamp::to_text`].
    ///
    /// Trailing NUL padding and whitespace are ignored.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTimestamp`] if the text is not a finite number.
    pub fn parse_text(text: &str) -> Result<Self> {
        let trimmed = text.trim_end_matches('\0').trim();
        match trimmed.parse::<f64>() {
            Ok(ms) if ms.is_finite() => Ok(Self(ms)),
            _ => Err(Error::InvalidTimestamp {
                text: trimmed.to_string(),
            }),
        }
    }

    /// Decimal text representation carried across the process boundary.
    #[must_use]
    pub fn to_text(&self) -> String {
        format!("{:.6}", self.0)
    }

    /// Seconds elapsed from `self` to `end`.
    ///
    /// # Errors
    /// Returns [`Error::NegativeDuration`] if `end` precedes `self`.
    pub fn seconds_until(&self, end: Timestamp) -> Result<f64> {
        if end.0 < self.0 {
            return Err(Error::NegativeDuration {
                start_ms: self.0,
                end_ms: end.0,
            });
        }
        Ok((end.0 - self.0) / 1000.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}ms", self.0)
    }
}

/// Formats an elapsed time in seconds the way both role processes print it.
#[must_use]
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.3}")
}

/// Ephemeral state of one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSession {
    mechanism: Mechanism,
    payload: PayloadSize,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl TransferSession {
    /// Creates a session with no timestamps recorded.
    #[must_use]
    pub fn new(mechanism: Mechanism, payload: PayloadSize) -> Self {
        Self {
            mechanism,
            payload,
            start: None,
            end: None,
        }
    }

    /// Returns the mechanism under test.
    #[must_use]
    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    /// Returns the payload size.
    #[must_use]
    pub fn payload(&self) -> PayloadSize {
        self.payload
    }

    /// Records the producer's start timestamp.
    pub fn record_start(&mut self, start: Timestamp) {
        self.start = Some(start);
    }

    /// Records the consumer's end timestamp.
    pub fn record_end(&mut self, end: Timestamp) {
        self.end = Some(end);
    }

    /// Returns the start timestamp, if recorded.
    #[must_use]
    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Returns the end timestamp, if recorded.
    #[must_use]
    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    /// Elapsed transfer time in seconds.
    ///
    /// # Errors
    /// Returns [`Error::IncompleteSession`] if a timestamp is missing and
    /// [`Error::NegativeDuration`] if end precedes start.
    pub fn elapsed_secs(&self) -> Result<f64> {
        let start = self
            .start
            .ok_or(Error::IncompleteSession { missing: "start" })?;
        let end = self.end.ok_or(Error::IncompleteSession { missing: "end" })?;
        start.seconds_until(end)
    }
}
