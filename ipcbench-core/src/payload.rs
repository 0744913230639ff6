//! Payload size in size-units.

use crate::error::{Error, Result};
use crate::message::{BYTES_PER_UNIT, MESSAGE_SIZE};
use std::fmt;
use std::str::FromStr;

/// Largest accepted payload, in size-units.
pub const MAX_PAYLOAD_UNITS: u32 = 100;

/// Validated payload size, always within `1..=MAX_PAYLOAD_UNITS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PayloadSize(u32);

impl PayloadSize {
    /// Creates a payload size.
    ///
    /// # Errors
    /// Returns [`Error::PayloadOutOfRange`] for zero, negative or oversized values.
    pub fn new(units: i64) -> Result<Self> {
        if units < 1 || units > i64::from(MAX_PAYLOAD_UNITS) {
            return Err(Error::PayloadOutOfRange {
                size: units,
                max: MAX_PAYLOAD_UNITS,
            });
        }
        Ok(Self(units as u32))
    }

    /// Returns the size in size-units.
    #[must_use]
    pub const fn units(&self) -> u32 {
        self.0
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.0 as usize * BYTES_PER_UNIT
    }

    /// Returns the number of messages carried by this payload.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.bytes() / MESSAGE_SIZE
    }

    /// Number of messages in `units` size-units, for arithmetic on negotiated
    /// values that are not themselves a valid payload (e.g. a zero remainder).
    #[must_use]
    pub const fn messages_in_units(units: u32) -> usize {
        units as usize * BYTES_PER_UNIT / MESSAGE_SIZE
    }
}

impl fmt::Display for PayloadSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MiB", self.0)
    }
}

impl FromStr for PayloadSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let units = s.trim().parse::<i64>().map_err(|_| Error::Unparsable {
            what: "payload size",
            text: s.to_string(),
        })?;
        Self::new(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_bounds() {
        assert!(PayloadSize::new(0).is_err());
        assert!(PayloadSize::new(-3).is_err());
        assert!(PayloadSize::new(101).is_err());
        assert_eq!(PayloadSize::new(1).unwrap().units(), 1);
        assert_eq!(PayloadSize::new(100).unwrap().units(), 100);
    }

    #[test]
    fn test_payload_message_count() {
        let one = PayloadSize::new(1).unwrap();
        assert_eq!(one.bytes(), 1_049_000);
        assert_eq!(one.message_count(), 262_250);

        let five = PayloadSize::new(5).unwrap();
        assert_eq!(five.message_count(), 5 * 262_250);
        assert_eq!(PayloadSize::messages_in_units(0), 0);
        assert_eq!(PayloadSize::messages_in_units(2), 524_500);
    }

    #[test]
    fn test_payload_from_str() {
        assert_eq!("42".parse::<PayloadSize>().unwrap().units(), 42);
        assert_eq!(
            "abc".parse::<PayloadSize>(),
            Err(Error::Unparsable {
                what: "payload size",
                text: "abc".to_string()
            })
        );
        assert!(
            "abc"
                .parse::<PayloadSize>()
                .unwrap_err()
                .to_string()
                .contains("\"abc\"")
        );
        assert!("0".parse::<PayloadSize>().is_err());
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(PayloadSize::new(7).unwrap().to_string(), "7MiB");
    }
}
