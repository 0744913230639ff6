//! Shared cell carrying the producer's start timestamp as text.

use super::shm::{SharedMemory, SharedMemoryConfig};
use crate::error::TransportError;
use ipcbench_core::Timestamp;

/// Length of the timestamp region. Fits `"<13 digits>.<6 digits>"` plus NUL padding.
pub const TIMESTAMP_REGION_LEN: usize = 32;

/// Tiny named region holding one timestamp as NUL-padded decimal text.
#[derive(Debug)]
pub struct TimestampCell {
    shm: SharedMemory,
}

impl TimestampCell {
    /// Creates (or opens) the region for writing.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if the segment cannot be opened.
    pub fn create(name: &str) -> Result<Self, TransportError> {
        let shm = SharedMemory::open(name, SharedMemoryConfig::new(TIMESTAMP_REGION_LEN))?;
        Ok(Self { shm })
    }

    /// Opens a region the producer already created.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if the segment does not exist.
    pub fn open(name: &str) -> Result<Self, TransportError> {
        let config = SharedMemoryConfig::new(TIMESTAMP_REGION_LEN).create(false);
        let shm = SharedMemory::open(name, config)?;
        Ok(Self { shm })
    }

    /// Stores `timestamp`.
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] if the text does not fit.
    pub fn write(&self, timestamp: Timestamp) -> Result<(), TransportError> {
        let mut text = [0u8; TIMESTAMP_REGION_LEN];
        let encoded = timestamp.to_text();
        // Keep at least one trailing NUL as terminator.
        if encoded.len() >= TIMESTAMP_REGION_LEN {
            return Err(TransportError::OutOfBounds {
                offset: 0,
                len: encoded.len() + 1,
                size: TIMESTAMP_REGION_LEN,
            });
        }
        text[..encoded.len()].copy_from_slice(encoded.as_bytes());
        self.shm.write_bytes(0, &text)
    }

    /// Loads the stored timestamp.
    ///
    /// # Errors
    /// Returns [`TransportError::Core`] with `InvalidTimestamp` if the region
    /// does not hold a number.
    pub fn read(&self) -> Result<Timestamp, TransportError> {
        let mut text = [0u8; TIMESTAMP_REGION_LEN];
        self.shm.read_bytes(0, &mut text)?;
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let text = String::from_utf8_lossy(&text[..end]);
        Ok(Timestamp::parse_text(&text)?)
    }

    /// Removes the region name.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `shm_unlink` fails.
    pub fn unlink(name: &str) -> Result<(), TransportError> {
        SharedMemory::unlink(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_cell_write_read() {
        let name = format!("/ipcbench_ts_unit_{}", std::process::id());
        let writer = TimestampCell::create(&name).unwrap();
        let ts = Timestamp::from_millis(1_712_345_678_901.0);
        writer.write(ts).unwrap();

        let reader = TimestampCell::open(&name).unwrap();
        assert_eq!(reader.read().unwrap(), ts);

        TimestampCell::unlink(&name).unwrap();
    }

    #[test]
    fn test_timestamp_cell_empty_region_is_invalid() {
        let name = format!("/ipcbench_ts_empty_{}", std::process::id());
        let cell = TimestampCell::create(&name).unwrap();
        assert!(matches!(
            cell.read(),
            Err(TransportError::Core(ipcbench_core::Error::InvalidTimestamp { .. }))
        ));
        TimestampCell::unlink(&name).unwrap();
    }

    #[test]
    fn test_timestamp_cell_open_missing() {
        let name = format!("/ipcbench_ts_missing_{}", std::process::id());
        assert!(TimestampCell::open(&name).is_err());
    }
}
