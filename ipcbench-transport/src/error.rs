//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error on an already established channel.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Creating, opening, waiting on or removing a named resource failed.
    #[error("{what} failed for {name}: {source}")]
    Resource {
        /// Operation that failed.
        what: &'static str,
        /// Name or path of the resource.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Connecting to the producer failed after every retry.
    #[error("connection to {addr} failed after {attempts} attempts: {source}")]
    ConnectFailed {
        /// Address that was dialed.
        addr: String,
        /// Number of attempts made.
        attempts: usize,
        /// Error of the last attempt.
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the channel before the transfer completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Acknowledgment with a value other than the expected one.
    #[error("unexpected acknowledgment {value} after block {block}: expected {expected}")]
    UnexpectedAck {
        /// Zero-based block index (the block count for the final ack).
        block: u32,
        /// Value received.
        value: i32,
        /// Value expected.
        expected: i32,
    },

    /// Any other protocol violation.
    #[error("protocol violation: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// Shared segment already initialised with another capacity.
    #[error("capacity mismatch for {name}: expected {expected} slots, segment holds {actual}")]
    CapacityMismatch {
        /// Segment name.
        name: String,
        /// Capacity requested by this side.
        expected: usize,
        /// Capacity found in the segment.
        actual: usize,
    },

    /// Access outside a mapped region.
    #[error("access of {len} bytes at offset {offset} out of bounds for region of {size} bytes")]
    OutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Requested length.
        len: usize,
        /// Region size.
        size: usize,
    },

    /// Operation not allowed in the current state or role.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Error message.
        message: String,
    },

    /// Resource name unusable as a POSIX object name.
    #[error("invalid resource name: {name:?}")]
    InvalidName {
        /// Offending name.
        name: String,
    },

    /// Configuration or timing error from the core crate.
    #[error(transparent)]
    Core(#[from] ipcbench_core::Error),
}

impl TransportError {
    /// Creates a resource error.
    pub fn resource(what: &'static str, name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            what,
            name: name.into(),
            source,
        }
    }

    /// Creates a resource error from the calling thread's `errno`.
    pub fn last_os_error(what: &'static str, name: impl Into<String>) -> Self {
        Self::resource(what, name, std::io::Error::last_os_error())
    }

    /// Creates a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Maps a read error, turning a premature EOF into [`TransportError::ConnectionClosed`].
    pub fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err)
        }
    }

    /// Returns true for protocol violations.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnexpectedAck { .. } | Self::Protocol { .. })
    }

    /// Returns true for configuration errors rejected before any transfer.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Core(err) => err.is_configuration(),
            Self::InvalidName { .. } => true,
            _ => false,
        }
    }

    /// Returns the underlying OS error code, if any.
    #[must_use]
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            Self::Io(err)
            | Self::Resource { source: err, .. }
            | Self::ConnectFailed { source: err, .. } => err.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_resource_error_keeps_os_code() {
        let err = TransportError::resource(
            "semaphore open",
            "/arp2_sem_consumer",
            io::Error::from_raw_os_error(libc::EACCES),
        );
        assert_eq!(err.os_error_code(), Some(libc::EACCES));
        assert!(err.to_string().starts_with("semaphore open failed for /arp2_sem_consumer"));
    }

    #[test]
    fn test_from_read_maps_eof() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            TransportError::from_read(eof),
            TransportError::ConnectionClosed
        ));

        let other = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(
            TransportError::from_read(other),
            TransportError::Io(_)
        ));
    }

    #[test]
    fn test_classification() {
        let ack = TransportError::UnexpectedAck {
            block: 0,
            value: 7,
            expected: 1,
        };
        assert!(ack.is_protocol_violation());
        assert!(!ack.is_configuration());

        let core: TransportError = ipcbench_core::Error::InvalidMechanism { value: 9 }.into();
        assert!(core.is_configuration());
        assert_eq!(core.to_string(), ipcbench_core::Error::InvalidMechanism { value: 9 }.to_string());
    }
}
