//! Cross-process start-time handoff.
//!
//! The producer publishes the instant it started sending; the consumer picks
//! it up once it has drained the transport and acknowledges, so the producer
//! knows the shared names may be torn down.
//!
//! ```text
//! producer                          consumer
//! publish_start_time(t) --post-->  data_ready
//!                                   wait_and_consume_start_time() -> t
//! reader_done  <--post------------
//! wait_for_reader_done()
//! ```
//!
//! No wait has a timeout: a peer that dies mid-session leaves the survivor
//! blocked.

use crate::error::TransportError;
use crate::ipc::timestamp::TimestampCell;
use crate::names::ResourceNames;
use crate::sync::NamedSemaphore;
use ipcbench_core::{Role, Timestamp};

/// One side of the start-time handshake.
#[derive(Debug)]
pub struct Handshake {
    role: Role,
    names: ResourceNames,
    data_ready: NamedSemaphore,
    reader_done: NamedSemaphore,
    cell: Option<TimestampCell>,
}

impl Handshake {
    /// Opens (creating if needed) the handshake primitives for `role`.
    ///
    /// The producer also creates the timestamp region; the consumer attaches
    /// to it only after `data_ready` has been posted.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if a primitive cannot be opened.
    pub fn open(names: &ResourceNames, role: Role) -> Result<Self, TransportError> {
        let data_ready = NamedSemaphore::open(&names.data_ready, 0)?;
        let reader_done = NamedSemaphore::open(&names.reader_done, 0)?;
        let cell = match role {
            Role::Producer => Some(TimestampCell::create(&names.timestamp_segment)?),
            Role::Consumer => None,
        };

        Ok(Self {
            role,
            names: names.clone(),
            data_ready,
            reader_done,
            cell,
        })
    }

    /// Returns the role this side plays.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    fn expect_role(&self, role: Role, operation: &str) -> Result<(), TransportError> {
        if self.role == role {
            Ok(())
        } else {
            Err(TransportError::invalid_state(format!(
                "{operation} is a {role} operation, handshake opened as {}",
                self.role
            )))
        }
    }

    /// Stores the start timestamp and signals `data_ready`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] on the consumer side and
    /// [`TransportError::Resource`] if the post fails.
    pub fn publish_start_time(&mut self, start: Timestamp) -> Result<(), TransportError> {
        self.expect_role(Role::Producer, "publish_start_time")?;
        let cell = self
            .cell
            .as_ref()
            .ok_or_else(|| TransportError::invalid_state("timestamp region not open"))?;
        cell.write(start)?;
        self.data_ready.post()?;
        tracing::debug!("Published start time {}", start);
        Ok(())
    }

    /// Waits for `data_ready`, reads the start timestamp and signals
    /// `reader_done`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] on the producer side,
    /// [`TransportError::Resource`] if a primitive fails and
    /// [`TransportError::Core`] if the stored text is not a timestamp.
    pub fn wait_and_consume_start_time(&mut self) -> Result<Timestamp, TransportError> {
        self.expect_role(Role::Consumer, "wait_and_consume_start_time")?;
        self.data_ready.wait()?;

        let cell = TimestampCell::open(&self.names.timestamp_segment)?;
        let start = cell.read()?;
        self.cell = Some(cell);

        self.reader_done.post()?;
        tracing::debug!("Consumed start time {}", start);
        Ok(start)
    }

    /// Blocks until the consumer has read the start timestamp.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] on the consumer side and
    /// [`TransportError::Resource`] if the wait fails.
    pub fn wait_for_reader_done(&self) -> Result<(), TransportError> {
        self.expect_role(Role::Producer, "wait_for_reader_done")?;
        self.reader_done.wait()?;
        tracing::debug!("Consumer signalled reader done");
        Ok(())
    }

    /// Closes the handshake and removes the names this role owns.
    ///
    /// The producer removes `reader_done`; the consumer removes the
    /// timestamp region and `data_ready`.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if a removal fails.
    pub fn release(self) -> Result<(), TransportError> {
        let Self {
            role,
            names,
            data_ready,
            reader_done,
            cell,
        } = self;
        drop(cell);
        drop(data_ready);
        drop(reader_done);

        match role {
            Role::Producer => NamedSemaphore::unlink(&names.reader_done)?,
            Role::Consumer => {
                TimestampCell::unlink(&names.timestamp_segment)?;
                NamedSemaphore::unlink(&names.data_ready)?;
            }
        }
        tracing::debug!("{} released handshake resources", role);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn names(tag: &str) -> ResourceNames {
        let names = ResourceNames::namespaced(&format!("hs_unit_{}_{}", tag, std::process::id()))
            .unwrap();
        names.purge().unwrap();
        names
    }

    #[test]
    fn test_handshake_round_trip() {
        let names = names("round_trip");
        let start = Timestamp::from_millis(1_700_000_000_123.0);

        let mut producer = Handshake::open(&names, Role::Producer).unwrap();
        let consumer_names = names.clone();
        let consumer = thread::spawn(move || {
            let mut consumer = Handshake::open(&consumer_names, Role::Consumer).unwrap();
            let seen = consumer.wait_and_consume_start_time().unwrap();
            consumer.release().unwrap();
            seen
        });

        producer.publish_start_time(start).unwrap();
        producer.wait_for_reader_done().unwrap();
        producer.release().unwrap();

        assert_eq!(consumer.join().unwrap(), start);
        assert!(names.purge().unwrap().is_empty());
    }

    #[test]
    fn test_handshake_role_checks() {
        let names = names("roles");
        let mut consumer = Handshake::open(&names, Role::Consumer).unwrap();
        assert_eq!(consumer.role(), Role::Consumer);
        assert!(matches!(
            consumer.publish_start_time(Timestamp::from_millis(1.0)),
            Err(TransportError::InvalidState { .. })
        ));
        assert!(consumer.wait_for_reader_done().is_err());

        let mut producer = Handshake::open(&names, Role::Producer).unwrap();
        assert!(matches!(
            producer.wait_and_consume_start_time(),
            Err(TransportError::InvalidState { .. })
        ));
        names.purge().unwrap();
    }
}
