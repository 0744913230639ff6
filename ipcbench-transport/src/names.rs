//! Well-known names of the process-wide resources shared by both roles.
//!
//! Producer and consumer never exchange handles (except the anonymous pipe
//! descriptor); they meet on these names. A namespace suffix keeps concurrent
//! sessions apart.

use crate::error::TransportError;
use crate::ipc::shm::SharedMemory;
use crate::sync::NamedSemaphore;
use std::path::PathBuf;

/// Names of every fifo, shared memory segment and semaphore used by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// Named pipe path.
    pub fifo_path: PathBuf,
    /// Ring buffer segment.
    pub ring_segment: String,
    /// Segment carrying the producer's start timestamp.
    pub timestamp_segment: String,
    /// Mutex guarding ring slot access.
    pub mutex: String,
    /// Counts ring slots the producer may still fill.
    pub empty_slots: String,
    /// Counts ring slots the consumer may still drain.
    pub full_slots: String,
    /// Posted by the producer once the start timestamp is published.
    pub data_ready: String,
    /// Posted by the consumer once it has read the start timestamp.
    pub reader_done: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            fifo_path: PathBuf::from("/tmp/arpassign2"),
            ring_segment: "/shm_arpassign2".to_string(),
            timestamp_segment: "/shm_timerStart".to_string(),
            mutex: "/arp2_mutex_cbuffer".to_string(),
            empty_slots: "/arp2_sem_cbuffer_producer".to_string(),
            full_slots: "/arp2_sem_cbuffer_consumer".to_string(),
            data_ready: "/arp2_sem_consumer".to_string(),
            reader_done: "/arp2_sem_producer".to_string(),
        }
    }
}

impl ResourceNames {
    /// Returns the well-known names with `_<namespace>` appended to each.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidName`] unless the namespace is a
    /// non-empty run of ASCII alphanumerics, `-` and `_`.
    pub fn namespaced(namespace: &str) -> Result<Self, TransportError> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TransportError::InvalidName {
                name: namespace.to_string(),
            });
        }

        let suffix = |name: &str| format!("{name}_{namespace}");
        let base = Self::default();
        Ok(Self {
            fifo_path: PathBuf::from(suffix(&base.fifo_path.to_string_lossy())),
            ring_segment: suffix(&base.ring_segment),
            timestamp_segment: suffix(&base.timestamp_segment),
            mutex: suffix(&base.mutex),
            empty_slots: suffix(&base.empty_slots),
            full_slots: suffix(&base.full_slots),
            data_ready: suffix(&base.data_ready),
            reader_done: suffix(&base.reader_done),
        })
    }

    /// Well-known names, or namespaced ones when `namespace` is given.
    ///
    /// # Errors
    /// See [`ResourceNames::namespaced`].
    pub fn resolve(namespace: Option<&str>) -> Result<Self, TransportError> {
        match namespace {
            Some(ns) => Self::namespaced(ns),
            None => Ok(Self::default()),
        }
    }

    /// Every semaphore name.
    #[must_use]
    pub fn semaphores(&self) -> [&str; 5] {
        [
            &self.mutex,
            &self.empty_slots,
            &self.full_slots,
            &self.data_ready,
            &self.reader_done,
        ]
    }

    /// Every shared memory segment name.
    #[must_use]
    pub fn segments(&self) -> [&str; 2] {
        [&self.ring_segment, &self.timestamp_segment]
    }

    /// Removes whatever a crashed session left behind.
    ///
    /// Returns the names that actually existed.
    ///
    /// # Errors
    /// Returns the first removal failure other than "does not exist".
    pub fn purge(&self) -> Result<Vec<String>, TransportError> {
        let mut removed = Vec::new();
        for name in self.semaphores() {
            if NamedSemaphore::unlink_if_exists(name)? {
                removed.push(name.to_string());
            }
        }
        for name in self.segments() {
            if SharedMemory::unlink_if_exists(name)? {
                removed.push(name.to_string());
            }
        }
        match std::fs::remove_file(&self.fifo_path) {
            Ok(()) => removed.push(self.fifo_path.display().to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(TransportError::resource(
                    "fifo remove",
                    self.fifo_path.display().to_string(),
                    err,
                ));
            }
        }
        if !removed.is_empty() {
            tracing::debug!("Purged stale resources: {:?}", removed);
        }
        Ok(removed)
    }
}
