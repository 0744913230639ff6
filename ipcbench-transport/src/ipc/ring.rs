//! Shared-memory ring buffer transport.

use super::ringbuffer::{RingConsumer, RingOccupancy, RingProducer, SharedRingBuffer};
use super::shm::SharedMemory;
use crate::error::TransportError;
use crate::names::ResourceNames;
use crate::sync::NamedSemaphore;
use crate::transport::{Receiver, Sender, Transport};
use ipcbench_core::{Error as CoreError, Mechanism, Message, Timestamp};

/// Default ring capacity in slots.
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// Configuration for the ring buffer transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of message slots, one of which is always kept free.
    pub capacity: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl RingConfig {
    /// Creates a config with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Checks the capacity leaves at least one usable slot and fits both a
    /// semaphore count and the address space.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidCapacity`] for capacities below 2 or above
    /// [`SharedRingBuffer::MAX_CAPACITY`].
    pub fn validate(&self) -> Result<(), CoreError> {
        SharedRingBuffer::checked_segment_size(self.capacity).map(|_| ())
    }
}

/// Producer end of the ring buffer transport.
#[derive(Debug)]
pub struct RingSender {
    names: ResourceNames,
    config: RingConfig,
    producer: Option<RingProducer>,
    sent: bool,
}

impl RingSender {
    /// Creates an unopened sender.
    ///
    /// # Errors
    /// Returns [`TransportError::Core`] for an invalid capacity.
    pub fn new(names: ResourceNames, config: RingConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            names,
            config,
            producer: None,
            sent: false,
        })
    }

    /// Returns the current ring occupancy.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] before `open`.
    pub fn occupancy(&self) -> Result<RingOccupancy, TransportError> {
        self.producer
            .as_ref()
            .ok_or_else(|| TransportError::invalid_state("ring sender not open"))?
            .occupancy()
    }
}

impl Transport for RingSender {
    fn mechanism(&self) -> Mechanism {
        Mechanism::SharedMemory
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.producer.is_some() {
            return Err(TransportError::invalid_state("ring sender already open"));
        }
        self.producer = Some(RingProducer::open(&self.names, self.config.capacity)?);
        tracing::debug!(
            "Ring sender open on {} ({} slots)",
            self.names.ring_segment,
            self.config.capacity
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.producer = None;
        NamedSemaphore::unlink(&self.names.empty_slots)?;
        tracing::debug!("Ring sender closed");
        Ok(())
    }
}

impl Sender for RingSender {
    fn send(&mut self, messages: &[Message]) -> Result<Timestamp, TransportError> {
        if self.sent {
            return Err(TransportError::invalid_state("ring stream already sent"));
        }
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("ring sender not open"))?;

        let start = Timestamp::now();
        for &message in messages {
            producer.push(message)?;
        }
        self.sent = true;
        tracing::debug!("Ring sender pushed {} messages", messages.len());
        Ok(start)
    }
}

/// Consumer end of the ring buffer transport.
#[derive(Debug)]
pub struct RingReceiver {
    names: ResourceNames,
    config: RingConfig,
    consumer: Option<RingConsumer>,
    received: bool,
}

impl RingReceiver {
    /// Creates an unopened receiver.
    ///
    /// # Errors
    /// Returns [`TransportError::Core`] for an invalid capacity.
    pub fn new(names: ResourceNames, config: RingConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            names,
            config,
            consumer: None,
            received: false,
        })
    }

    /// Returns the current ring occupancy.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] before `open`.
    pub fn occupancy(&self) -> Result<RingOccupancy, TransportError> {
        self.consumer
            .as_ref()
            .ok_or_else(|| TransportError::invalid_state("ring receiver not open"))?
            .occupancy()
    }
}

impl Transport for RingReceiver {
    fn mechanism(&self) -> Mechanism {
        Mechanism::SharedMemory
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.consumer.is_some() {
            return Err(TransportError::invalid_state("ring receiver already open"));
        }
        self.consumer = Some(RingConsumer::open(&self.names, self.config.capacity)?);
        tracing::debug!("Ring receiver open on {}", self.names.ring_segment);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.consumer = None;
        SharedMemory::unlink(&self.names.ring_segment)?;
        NamedSemaphore::unlink(&self.names.mutex)?;
        NamedSemaphore::unlink(&self.names.full_slots)?;
        tracing::debug!("Ring receiver closed");
        Ok(())
    }
}

impl Receiver for RingReceiver {
    fn receive(&mut self, messages: &mut [Message]) -> Result<Timestamp, TransportError> {
        if self.received {
            return Err(TransportError::invalid_state("ring stream already received"));
        }
        let consumer = self
            .consumer
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("ring receiver not open"))?;

        for slot in messages.iter_mut() {
            *slot = consumer.pop()?;
        }
        let end = Timestamp::now();
        self.received = true;
        tracing::debug!("Ring receiver drained {} messages", messages.len());
        Ok(end)
    }
}
