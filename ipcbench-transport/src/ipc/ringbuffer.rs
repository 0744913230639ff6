//! Bounded ring buffer over shared memory, coordinated by named semaphores.
//!
//! Classic bounded-buffer discipline between two processes:
//!
//! - `empty_slots` counts slots the producer may still fill,
//! - `full_slots` counts slots the consumer may still drain,
//! - `mutex` (a binary semaphore) serializes slot access.
//!
//! One slot is never used: at most `capacity - 1` messages are live, and
//! `empty_slots` starts at `capacity - 1` to encode that reservation. At every
//! quiescent point `full_slots + empty_slots == capacity - 1`.
//!
//! Head is written only through [`RingProducer`], tail only through
//! [`RingConsumer`].

use super::shm::{SharedMemory, SharedMemoryConfig};
use crate::error::TransportError;
use crate::names::ResourceNames;
use crate::sync::NamedSemaphore;
use ipcbench_core::{Error as CoreError, MESSAGE_SIZE, Message};

/// Ring buffer segment layout.
///
/// The control block keeps producer- and consumer-owned words on separate
/// cache lines.
pub struct SharedRingBuffer;

impl SharedRingBuffer {
    /// Size of the control block header in bytes.
    pub const HEADER_SIZE: usize = 128;
    /// Offset of the head index (producer-owned).
    pub const HEAD_OFFSET: usize = 0;
    /// Offset of the capacity word.
    pub const CAPACITY_OFFSET: usize = 8;
    /// Offset of the tail index (consumer-owned).
    pub const TAIL_OFFSET: usize = 64;

    /// Largest capacity. `empty_slots` starts at `capacity - 1`, which must
    /// stay within `SEM_VALUE_MAX`.
    pub const MAX_CAPACITY: usize = i32::MAX as usize;

    /// Total segment size for `capacity` slots, or `None` on overflow.
    #[must_use]
    pub const fn segment_size(capacity: usize) -> Option<usize> {
        match capacity.checked_mul(MESSAGE_SIZE) {
            Some(slots) => slots.checked_add(Self::HEADER_SIZE),
            None => None,
        }
    }

    /// Checks `capacity` and returns the segment size it needs.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidCapacity`] below 2 slots, above
    /// [`Self::MAX_CAPACITY`], or when the segment size overflows.
    pub fn checked_segment_size(capacity: usize) -> Result<usize, CoreError> {
        if !(2..=Self::MAX_CAPACITY).contains(&capacity) {
            return Err(CoreError::InvalidCapacity { capacity });
        }
        Self::segment_size(capacity).ok_or(CoreError::InvalidCapacity { capacity })
    }

    /// Byte offset of slot `index`.
    #[must_use]
    pub const fn slot_offset(index: usize) -> usize {
        Self::HEADER_SIZE + index * MESSAGE_SIZE
    }
}

/// Shared segment plus its capacity, as seen by one side.
#[derive(Debug)]
struct RingRegion {
    shm: SharedMemory,
    capacity: usize,
}

impl RingRegion {
    fn open(name: &str, capacity: usize) -> Result<Self, TransportError> {
        let size = SharedRingBuffer::checked_segment_size(capacity)?;
        let shm = SharedMemory::open(name, SharedMemoryConfig::new(size))?;

        // First opener records the capacity; later openers must agree.
        match shm.compare_exchange_u64(SharedRingBuffer::CAPACITY_OFFSET, 0, capacity as u64)? {
            Ok(_) => {}
            Err(existing) if existing == capacity as u64 => {}
            Err(existing) => {
                return Err(TransportError::CapacityMismatch {
                    name: name.to_string(),
                    expected: capacity,
                    actual: existing as usize,
                });
            }
        }

        Ok(Self { shm, capacity })
    }

    fn head(&self) -> Result<usize, TransportError> {
        Ok(self.shm.load_u64(SharedRingBuffer::HEAD_OFFSET)? as usize)
    }

    fn tail(&self) -> Result<usize, TransportError> {
        Ok(self.shm.load_u64(SharedRingBuffer::TAIL_OFFSET)? as usize)
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.capacity
    }

    fn live_messages(&self) -> Result<usize, TransportError> {
        let head = self.head()?;
        let tail = self.tail()?;
        Ok((head + self.capacity - tail) % self.capacity)
    }
}

/// The three semaphores coordinating slot access.
#[derive(Debug)]
pub struct RingSemaphores {
    mutex: NamedSemaphore,
    empty_slots: NamedSemaphore,
    full_slots: NamedSemaphore,
}

impl RingSemaphores {
    /// Creates or opens the ring semaphores.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if any semaphore cannot be opened.
    pub fn open(names: &ResourceNames, capacity: usize) -> Result<Self, TransportError> {
        let usable = capacity.saturating_sub(1) as u32;
        Ok(Self {
            mutex: NamedSemaphore::open(&names.mutex, 1)?,
            empty_slots: NamedSemaphore::open(&names.empty_slots, usable)?,
            full_slots: NamedSemaphore::open(&names.full_slots, 0)?,
        })
    }
}

/// Snapshot of ring occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingOccupancy {
    /// Ring capacity in slots.
    pub capacity: usize,
    /// Current `full_slots` count.
    pub full_slots: i32,
    /// Current `empty_slots` count.
    pub empty_slots: i32,
    /// Messages written but not yet read, derived from head and tail.
    pub live_messages: usize,
}

impl RingOccupancy {
    /// Returns true when the semaphore counts account for every usable slot.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        (self.full_slots + self.empty_slots) as usize == self.capacity - 1
    }
}

fn occupancy(region: &RingRegion, sems: &RingSemaphores) -> Result<RingOccupancy, TransportError> {
    Ok(RingOccupancy {
        capacity: region.capacity,
        full_slots: sems.full_slots.value()?,
        empty_slots: sems.empty_slots.value()?,
        live_messages: region.live_messages()?,
    })
}

/// Producer side of the shared ring buffer.
#[derive(Debug)]
pub struct RingProducer {
    region: RingRegion,
    sems: RingSemaphores,
}

impl RingProducer {
    /// Opens the ring segment and semaphores for writing.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the segment or a semaphore cannot be
    /// opened, or the segment holds another capacity.
    pub fn open(names: &ResourceNames, capacity: usize) -> Result<Self, TransportError> {
        let region = RingRegion::open(&names.ring_segment, capacity)?;
        let sems = RingSemaphores::open(names, capacity)?;
        Ok(Self { region, sems })
    }

    /// Returns the capacity in slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity
    }

    /// Writes one message, blocking while the ring is full.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore operation fails.
    pub fn push(&mut self, message: Message) -> Result<(), TransportError> {
        self.sems.empty_slots.wait()?;
        self.write_and_publish(message)
    }

    /// Writes one message if a slot is free. Returns `false` when full.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore operation fails.
    pub fn try_push(&mut self, message: Message) -> Result<bool, TransportError> {
        if !self.sems.empty_slots.try_wait()? {
            return Ok(false);
        }
        self.write_and_publish(message)?;
        Ok(true)
    }

    fn write_and_publish(&mut self, message: Message) -> Result<(), TransportError> {
        self.sems.mutex.wait()?;
        let head = self.region.head();
        let written = head.and_then(|head| {
            self.region
                .shm
                .write_i32(SharedRingBuffer::slot_offset(head), message)
                .map(|()| head)
        });
        self.sems.mutex.post()?;
        let head = written?;

        self.region
            .shm
            .store_u64(SharedRingBuffer::HEAD_OFFSET, self.region.next(head) as u64)?;
        self.sems.full_slots.post()
    }

    /// Returns a snapshot of the ring occupancy.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore cannot be read.
    pub fn occupancy(&self) -> Result<RingOccupancy, TransportError> {
        occupancy(&self.region, &self.sems)
    }
}

/// Consumer side of the shared ring buffer.
#[derive(Debug)]
pub struct RingConsumer {
    region: RingRegion,
    sems: RingSemaphores,
}

impl RingConsumer {
    /// Opens the ring segment and semaphores for reading.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the segment or a semaphore cannot be
    /// opened, or the segment holds another capacity.
    pub fn open(names: &ResourceNames, capacity: usize) -> Result<Self, TransportError> {
        let region = RingRegion::open(&names.ring_segment, capacity)?;
        let sems = RingSemaphores::open(names, capacity)?;
        Ok(Self { region, sems })
    }

    /// Returns the capacity in slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.capacity
    }

    /// Reads the next message, blocking while the ring is empty.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore operation fails.
    pub fn pop(&mut self) -> Result<Message, TransportError> {
        self.sems.full_slots.wait()?;
        self.read_and_release()
    }

    /// Reads the next message if one is available.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore operation fails.
    pub fn try_pop(&mut self) -> Result<Option<Message>, TransportError> {
        if !self.sems.full_slots.try_wait()? {
            return Ok(None);
        }
        self.read_and_release().map(Some)
    }

    fn read_and_release(&mut self) -> Result<Message, TransportError> {
        self.sems.mutex.wait()?;
        let read = self.region.tail().and_then(|tail| {
            self.region
                .shm
                .read_i32(SharedRingBuffer::slot_offset(tail))
                .map(|message| (tail, message))
        });
        self.sems.mutex.post()?;
        let (tail, message) = read?;

        self.region
            .shm
            .store_u64(SharedRingBuffer::TAIL_OFFSET, self.region.next(tail) as u64)?;
        self.sems.empty_slots.post()?;
        Ok(message)
    }

    /// Returns a snapshot of the ring occupancy.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a semaphore cannot be read.
    pub fn occupancy(&self) -> Result<RingOccupancy, TransportError> {
        occupancy(&self.region, &self.sems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tag: &str) -> ResourceNames {
        let names =
            ResourceNames::namespaced(&format!("ring_unit_{}_{}", tag, std::process::id())).unwrap();
        names.purge().unwrap();
        names
    }

    #[test]
    fn test_shared_ring_buffer_layout() {
        assert_eq!(SharedRingBuffer::HEADER_SIZE, 128);
        assert_eq!(SharedRingBuffer::segment_size(4096), Some(128 + 4096 * 4));
        assert_eq!(SharedRingBuffer::segment_size(usize::MAX / 2), None);
        assert_eq!(SharedRingBuffer::segment_size(usize::MAX / 4), None);
        assert_eq!(SharedRingBuffer::slot_offset(0), 128);
        assert_eq!(SharedRingBuffer::slot_offset(3), 140);
    }

    #[test]
    fn test_capacity_too_small() {
        let names = names("small");
        assert!(matches!(
            RingProducer::open(&names, 1),
            Err(TransportError::Core(CoreError::InvalidCapacity { capacity: 1 }))
        ));
    }

    #[test]
    fn test_capacity_upper_bound() {
        assert_eq!(
            SharedRingBuffer::checked_segment_size(SharedRingBuffer::MAX_CAPACITY),
            SharedRingBuffer::MAX_CAPACITY
                .checked_mul(MESSAGE_SIZE)
                .and_then(|slots| slots.checked_add(SharedRingBuffer::HEADER_SIZE))
                .ok_or(CoreError::InvalidCapacity {
                    capacity: SharedRingBuffer::MAX_CAPACITY
                })
        );
        for capacity in [
            SharedRingBuffer::MAX_CAPACITY + 1,
            4_611_686_018_427_387_904,
            4_611_686_018_427_387_000,
            usize::MAX,
        ] {
            assert_eq!(
                SharedRingBuffer::checked_segment_size(capacity),
                Err(CoreError::InvalidCapacity { capacity })
            );
        }
    }

    #[test]
    fn test_oversized_capacity_creates_nothing() {
        let names = names("huge");
        assert!(matches!(
            RingConsumer::open(&names, 4_611_686_018_427_387_904),
            Err(TransportError::Core(CoreError::InvalidCapacity { .. }))
        ));
        assert!(names.purge().unwrap().is_empty());
    }

    #[test]
    fn test_guard_slot_limits_live_messages() {
        let names = names("guard");
        let mut producer = RingProducer::open(&names, 4).unwrap();
        let mut consumer = RingConsumer::open(&names, 4).unwrap();

        assert!(producer.try_push(10).unwrap());
        assert!(producer.try_push(11).unwrap());
        assert!(producer.try_push(12).unwrap());
        // capacity - 1 live messages: the fourth slot is the guard.
        assert!(!producer.try_push(13).unwrap());

        let occupancy = producer.occupancy().unwrap();
        assert_eq!(occupancy.live_messages, 3);
        assert_eq!(occupancy.full_slots, 3);
        assert_eq!(occupancy.empty_slots, 0);
        assert!(occupancy.is_balanced());

        assert_eq!(consumer.pop().unwrap(), 10);
        assert!(producer.try_push(13).unwrap());
        assert_eq!(consumer.pop().unwrap(), 11);
        assert_eq!(consumer.pop().unwrap(), 12);
        assert_eq!(consumer.pop().unwrap(), 13);
        assert_eq!(consumer.try_pop().unwrap(), None);

        let occupancy = consumer.occupancy().unwrap();
        assert_eq!(occupancy.live_messages, 0);
        assert_eq!(occupancy.full_slots, 0);
        assert_eq!(occupancy.empty_slots, 3);

        names.purge().unwrap();
    }

    #[test]
    fn test_wraps_around() {
        let names = names("wrap");
        let mut producer = RingProducer::open(&names, 3).unwrap();
        let mut consumer = RingConsumer::open(&names, 3).unwrap();

        for value in 0..20 {
            producer.push(value).unwrap();
            assert_eq!(consumer.pop().unwrap(), value);
            assert!(consumer.occupancy().unwrap().is_balanced());
        }

        names.purge().unwrap();
    }

    #[test]
    fn test_capacity_mismatch() {
        let names = names("mismatch");
        let _producer = RingProducer::open(&names, 8).unwrap();
        assert!(matches!(
            RingConsumer::open(&names, 16),
            Err(TransportError::CapacityMismatch { .. })
        ));
        names.purge().unwrap();
    }
}
