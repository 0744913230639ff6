//! Shared-memory IPC.
//!
//! Provides the mapped segment, the start-time cell and the
//! semaphore-coordinated ring buffer transport.

pub mod ring;
pub mod ringbuffer;
pub mod shm;
pub mod timestamp;

pub use ring::{DEFAULT_RING_CAPACITY, RingConfig, RingReceiver, RingSender};
pub use ringbuffer::{RingConsumer, RingOccupancy, RingProducer, RingSemaphores, SharedRingBuffer};
pub use shm::{SharedMemory, SharedMemoryConfig};
pub use timestamp::{TIMESTAMP_REGION_LEN, TimestampCell};
