//! Cross-process synchronization primitives.
//!
//! Provides POSIX named semaphores, opened by name from either process.

pub mod semaphore;

pub use semaphore::NamedSemaphore;
