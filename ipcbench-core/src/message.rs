//! Message model.
//!
//! A message is a fixed-width 4-byte integer. The producer generates the whole
//! stream once, before any transport runs; the consumer allocates its own
//! zeroed stream of the same length and fills it while receiving.

use crate::payload::PayloadSize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::{Deref, DerefMut};

/// A single transferred message.
pub type Message = i32;

/// Size of one message in bytes.
pub const MESSAGE_SIZE: usize = std::mem::size_of::<Message>();

/// Bytes per payload size-unit.
pub const BYTES_PER_UNIT: usize = 1_049_000;

/// Exclusive upper bound of generated message values.
const MESSAGE_VALUE_RANGE: Message = 100;

/// Ordered sequence of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStream {
    messages: Vec<Message>,
}

impl MessageStream {
    /// Generates a random stream sized for `payload`.
    #[must_use]
    pub fn generate(payload: PayloadSize) -> Self {
        Self::generate_with(payload.message_count(), &mut rand::thread_rng())
    }

    /// Generates a reproducible stream from `seed`.
    #[must_use]
    pub fn generate_seeded(payload: PayloadSize, seed: u64) -> Self {
        Self::generate_with(payload.message_count(), &mut StdRng::seed_from_u64(seed))
    }

    /// Generates `len` random messages using `rng`.
    #[must_use]
    pub fn generate_with<R: Rng>(len: usize, rng: &mut R) -> Self {
        let messages = (0..len)
            .map(|_| rng.gen_range(0..MESSAGE_VALUE_RANGE))
            .collect();
        Self { messages }
    }

    /// Allocates a zeroed receive buffer sized for `payload`.
    #[must_use]
    pub fn zeroed(payload: PayloadSize) -> Self {
        Self::with_len(payload.message_count())
    }

    /// Allocates a zeroed stream of `len` messages.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            messages: vec![0; len],
        }
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the stream holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the size of the stream in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.messages.len() * MESSAGE_SIZE
    }

    /// Returns the messages as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    /// Consumes the stream and returns the underlying vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for MessageStream {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl Deref for MessageStream {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.messages
    }
}

impl DerefMut for MessageStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_size() {
        assert_eq!(MESSAGE_SIZE, 4);
    }

    #[test]
    fn test_generate_len_and_range() {
        let payload = PayloadSize::new(1).unwrap();
        let stream = MessageStream::generate(payload);
        assert_eq!(stream.len(), payload.message_count());
        assert_eq!(stream.byte_len(), payload.bytes());
        assert!(stream.iter().all(|m| (0..100).contains(m)));
    }

    #[test]
    fn test_generate_seeded_is_reproducible() {
        let payload = PayloadSize::new(1).unwrap();
        let a = MessageStream::generate_seeded(payload, 7);
        let b = MessageStream::generate_seeded(payload, 7);
        let c = MessageStream::generate_seeded(payload, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_zeroed() {
        let payload = PayloadSize::new(2).unwrap();
        let stream = MessageStream::zeroed(payload);
        assert_eq!(stream.len(), 524_500);
        assert!(stream.iter().all(|&m| m == 0));
    }

    #[test]
    fn test_deref_mut() {
        let mut stream = MessageStream::with_len(3);
        stream[1] = 42;
        assert_eq!(stream.as_slice(), &[0, 42, 0]);
        assert_eq!(MessageStream::from(vec![0, 42, 0]), stream);
        assert_eq!(stream.into_vec(), vec![0, 42, 0]);
    }
}
