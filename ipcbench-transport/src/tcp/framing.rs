//! Word framing for the socket transport.
//!
//! Everything on the wire is a 4-byte integer in host byte order: the two
//! negotiation values, each message and each acknowledgment. There is no
//! length prefix; both sides know every count from the block plan.

use crate::error::TransportError;
use bytes::{Buf, BufMut, BytesMut};
use ipcbench_core::{MESSAGE_SIZE, Message};
use std::io::{Read, Write};

/// Appends `words` to `dst` in wire order.
pub fn encode_words(dst: &mut BytesMut, words: &[Message]) {
    dst.reserve(words.len() * MESSAGE_SIZE);
    for &word in words {
        dst.put_i32_ne(word);
    }
}

/// Decodes `dst.len()` words from `src`.
///
/// # Errors
/// Returns [`TransportError::Protocol`] if `src` does not hold exactly that
/// many words.
pub fn decode_words(mut src: &[u8], dst: &mut [Message]) -> Result<(), TransportError> {
    if src.len() != dst.len() * MESSAGE_SIZE {
        return Err(TransportError::protocol(format!(
            "expected {} bytes for {} words, got {}",
            dst.len() * MESSAGE_SIZE,
            dst.len(),
            src.len()
        )));
    }
    for slot in dst.iter_mut() {
        *slot = src.get_i32_ne();
    }
    Ok(())
}

/// Blocking stream of 4-byte words with a reusable buffer.
#[derive(Debug)]
pub struct WordStream<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S: Read + Write> WordStream<S> {
    /// Wraps `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
        }
    }

    /// Unwraps the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Writes one word.
    ///
    /// # Errors
    /// Returns [`TransportError::Io`] if the write fails.
    pub fn send_word(&mut self, word: i32) -> Result<(), TransportError> {
        self.stream.write_all(&word.to_ne_bytes())?;
        Ok(())
    }

    /// Reads one word.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the peer closed first.
    pub fn recv_word(&mut self) -> Result<i32, TransportError> {
        let mut word = [0u8; MESSAGE_SIZE];
        self.stream
            .read_exact(&mut word)
            .map_err(TransportError::from_read)?;
        Ok(i32::from_ne_bytes(word))
    }

    /// Encodes `words` into the buffer and writes them in one go.
    ///
    /// # Errors
    /// Returns [`TransportError::Io`] if the write fails.
    pub fn send_words(&mut self, words: &[Message]) -> Result<(), TransportError> {
        self.buffer.clear();
        encode_words(&mut self.buffer, words);
        self.stream.write_all(&self.buffer)?;
        Ok(())
    }

    /// Fills `words` from the stream.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the peer closed first.
    pub fn recv_words(&mut self, words: &mut [Message]) -> Result<(), TransportError> {
        self.buffer.clear();
        self.buffer.resize(words.len() * MESSAGE_SIZE, 0);
        self.stream
            .read_exact(&mut self.buffer)
            .map_err(TransportError::from_read)?;
        decode_words(&self.buffer, words)
    }
}
