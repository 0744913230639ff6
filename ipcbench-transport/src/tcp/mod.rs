//! Socket transport.
//!
//! The producer is a one-shot TCP server and the consumer its client. After
//! the consumer proposes a [`BlockPlan`], the payload flows in acknowledged
//! blocks so at most one block is ever unacknowledged.

pub mod client;
pub mod config;
pub mod framing;
pub mod plan;
pub mod retry;
pub mod server;

pub use client::SocketReceiver;
pub use config::{DEFAULT_PORT, SocketConfig, SocketState};
pub use framing::{WordStream, decode_words, encode_words};
pub use plan::{BLOCK_UNITS, BlockPlan};
pub use retry::{ConnectRetry, RetryState};
pub use server::{BLOCK_ACK, FINAL_ACK, SocketSender};
