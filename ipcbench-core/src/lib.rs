//! # ipcbench Core
//!
//! Core types shared by every transport and by both benchmark roles.
//!
//! This crate provides:
//! - The message model ([`Message`], [`MessageStream`])
//! - The mechanism selector ([`Mechanism`]) and payload size ([`PayloadSize`])
//! - Wall-clock timestamps and the per-run [`TransferSession`]
//! - Error types for configuration and timing failures

pub mod error;
pub mod mechanism;
pub mod message;
pub mod payload;
pub mod session;

pub use error::{Error, Result};
pub use mechanism::{Mechanism, Role};
pub use message::{BYTES_PER_UNIT, MESSAGE_SIZE, Message, MessageStream};
pub use payload::{MAX_PAYLOAD_UNITS, PayloadSize};
pub use session::{Timestamp, TransferSession, format_elapsed};
