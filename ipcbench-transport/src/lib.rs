//! # ipcbench Transport
//!
//! Transfer engine moving a message stream from a producer process to a
//! consumer process.
//!
//! This crate provides:
//! - [`pipe`] - Anonymous and named pipe transport
//! - [`tcp`] - TCP transport with block/acknowledge flow control
//! - [`ipc`] - Shared-memory ring buffer transport
//! - [`handshake`] - Cross-process start-time handoff used by every transport
//! - [`sync`] - POSIX named semaphores
//!
//! Producer and consumer meet on well-known [`ResourceNames`]; use
//! [`ResourceNames::namespaced`] to run sessions side by side.

pub mod error;
pub mod handshake;
pub mod ipc;
pub mod names;
pub mod pipe;
pub mod sync;
pub mod tcp;
pub mod transport;

pub use error::TransportError;
pub use handshake::Handshake;
pub use ipc::{RingConfig, RingOccupancy, RingReceiver, RingSender};
pub use names::ResourceNames;
pub use pipe::{PipeEndpoint, PipeReceiver, PipeSender, PipeState};
pub use tcp::{ConnectRetry, SocketConfig, SocketReceiver, SocketSender};
pub use transport::{Receiver, Sender, Transport, TransportConfig, receiver, sender};
