//! The transport abstraction shared by the four mechanisms.

use crate::error::TransportError;
use crate::ipc::ring::{RingConfig, RingReceiver, RingSender};
use crate::names::ResourceNames;
use crate::pipe::{PipeEndpoint, PipeReceiver, PipeSender};
use crate::tcp::{SocketConfig, SocketReceiver, SocketSender};
use ipcbench_core::{Mechanism, Message, PayloadSize, Timestamp};
use std::os::fd::OwnedFd;

/// Lifecycle common to both ends of every mechanism.
pub trait Transport {
    /// Returns the mechanism implemented.
    fn mechanism(&self) -> Mechanism;

    /// Establishes the channel. May block until the peer shows up.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the channel cannot be created or opened.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Closes this end and removes the shared names this role owns.
    ///
    /// Must only be called once the handshake is complete, so the peer no
    /// longer needs the names.
    ///
    /// # Errors
    /// Returns [`TransportError`] if a removal fails.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Producer end: sends the whole stream in order.
pub trait Sender: Transport {
    /// Sends every message and returns the instant sending started.
    ///
    /// # Errors
    /// Returns [`TransportError`] on I/O failure, protocol violation or when
    /// called in the wrong state.
    fn send(&mut self, messages: &[Message]) -> Result<Timestamp, TransportError>;
}

/// Consumer end: fills `messages` in order.
pub trait Receiver: Transport {
    /// Receives exactly `messages.len()` messages and returns the instant the
    /// last one arrived.
    ///
    /// # Errors
    /// Returns [`TransportError`] on I/O failure, premature close, protocol
    /// violation or when called in the wrong state.
    fn receive(&mut self, messages: &mut [Message]) -> Result<Timestamp, TransportError>;
}

/// Everything a side needs to build its transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Mechanism to use.
    pub mechanism: Mechanism,
    /// Payload size, needed by the socket block plan.
    pub payload: PayloadSize,
    /// Names of the shared resources.
    pub names: ResourceNames,
    /// Socket settings.
    pub socket: SocketConfig,
    /// Ring buffer settings.
    pub ring: RingConfig,
}

impl TransportConfig {
    /// Creates a config with default names and settings.
    #[must_use]
    pub fn new(mechanism: Mechanism, payload: PayloadSize) -> Self {
        Self {
            mechanism,
            payload,
            names: ResourceNames::default(),
            socket: SocketConfig::default(),
            ring: RingConfig::default(),
        }
    }

    /// Sets the resource names.
    #[must_use]
    pub fn names(mut self, names: ResourceNames) -> Self {
        self.names = names;
        self
    }

    /// Sets the socket settings.
    #[must_use]
    pub fn socket(mut self, socket: SocketConfig) -> Self {
        self.socket = socket;
        self
    }

    /// Sets the ring buffer settings.
    #[must_use]
    pub fn ring(mut self, ring: RingConfig) -> Self {
        self.ring = ring;
        self
    }
}

/// Builds the producer end for `config.mechanism`.
///
/// `inherited` is the pipe write end and is required for (and only used by)
/// the anonymous pipe.
///
/// # Errors
/// Returns [`TransportError::InvalidState`] if the anonymous pipe has no
/// descriptor, and [`TransportError::Core`] for an invalid ring capacity.
pub fn sender(
    config: &TransportConfig,
    inherited: Option<OwnedFd>,
) -> Result<Box<dyn Sender>, TransportError> {
    Ok(match config.mechanism {
        Mechanism::AnonymousPipe => Box::new(PipeSender::new(inherited_endpoint(inherited)?)),
        Mechanism::NamedPipe => Box::new(PipeSender::new(PipeEndpoint::Named(
            config.names.fifo_path.clone(),
        ))),
        Mechanism::Socket => Box::new(SocketSender::new(config.socket.clone(), config.payload)),
        Mechanism::SharedMemory => {
            Box::new(RingSender::new(config.names.clone(), config.ring.clone())?)
        }
    })
}

/// Builds the consumer end for `config.mechanism`.
///
/// `inherited` is the pipe read end and is required for (and only used by)
/// the anonymous pipe.
///
/// # Errors
/// Returns [`TransportError::InvalidState`] if the anonymous pipe has no
/// descriptor, and [`TransportError::Core`] for an invalid ring capacity.
pub fn receiver(
    config: &TransportConfig,
    inherited: Option<OwnedFd>,
) -> Result<Box<dyn Receiver>, TransportError> {
    Ok(match config.mechanism {
        Mechanism::AnonymousPipe => Box::new(PipeReceiver::new(inherited_endpoint(inherited)?)),
        Mechanism::NamedPipe => Box::new(PipeReceiver::new(PipeEndpoint::Named(
            config.names.fifo_path.clone(),
        ))),
        Mechanism::Socket => Box::new(SocketReceiver::new(config.socket.clone(), config.payload)),
        Mechanism::SharedMemory => {
            Box::new(RingReceiver::new(config.names.clone(), config.ring.clone())?)
        }
    })
}

fn inherited_endpoint(inherited: Option<OwnedFd>) -> Result<PipeEndpoint, TransportError> {
    inherited.map(PipeEndpoint::Inherited).ok_or_else(|| {
        TransportError::invalid_state("anonymous pipe requires an inherited descriptor")
    })
}
