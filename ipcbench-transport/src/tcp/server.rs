//! Producer end of the socket transport: a one-shot TCP server.

use super::config::{SocketConfig, SocketState};
use super::framing::WordStream;
use super::plan::BlockPlan;
use crate::error::TransportError;
use crate::transport::{Sender, Transport};
use ipcbench_core::{Mechanism, Message, PayloadSize, Timestamp};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Acknowledgment value for each block.
pub const BLOCK_ACK: i32 = 1;
/// Acknowledgment value closing a transfer without remainder.
pub const FINAL_ACK: i32 = 0;

/// Socket producer: binds, accepts one consumer and streams the payload.
#[derive(Debug)]
pub struct SocketSender {
    config: SocketConfig,
    payload: PayloadSize,
    listener: Option<TcpListener>,
    stream: Option<WordStream<TcpStream>>,
    plan: Option<BlockPlan>,
    state: SocketState,
    acks_received: u32,
}

impl SocketSender {
    /// Creates an unbound sender.
    #[must_use]
    pub fn new(config: SocketConfig, payload: PayloadSize) -> Self {
        Self {
            config,
            payload,
            listener: None,
            stream: None,
            plan: None,
            state: SocketState::Idle,
            acks_received: 0,
        }
    }

    /// Binds and listens without waiting for the consumer.
    ///
    /// Useful when the port is 0 and the consumer needs the assigned one
    /// from [`SocketSender::local_addr`].
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if the socket cannot be bound.
    pub fn listen(&mut self) -> Result<SocketAddr, TransportError> {
        if self.state != SocketState::Idle {
            return Err(TransportError::invalid_state(format!(
                "cannot listen in state {:?}",
                self.state
            )));
        }
        let addr = SocketAddr::new(self.config.bind_ip, self.config.port);
        let bind_err =
            |err: std::io::Error| TransportError::resource("socket bind", addr.to_string(), err);

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.listen(self.config.backlog).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        let local = listener.local_addr()?;
        self.listener = Some(listener);
        self.state = SocketState::Listening;
        tracing::debug!("Socket producer listening on {}", local);
        Ok(local)
    }

    /// Returns the bound address, once listening.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidState`] before [`SocketSender::listen`].
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| TransportError::invalid_state("socket producer not listening"))?;
        Ok(listener.local_addr()?)
    }

    /// Returns the negotiated plan.
    #[must_use]
    pub fn plan(&self) -> Option<BlockPlan> {
        self.plan
    }

    /// Returns the number of block acknowledgments received.
    #[must_use]
    pub fn acks_received(&self) -> u32 {
        self.acks_received
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state
    }

    fn negotiate(&mut self) -> Result<(), TransportError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("no consumer connected"))?;
        let blocks = stream.recv_word()?;
        let remainder = stream.recv_word()?;
        let plan = BlockPlan::from_negotiation(self.payload, blocks, remainder)?;
        tracing::debug!(
            "Negotiated {} blocks of {} messages, remainder {} messages",
            plan.blocks(),
            plan.block_messages(),
            plan.remainder_messages()
        );
        self.plan = Some(plan);
        self.state = SocketState::Negotiated;
        Ok(())
    }
}

impl Transport for SocketSender {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Socket
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.state == SocketState::Idle {
            self.listen()?;
        }
        if self.state != SocketState::Listening {
            return Err(TransportError::invalid_state(format!(
                "cannot accept in state {:?}",
                self.state
            )));
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| TransportError::invalid_state("socket producer not listening"))?;

        let (stream, peer) = listener.accept()?;
        stream.set_nodelay(self.config.tcp_nodelay)?;
        self.stream = Some(WordStream::new(stream));
        self.state = SocketState::Accepted;
        tracing::debug!("Accepted consumer {}", peer);

        self.negotiate()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        self.listener = None;
        self.state = SocketState::Closed;
        tracing::debug!("Socket producer closed");
        Ok(())
    }
}

impl Sender for SocketSender {
    fn send(&mut self, messages: &[Message]) -> Result<Timestamp, TransportError> {
        if self.state != SocketState::Negotiated {
            return Err(TransportError::invalid_state(format!(
                "cannot send in state {:?}",
                self.state
            )));
        }
        let plan = self
            .plan
            .ok_or_else(|| TransportError::invalid_state("no block plan"))?;
        if messages.len() != plan.total_messages() {
            return Err(TransportError::invalid_state(format!(
                "stream of {} messages does not match plan of {}",
                messages.len(),
                plan.total_messages()
            )));
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("no consumer connected"))?;

        let start = Timestamp::now();
        self.state = SocketState::BlockLoop;
        for block in 0..plan.blocks() {
            stream.send_words(&messages[plan.block_range(block)])?;
            let ack = stream.recv_word()?;
            if ack != BLOCK_ACK {
                return Err(TransportError::UnexpectedAck {
                    block,
                    value: ack,
                    expected: BLOCK_ACK,
                });
            }
            self.acks_received += 1;
        }

        self.state = SocketState::Remainder;
        if plan.expects_final_ack() {
            let ack = stream.recv_word()?;
            if ack != FINAL_ACK {
                return Err(TransportError::UnexpectedAck {
                    block: plan.blocks(),
                    value: ack,
                    expected: FINAL_ACK,
                });
            }
        } else {
            stream.send_words(&messages[plan.remainder_range()])?;
        }

        self.state = SocketState::Draining;
        tracing::debug!(
            "Socket producer sent {} messages, {} blocks acknowledged",
            messages.len(),
            self.acks_received
        );
        Ok(start)
    }
}
