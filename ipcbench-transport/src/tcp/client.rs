//! Consumer end of the socket transport.

use super::config::{SocketConfig, SocketState};
use super::framing::WordStream;
use super::plan::BlockPlan;
use super::retry::RetryState;
use super::server::{BLOCK_ACK, FINAL_ACK};
use crate::error::TransportError;
use crate::transport::{Receiver, Transport};
use ipcbench_core::{Mechanism, Message, PayloadSize, Timestamp};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

/// Socket consumer: connects with retry, proposes the block plan and
/// acknowledges every block.
#[derive(Debug)]
pub struct SocketReceiver {
    config: SocketConfig,
    plan: BlockPlan,
    stream: Option<WordStream<TcpStream>>,
    state: SocketState,
    acks_sent: u32,
}

impl SocketReceiver {
    /// Creates an unconnected receiver.
    #[must_use]
    pub fn new(config: SocketConfig, payload: PayloadSize) -> Self {
        Self {
            config,
            plan: BlockPlan::for_payload(payload),
            stream: None,
            state: SocketState::Idle,
            acks_sent: 0,
        }
    }

    /// Returns the block plan this consumer proposes.
    #[must_use]
    pub fn plan(&self) -> BlockPlan {
        self.plan
    }

    /// Returns the number of block acknowledgments sent.
    #[must_use]
    pub fn acks_sent(&self) -> u32 {
        self.acks_sent
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state
    }

    fn connect(&self) -> Result<TcpStream, TransportError> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let mut retry = RetryState::new(self.config.retry.clone());

        loop {
            let err = match self.try_connect() {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };
            match retry.on_failure() {
                Some(delay) => {
                    tracing::debug!(
                        "Connect to {} failed (attempt {}): {}, retrying in {:?}",
                        target,
                        retry.attempts(),
                        err,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                None => {
                    return Err(TransportError::ConnectFailed {
                        addr: target,
                        attempts: retry.attempts(),
                        source: err,
                    });
                }
            }
        }
    }

    fn try_connect(&self) -> io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()?
            .collect();
        let mut last_err =
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

impl Transport for SocketReceiver {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Socket
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.state != SocketState::Idle {
            return Err(TransportError::invalid_state(format!(
                "cannot connect in state {:?}",
                self.state
            )));
        }
        let stream = self.connect()?;
        stream.set_nodelay(self.config.tcp_nodelay)?;
        let mut stream = WordStream::new(stream);
        self.state = SocketState::Accepted;

        stream.send_word(self.plan.blocks() as i32)?;
        stream.send_word(self.plan.remainder_units() as i32)?;
        self.stream = Some(stream);
        self.state = SocketState::Negotiated;
        tracing::debug!(
            "Connected to {}:{}, proposed {} blocks + {} remainder units",
            self.config.host,
            self.config.port,
            self.plan.blocks(),
            self.plan.remainder_units()
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        self.state = SocketState::Closed;
        tracing::debug!("Socket consumer closed");
        Ok(())
    }
}

impl Receiver for SocketReceiver {
    fn receive(&mut self, messages: &mut [Message]) -> Result<Timestamp, TransportError> {
        if self.state != SocketState::Negotiated {
            return Err(TransportError::invalid_state(format!(
                "cannot receive in state {:?}",
                self.state
            )));
        }
        let plan = self.plan;
        if messages.len() != plan.total_messages() {
            return Err(TransportError::invalid_state(format!(
                "buffer of {} messages does not match plan of {}",
                messages.len(),
                plan.total_messages()
            )));
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("socket consumer not connected"))?;

        self.state = SocketState::BlockLoop;
        for block in 0..plan.blocks() {
            stream.recv_words(&mut messages[plan.block_range(block)])?;
            stream.send_word(BLOCK_ACK)?;
            self.acks_sent += 1;
        }

        self.state = SocketState::Remainder;
        if plan.expects_final_ack() {
            stream.send_word(FINAL_ACK)?;
        } else {
            stream.recv_words(&mut messages[plan.remainder_range()])?;
        }
        let end = Timestamp::now();

        self.state = SocketState::Draining;
        tracing::debug!(
            "Socket consumer received {} messages, sent {} acks",
            messages.len(),
            self.acks_sent
        );
        Ok(end)
    }
}
