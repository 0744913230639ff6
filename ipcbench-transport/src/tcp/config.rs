//! Socket transport configuration.

use super::retry::ConnectRetry;
use std::net::{IpAddr, Ipv4Addr};

/// Default producer port.
pub const DEFAULT_PORT: u16 = 4000;

/// Configuration shared by both ends of the socket transport.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Address the producer binds to.
    pub bind_ip: IpAddr,
    /// Host the consumer connects to.
    pub host: String,
    /// Port of the producer.
    pub port: u16,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
    /// Listen backlog.
    pub backlog: i32,
    /// Connect retry policy of the consumer.
    pub retry: ConnectRetry,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            tcp_nodelay: true,
            backlog: 5,
            retry: ConnectRetry::default(),
        }
    }
}

impl SocketConfig {
    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host the consumer connects to.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the bind address of the producer.
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Enables or disables TCP_NODELAY.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets the connect retry policy.
    #[must_use]
    pub fn retry(mut self, retry: ConnectRetry) -> Self {
        self.retry = retry;
        self
    }
}

/// Progress of a socket transfer, on either end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Nothing set up yet.
    Idle,
    /// Producer bound and listening.
    Listening,
    /// Connection established.
    Accepted,
    /// Block plan exchanged, ready to transfer.
    Negotiated,
    /// Sending or receiving acknowledged blocks.
    BlockLoop,
    /// Sending or receiving the unacknowledged remainder.
    Remainder,
    /// Stream complete, awaiting the handshake.
    Draining,
    /// Connection closed.
    Closed,
}
