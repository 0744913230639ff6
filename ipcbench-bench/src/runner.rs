//! Producer and consumer session orchestration.
//!
//! Each runner drives one side of a transfer from start to teardown:
//!
//! - producer: open, send, publish start time, wait for reader done, close
//! - consumer: open, receive, consume start time, close, compute duration
//!
//! The consumer tears down its shared names even when the computed duration
//! is negative, then reports the error.

use crate::report::TransferReport;
use ipcbench_core::{MessageStream, Role, Timestamp, TransferSession};
use ipcbench_transport::{Handshake, TransportConfig, TransportError, receiver, sender};
use std::os::fd::OwnedFd;

/// Configuration of one side of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport settings.
    pub transport: TransportConfig,
    /// Seed for the generated stream; random when `None`.
    pub seed: Option<u64>,
}

impl SessionConfig {
    /// Creates a config for `transport` with a random stream.
    #[must_use]
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            seed: None,
        }
    }

    /// Sets the stream seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Generates the producer's message stream.
    #[must_use]
    pub fn generate_stream(&self) -> MessageStream {
        match self.seed {
            Some(seed) => MessageStream::generate_seeded(self.transport.payload, seed),
            None => MessageStream::generate(self.transport.payload),
        }
    }
}

/// What the producer knows once its side is done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProducerReport {
    /// Start timestamp it published.
    pub start: Timestamp,
    /// Messages sent.
    pub messages: usize,
}

/// What the consumer knows once its side is done.
#[derive(Debug, Clone)]
pub struct ConsumerReport {
    /// Timing of the transfer.
    pub report: TransferReport,
    /// Messages received, in order.
    pub received: MessageStream,
}

/// Runs the producer side: sends `stream` and waits for the consumer to
/// acknowledge the start time.
///
/// `inherited` is the write end of the anonymous pipe.
///
/// # Errors
/// Returns [`TransportError`] if any transport or handshake step fails.
pub fn run_producer(
    config: &SessionConfig,
    stream: &MessageStream,
    inherited: Option<OwnedFd>,
) -> Result<ProducerReport, TransportError> {
    let transport = &config.transport;
    let span = tracing::info_span!("Producer");
    let _enter = span.enter();

    tracing::info!(
        "Transferring {} ({} messages) via {}",
        transport.payload,
        stream.len(),
        transport.mechanism
    );

    // Builds and validates the transport before any shared name exists.
    let mut sender = sender(transport, inherited)?;
    let mut handshake = Handshake::open(&transport.names, Role::Producer)?;

    tracing::info!("Opening {}", transport.mechanism);
    sender.open()?;

    tracing::info!("Starting transfer timer");
    let start = sender.send(stream)?;
    tracing::info!("Transfer complete");

    tracing::info!("Publishing transfer start time");
    handshake.publish_start_time(start)?;

    tracing::info!("Waiting for consumer to read start time");
    handshake.wait_for_reader_done()?;

    tracing::info!("Closing {}", transport.mechanism);
    sender.close()?;
    handshake.release()?;
    tracing::info!("Resources released");

    Ok(ProducerReport {
        start,
        messages: stream.len(),
    })
}

/// Runs the consumer side: receives the stream, picks up the start time and
/// computes the elapsed transfer time.
///
/// `inherited` is the read end of the anonymous pipe.
///
/// # Errors
/// Returns [`TransportError`] if any transport or handshake step fails, and
/// [`TransportError::Core`] if the duration is negative.
pub fn run_consumer(
    config: &SessionConfig,
    inherited: Option<OwnedFd>,
) -> Result<ConsumerReport, TransportError> {
    let transport = &config.transport;
    let span = tracing::info_span!("Consumer");
    let _enter = span.enter();

    tracing::info!(
        "Total data transfer size: {} via {}",
        transport.payload,
        transport.mechanism
    );

    let mut session = TransferSession::new(transport.mechanism, transport.payload);
    let mut receiver = receiver(transport, inherited)?;
    let mut handshake = Handshake::open(&transport.names, Role::Consumer)?;
    let mut received = MessageStream::zeroed(transport.payload);

    tracing::info!("Opening {}", transport.mechanism);
    receiver.open()?;

    tracing::info!("Starting read");
    let end = receiver.receive(&mut received)?;
    session.record_end(end);
    tracing::info!("Ending transfer timer, read complete");

    tracing::info!("Reading transfer start time");
    let start = handshake.wait_and_consume_start_time()?;
    session.record_start(start);

    tracing::info!("Closing {}", transport.mechanism);
    receiver.close()?;
    handshake.release()?;
    tracing::info!("Resources released");

    let report = TransferReport::from_session(&session)?;
    tracing::info!("Total transfer time: {} seconds", report);
    tracing::info!(
        "Throughput: {:.0} messages/s, {:.2} MB/s",
        report.messages_per_second(),
        report.mb_per_second()
    );

    Ok(ConsumerReport { report, received })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcbench_core::{Mechanism, PayloadSize};

    #[test]
    fn test_session_config_seeded_stream() {
        let transport = TransportConfig::new(Mechanism::NamedPipe, PayloadSize::new(1).unwrap());
        let config = SessionConfig::new(transport).seed(42);
        let first = config.generate_stream();
        assert_eq!(first.len(), 262_250);
        assert_eq!(first, config.generate_stream());
        assert!(first.iter().all(|&m| (0..100).contains(&m)));
    }
}
