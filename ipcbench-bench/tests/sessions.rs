//! Full producer/consumer sessions through the runners, one per mechanism.

use std::net::TcpListener;
use std::thread;

use ipcbench_bench::{SessionConfig, run_consumer, run_producer};
use ipcbench_core::{Error as CoreError, Mechanism, PayloadSize, Role, Timestamp, format_elapsed};
use ipcbench_transport::{
    Handshake, ResourceNames, RingConfig, SocketConfig, TransportConfig, TransportError, sender,
};

fn config(mechanism: Mechanism, units: i64, tag: &str) -> SessionConfig {
    let names =
        ResourceNames::namespaced(&format!("run_{}_{}", tag, std::process::id())).unwrap();
    names.purge().unwrap();
    let transport = TransportConfig::new(mechanism, PayloadSize::new(units).unwrap()).names(names);
    SessionConfig::new(transport).seed(units as u64)
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn run_session(
    config: SessionConfig,
    pipe: Option<(std::os::fd::OwnedFd, std::os::fd::OwnedFd)>,
) -> f64 {
    let (read, write) = match pipe {
        Some((read, write)) => (Some(read), Some(write)),
        None => (None, None),
    };
    let stream = config.generate_stream();
    let expected = stream.clone();

    let producer_config = config.clone();
    let producer = thread::spawn(move || run_producer(&producer_config, &stream, write).unwrap());

    let consumer = run_consumer(&config, read).unwrap();
    let produced = producer.join().unwrap();

    assert_eq!(consumer.received, expected);
    assert_eq!(produced.messages, expected.len());
    assert_eq!(consumer.report.start, produced.start);
    assert_eq!(consumer.report.mechanism, config.transport.mechanism);
    assert!(consumer.report.duration_secs >= 0.0);
    assert_eq!(
        consumer.report.to_string(),
        format_elapsed(produced.start.seconds_until(consumer.report.end).unwrap())
    );
    assert!(config.transport.names.purge().unwrap().is_empty());
    consumer.report.duration_secs
}

#[test]
fn test_named_pipe_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(Mechanism::NamedPipe, 1, "fifo");
    config.transport.names.fifo_path = dir.path().join("fifo");
    run_session(config.clone(), None);
    assert!(!config.transport.names.fifo_path.exists());
}

#[test]
fn test_anonymous_pipe_session() {
    let config = config(Mechanism::AnonymousPipe, 1, "anon");
    run_session(config, Some(nix::unistd::pipe().unwrap()));
}

#[test]
fn test_socket_session() {
    let mut config = config(Mechanism::Socket, 5, "sock");
    config.transport.socket = SocketConfig::default().host("127.0.0.1").port(free_port());
    run_session(config, None);
}

#[test]
fn test_shared_memory_session() {
    let config = config(Mechanism::SharedMemory, 2, "shm");
    run_session(config, None);
}

#[test]
fn test_shared_memory_small_ring() {
    let mut config = config(Mechanism::SharedMemory, 1, "shm_small");
    config.transport.ring = RingConfig::new(8);
    run_session(config, None);
}

#[test]
fn test_repeated_sessions_are_idempotent() {
    let base = config(Mechanism::SharedMemory, 1, "repeat");
    for _ in 0..3 {
        run_session(base.clone(), None);
    }
}

#[test]
fn test_negative_duration_releases_names_first() {
    let mut config = config(Mechanism::SharedMemory, 1, "negative");
    config.transport.ring = RingConfig::new(64);
    let stream = config.generate_stream();

    let transport = config.transport.clone();
    let producer = thread::spawn(move || {
        let mut tx = sender(&transport, None).unwrap();
        let mut handshake = Handshake::open(&transport.names, Role::Producer).unwrap();
        tx.open().unwrap();
        let sent = tx.send(&stream).unwrap();
        // A start one minute after the data arrived.
        let late = Timestamp::from_millis(sent.as_millis() + 60_000.0);
        handshake.publish_start_time(late).unwrap();
        handshake.wait_for_reader_done().unwrap();
        tx.close().unwrap();
        handshake.release().unwrap();
    });

    let err = run_consumer(&config, None).unwrap_err();
    producer.join().unwrap();

    match err {
        TransportError::Core(CoreError::NegativeDuration { start_ms, end_ms }) => {
            assert!(start_ms > end_ms);
        }
        other => panic!("expected a negative duration, got {other:?}"),
    }
    assert!(config.transport.names.purge().unwrap().is_empty());
}
