//! The `producer`, `consumer` and `ipcbench` binaries driven as real
//! processes.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use ipcbench_transport::ResourceNames;

const PRODUCER: &str = env!("CARGO_BIN_EXE_producer");
const CONSUMER: &str = env!("CARGO_BIN_EXE_consumer");
const LAUNCHER: &str = env!("CARGO_BIN_EXE_ipcbench");

fn namespace(tag: &str) -> String {
    let namespace = format!("e2e_{}_{}", tag, std::process::id());
    ResourceNames::namespaced(&namespace)
        .unwrap()
        .purge()
        .unwrap();
    namespace
}

fn role(bin: &str, args: &[&str], namespace: &str, log_dir: &Path) -> Command {
    let mut command = Command::new(bin);
    command
        .args(args)
        .arg("--namespace")
        .arg(namespace)
        .arg("--log-dir")
        .arg(log_dir)
        .env_remove("RUST_LOG");
    command
}

fn assert_duration(stdout: &[u8]) -> f64 {
    let text = String::from_utf8(stdout.to_vec()).unwrap();
    let line = text.trim();
    let (whole, fraction) = line.split_once('.').unwrap();
    assert!(!whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(fraction.len(), 3);
    assert!(fraction.chars().all(|c| c.is_ascii_digit()));
    line.parse().unwrap()
}

fn run_pair(args: &[&str], namespace: &str, log_dir: &Path) -> (Output, Output) {
    let producer = role(PRODUCER, args, namespace, log_dir)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let consumer = role(CONSUMER, args, namespace, log_dir)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let consumed = consumer.wait_with_output().unwrap();
    let produced = producer.wait_with_output().unwrap();
    (produced, consumed)
}

#[test]
fn test_named_pipe_pair() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("fifo");
    let (produced, consumed) = run_pair(&["1", "1"], &namespace, dir.path());

    assert!(produced.status.success());
    assert!(consumed.status.success());
    assert!(produced.stdout.is_empty());
    assert!(assert_duration(&consumed.stdout) >= 0.0);

    let info = std::fs::read_to_string(dir.path().join("info.log")).unwrap();
    assert!(info.contains("Producer"));
    assert!(info.contains("Consumer"));
    assert!(info.contains("Total transfer time"));
    assert!(info.contains("Throughput"));
    let errors = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(errors.is_empty());

    let names = ResourceNames::namespaced(&namespace).unwrap();
    assert!(!names.fifo_path.exists());
    assert!(names.purge().unwrap().is_empty());
}

#[test]
fn test_shared_memory_pair() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("shm");
    let (produced, consumed) = run_pair(&["3", "1", "--capacity", "64"], &namespace, dir.path());

    assert!(produced.status.success());
    assert!(consumed.status.success());
    assert_duration(&consumed.stdout);
    assert!(
        ResourceNames::namespaced(&namespace)
            .unwrap()
            .purge()
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_socket_pair() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("sock");
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
        .to_string();
    let (produced, consumed) = run_pair(
        &["2", "3", &port, "--host", "127.0.0.1"],
        &namespace,
        dir.path(),
    );

    assert!(produced.status.success());
    assert!(consumed.status.success());
    assert_duration(&consumed.stdout);
}

#[test]
fn test_anonymous_pipe_spawns_consumer() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("anon");
    let produced = role(PRODUCER, &["0", "1"], &namespace, dir.path())
        .arg("--consumer-bin")
        .arg(CONSUMER)
        .output()
        .unwrap();

    assert!(produced.status.success(), "{produced:?}");
    // The spawned consumer writes to the producer's stdout.
    assert_duration(&produced.stdout);
    let errors = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(errors.is_empty());
}

#[test]
fn test_rejects_invalid_selector() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("badsel");
    let produced = role(PRODUCER, &["4", "1"], &namespace, dir.path())
        .output()
        .unwrap();

    assert!(!produced.status.success());
    assert!(!produced.stderr.is_empty());
    let errors = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(errors.contains("ERROR"));
    assert!(
        ResourceNames::namespaced(&namespace)
            .unwrap()
            .purge()
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_rejects_invalid_size() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("badsize");
    for size in ["0", "101", "-3"] {
        let consumed = role(CONSUMER, &["3", size], &namespace, dir.path())
            .output()
            .unwrap();
        assert!(!consumed.status.success());
        assert!(consumed.stdout.is_empty());
    }
    let errors = std::fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert_eq!(errors.lines().filter(|line| line.contains("ERROR")).count(), 3);
}

#[test]
fn test_anonymous_consumer_rejects_bad_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("badfd");
    let consumed = role(CONSUMER, &["0", "1", "1048576"], &namespace, dir.path())
        .output()
        .unwrap();
    assert!(!consumed.status.success());
}

#[test]
fn test_launcher_repeats_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("launch");
    let launched = role(LAUNCHER, &["3", "1", "--repeat", "2"], &namespace, dir.path())
        .output()
        .unwrap();

    assert!(launched.status.success(), "{launched:?}");
    let stdout = String::from_utf8(launched.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_duration(lines[0].as_bytes());
    assert_duration(lines[1].as_bytes());
    assert!(lines[2].starts_with("runs 2 min "));
}

#[test]
fn test_launcher_anonymous_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("launch_anon");
    let launched = role(LAUNCHER, &["0", "1"], &namespace, dir.path())
        .output()
        .unwrap();

    assert!(launched.status.success(), "{launched:?}");
    assert_duration(&launched.stdout);
}

#[test]
fn test_launcher_stops_producer_when_consumer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let namespace = namespace("launch_fail");
    let started = Instant::now();
    let launched = role(LAUNCHER, &["1", "1", "--consumer-bin", "/bin/false"], &namespace, dir.path())
        .output()
        .unwrap();

    assert!(!launched.status.success());
    assert!(started.elapsed() < Duration::from_secs(15));
    let stderr = String::from_utf8(launched.stderr).unwrap();
    assert!(stderr.contains("consumer exited with"), "{stderr}");
    assert!(
        ResourceNames::namespaced(&namespace)
            .unwrap()
            .purge()
            .unwrap()
            .is_empty()
    );
}
