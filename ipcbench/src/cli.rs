//! Command-line model shared by the `producer`, `consumer` and `ipcbench`
//! binaries.
//!
//! Positional values are taken raw and validated after logging is set up, so
//! a rejected selector or size still leaves a trace in the error log.

use anyhow::{Context, bail};
use clap::{Args, Parser};
use ipcbench_core::{Mechanism, PayloadSize};
use ipcbench_transport::ipc::DEFAULT_RING_CAPACITY;
use ipcbench_transport::pipe::adopt_descriptor;
use ipcbench_transport::tcp::DEFAULT_PORT;
use ipcbench_transport::{ConnectRetry, ResourceNames, RingConfig, SocketConfig, TransportConfig};
use std::ffi::OsString;
use std::os::fd::{OwnedFd, RawFd};
use std::path::PathBuf;

/// Options common to every binary.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Directory holding info.log and errors.log.
    #[arg(long, env = "IPCBENCH_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Suffix appended to every fifo, segment and semaphore name.
    #[arg(long, env = "IPCBENCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Host the socket consumer connects to.
    #[arg(long, env = "IPCBENCH_HOST", default_value = "localhost")]
    pub host: String,

    /// Ring buffer capacity in message slots.
    #[arg(long, env = "IPCBENCH_RING_CAPACITY", default_value_t = DEFAULT_RING_CAPACITY)]
    pub capacity: usize,

    /// Socket connect attempts, one second apart.
    #[arg(long, default_value_t = 5)]
    pub connect_attempts: usize,

    /// Consumer binary spawned for the anonymous pipe.
    #[arg(long, env = "IPCBENCH_CONSUMER_BIN")]
    pub consumer_bin: Option<PathBuf>,
}

impl CommonArgs {
    /// Resolves the resource names for the configured namespace.
    ///
    /// # Errors
    /// Returns an error for a namespace with characters outside
    /// `[A-Za-z0-9_-]`.
    pub fn names(&self) -> anyhow::Result<ResourceNames> {
        ResourceNames::resolve(self.namespace.as_deref()).context("invalid namespace")
    }

    /// Re-encodes these options as command-line flags for a child process.
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--log-dir".into(),
            self.log_dir.clone().into(),
            "--host".into(),
            self.host.clone().into(),
            "--capacity".into(),
            self.capacity.to_string().into(),
            "--connect-attempts".into(),
            self.connect_attempts.to_string().into(),
        ];
        if let Some(namespace) = &self.namespace {
            args.push("--namespace".into());
            args.push(namespace.into());
        }
        if let Some(consumer_bin) = &self.consumer_bin {
            args.push("--consumer-bin".into());
            args.push(consumer_bin.clone().into());
        }
        args
    }
}

/// Arguments of the `producer` and `consumer` binaries.
#[derive(Debug, Clone, Parser)]
#[command(version, allow_negative_numbers = true)]
pub struct RoleArgs {
    /// Mechanism: 0 anonymous pipe, 1 named pipe, 2 socket, 3 shared memory.
    pub mechanism: i64,

    /// Payload size in size-units (1 to 100).
    pub size: i64,

    /// Port for the socket; inherited read descriptor for the anonymous pipe
    /// consumer.
    pub extra: Option<i64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl RoleArgs {
    /// Validates the mechanism selector.
    ///
    /// # Errors
    /// Returns an error for selectors outside `0..=3`.
    pub fn mechanism(&self) -> anyhow::Result<Mechanism> {
        Ok(Mechanism::from_selector(self.mechanism)?)
    }

    /// Validates the payload size.
    ///
    /// # Errors
    /// Returns an error for sizes outside `1..=100`.
    pub fn payload(&self) -> anyhow::Result<PayloadSize> {
        Ok(PayloadSize::new(self.size)?)
    }

    /// Returns the socket port: the extra argument, or the default.
    ///
    /// # Errors
    /// Returns an error for values outside `1..=65535`.
    pub fn port(&self) -> anyhow::Result<u16> {
        match self.extra {
            None => Ok(DEFAULT_PORT),
            Some(port) => match u16::try_from(port) {
                Ok(port) if port != 0 => Ok(port),
                _ => bail!("invalid port {port}"),
            },
        }
    }

    /// Builds the transport config, validating every value.
    ///
    /// # Errors
    /// Returns an error for an invalid selector, size, port, capacity or
    /// namespace.
    pub fn transport_config(&self) -> anyhow::Result<TransportConfig> {
        let mechanism = self.mechanism()?;
        let payload = self.payload()?;
        let ring = RingConfig::new(self.common.capacity);
        ring.validate()?;

        let mut socket = SocketConfig::default()
            .host(self.common.host.clone())
            .retry(ConnectRetry::default().max_attempts(self.common.connect_attempts));
        if mechanism == Mechanism::Socket {
            socket = socket.port(self.port()?);
        }

        Ok(TransportConfig::new(mechanism, payload)
            .names(self.common.names()?)
            .socket(socket)
            .ring(ring))
    }

    /// Adopts the inherited pipe read end named by the extra argument.
    ///
    /// # Errors
    /// Returns an error if the argument is missing or not an open descriptor.
    pub fn inherited_read_end(&self) -> anyhow::Result<OwnedFd> {
        let Some(fd) = self.extra else {
            bail!("anonymous pipe consumer needs the inherited descriptor as third argument");
        };
        let fd = RawFd::try_from(fd).with_context(|| format!("invalid descriptor {fd}"))?;
        Ok(adopt_descriptor(fd)?)
    }
}

/// Arguments of the `ipcbench` launcher.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Runs producer and consumer for one mechanism and size")]
#[command(allow_negative_numbers = true)]
pub struct LaunchArgs {
    /// Mechanism: 0 anonymous pipe, 1 named pipe, 2 socket, 3 shared memory.
    pub mechanism: i64,

    /// Payload size in size-units (1 to 100).
    pub size: i64,

    /// Socket port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of sessions to run.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl LaunchArgs {
    /// Arguments for the role binaries, validated up front.
    ///
    /// # Errors
    /// Returns an error for an invalid selector, size or namespace.
    pub fn role_args(&self) -> anyhow::Result<RoleArgs> {
        let role = RoleArgs {
            mechanism: self.mechanism,
            size: self.size,
            extra: (self.mechanism == Mechanism::Socket as i64).then_some(i64::from(self.port)),
            common: self.common.clone(),
        };
        role.transport_config()?;
        Ok(role)
    }
}
