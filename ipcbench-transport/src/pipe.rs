//! Pipe transport, over a named fifo or an inherited anonymous pipe end.
//!
//! Every message travels as one discrete 4-byte write in native byte order;
//! the reader completes short reads, so ordering is total and lossless.

use crate::error::TransportError;
use crate::transport::{Receiver, Sender, Transport};
use ipcbench_core::{MESSAGE_SIZE, Mechanism, Message, Timestamp};
use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

/// Permission bits for a newly created fifo.
const FIFO_MODE: libc::mode_t = 0o666;

/// Where a pipe end comes from.
#[derive(Debug)]
pub enum PipeEndpoint {
    /// Fifo at a well-known path, created if absent.
    Named(PathBuf),
    /// Descriptor handed over by the launching process.
    Inherited(OwnedFd),
}

impl PipeEndpoint {
    /// Adopts a descriptor number received on the command line.
    ///
    /// # Errors
    /// See [`adopt_descriptor`].
    pub fn inherit(fd: RawFd) -> Result<Self, TransportError> {
        adopt_descriptor(fd).map(Self::Inherited)
    }

    /// Returns the mechanism this endpoint implements.
    #[must_use]
    pub fn mechanism(&self) -> Mechanism {
        match self {
            Self::Named(_) => Mechanism::NamedPipe,
            Self::Inherited(_) => Mechanism::AnonymousPipe,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Named(path) => path.display().to_string(),
            Self::Inherited(_) => "inherited descriptor".to_string(),
        }
    }
}

/// Takes ownership of descriptor `fd`, inherited from the launching process.
///
/// # Errors
/// Returns [`TransportError::Resource`] if `fd` is not an open descriptor of
/// this process.
pub fn adopt_descriptor(fd: RawFd) -> Result<OwnedFd, TransportError> {
    if fd < 0 {
        return Err(TransportError::resource(
            "pipe inherit",
            fd.to_string(),
            std::io::Error::from_raw_os_error(libc::EBADF),
        ));
    }
    // SAFETY: F_GETFD only queries descriptor flags.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(TransportError::last_os_error("pipe inherit", fd.to_string()));
    }
    // SAFETY: the descriptor is open and was handed to this process for
    // exclusive use by its launcher.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Lifecycle of a pipe end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Not opened yet.
    Unopened,
    /// Channel open, nothing transferred.
    Open,
    /// Transfer in progress.
    Streaming,
    /// Whole stream transferred.
    Drained,
    /// End closed.
    Closed,
}

/// Creates the fifo at `path` unless something already exists there.
///
/// # Errors
/// Returns [`TransportError::Resource`] if `mkfifo` fails for a reason other
/// than `EEXIST`.
pub fn ensure_fifo(path: &Path) -> Result<(), TransportError> {
    match mkfifo(path, Mode::from_bits_truncate(FIFO_MODE)) {
        Ok(()) => {
            tracing::debug!("Created fifo {}", path.display());
            Ok(())
        }
        Err(Errno::EEXIST) => Ok(()),
        Err(errno) => Err(TransportError::resource(
            "mkfifo",
            path.display().to_string(),
            errno.into(),
        )),
    }
}

fn open_end(endpoint: PipeEndpoint, write: bool) -> Result<File, TransportError> {
    match endpoint {
        PipeEndpoint::Named(path) => {
            ensure_fifo(&path)?;
            // Blocks until the other end opens the fifo too.
            OpenOptions::new()
                .read(!write)
                .write(write)
                .open(&path)
                .map_err(|err| {
                    TransportError::resource("fifo open", path.display().to_string(), err)
                })
        }
        PipeEndpoint::Inherited(fd) => Ok(File::from(fd)),
    }
}

fn expect_state(
    actual: PipeState,
    expected: PipeState,
    operation: &str,
) -> Result<(), TransportError> {
    if actual == expected {
        Ok(())
    } else {
        Err(TransportError::invalid_state(format!(
            "cannot {operation} pipe in state {actual:?}"
        )))
    }
}

/// Producer end of a pipe.
#[derive(Debug)]
pub struct PipeSender {
    mechanism: Mechanism,
    endpoint: Option<PipeEndpoint>,
    file: Option<File>,
    state: PipeState,
}

impl PipeSender {
    /// Creates an unopened sender for `endpoint`.
    #[must_use]
    pub fn new(endpoint: PipeEndpoint) -> Self {
        Self {
            mechanism: endpoint.mechanism(),
            endpoint: Some(endpoint),
            file: None,
            state: PipeState::Unopened,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PipeState {
        self.state
    }
}

impl Transport for PipeSender {
    fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    fn open(&mut self) -> Result<(), TransportError> {
        expect_state(self.state, PipeState::Unopened, "open")?;
        let endpoint = self
            .endpoint
            .take()
            .ok_or_else(|| TransportError::invalid_state("pipe endpoint already consumed"))?;
        let what = endpoint.describe();
        self.file = Some(open_end(endpoint, true)?);
        self.state = PipeState::Open;
        tracing::debug!("Pipe writer open on {}", what);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.file = None;
        self.state = PipeState::Closed;
        tracing::debug!("Pipe writer closed");
        Ok(())
    }
}

impl Sender for PipeSender {
    fn send(&mut self, messages: &[Message]) -> Result<Timestamp, TransportError> {
        expect_state(self.state, PipeState::Open, "send on")?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("pipe writer not open"))?;

        self.state = PipeState::Streaming;
        let start = Timestamp::now();
        for message in messages {
            file.write_all(&message.to_ne_bytes())?;
        }
        self.state = PipeState::Drained;
        tracing::debug!("Pipe writer sent {} messages", messages.len());
        Ok(start)
    }
}

/// Consumer end of a pipe.
#[derive(Debug)]
pub struct PipeReceiver {
    mechanism: Mechanism,
    endpoint: Option<PipeEndpoint>,
    fifo_path: Option<PathBuf>,
    file: Option<File>,
    state: PipeState,
}

impl PipeReceiver {
    /// Creates an unopened receiver for `endpoint`.
    #[must_use]
    pub fn new(endpoint: PipeEndpoint) -> Self {
        let fifo_path = match &endpoint {
            PipeEndpoint::Named(path) => Some(path.clone()),
            PipeEndpoint::Inherited(_) => None,
        };
        Self {
            mechanism: endpoint.mechanism(),
            endpoint: Some(endpoint),
            fifo_path,
            file: None,
            state: PipeState::Unopened,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PipeState {
        self.state
    }
}

impl Transport for PipeReceiver {
    fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    fn open(&mut self) -> Result<(), TransportError> {
        expect_state(self.state, PipeState::Unopened, "open")?;
        let endpoint = self
            .endpoint
            .take()
            .ok_or_else(|| TransportError::invalid_state("pipe endpoint already consumed"))?;
        let what = endpoint.describe();
        self.file = Some(open_end(endpoint, false)?);
        self.state = PipeState::Open;
        tracing::debug!("Pipe reader open on {}", what);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.file = None;
        self.state = PipeState::Closed;
        if let Some(path) = self.fifo_path.take() {
            std::fs::remove_file(&path).map_err(|err| {
                TransportError::resource("fifo remove", path.display().to_string(), err)
            })?;
            tracing::debug!("Removed fifo {}", path.display());
        }
        tracing::debug!("Pipe reader closed");
        Ok(())
    }
}

impl Receiver for PipeReceiver {
    fn receive(&mut self, messages: &mut [Message]) -> Result<Timestamp, TransportError> {
        expect_state(self.state, PipeState::Open, "receive on")?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TransportError::invalid_state("pipe reader not open"))?;

        self.state = PipeState::Streaming;
        let mut word = [0u8; MESSAGE_SIZE];
        for slot in messages.iter_mut() {
            file.read_exact(&mut word).map_err(TransportError::from_read)?;
            *slot = Message::from_ne_bytes(word);
        }
        let end = Timestamp::now();
        self.state = PipeState::Drained;
        tracing::debug!("Pipe reader received {} messages", messages.len());
        Ok(end)
    }
}
