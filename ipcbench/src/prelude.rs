//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ipcbench::prelude::*;
//! ```

// Core types
pub use ipcbench_core::error::{Error as CoreError, Result as CoreResult};
pub use ipcbench_core::{
    Mechanism, Message, MessageStream, PayloadSize, Role, Timestamp, TransferSession,
    format_elapsed,
};

// Transports
pub use ipcbench_transport::{
    ConnectRetry, Handshake, Receiver, ResourceNames, RingConfig, Sender, SocketConfig,
    Transport, TransportConfig, TransportError, receiver, sender,
};

// Runners
pub use ipcbench_bench::{
    ConsumerReport, DurationCollector, DurationStats, ProducerReport, SessionConfig,
    TransferReport, run_consumer, run_producer,
};
