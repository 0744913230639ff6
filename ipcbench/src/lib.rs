//! # ipcbench
//!
//! Benchmark of bulk data transfer between a producer and a consumer process
//! over four interchangeable mechanisms.
//!
//! ## Mechanisms
//!
//! - **0, anonymous pipe** - the producer spawns the consumer and hands it the read end
//! - **1, named pipe** - a fifo at a well-known path
//! - **2, socket** - TCP with block/acknowledge flow control
//! - **3, shared memory** - a bounded ring buffer guarded by named semaphores
//!
//! Every transfer ends with a timestamp handshake so the consumer can report
//! the elapsed time without sharing a clock variable with the producer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ipcbench::prelude::*;
//!
//! let payload = PayloadSize::new(1)?;
//! let config = SessionConfig::new(TransportConfig::new(Mechanism::SharedMemory, payload));
//!
//! // In the producer process
//! run_producer(&config, &config.generate_stream(), None)?;
//!
//! // In the consumer process
//! let report = run_consumer(&config, None)?.report;
//! println!("{report}");
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Messages, payload sizes, mechanisms and timestamps
//! - [`transport`] - Pipe, socket and ring transports plus the handshake
//! - [`bench`] - Producer/consumer runners and run statistics
//! - [`cli`], [`launch`], [`logging`] - Pieces of the `producer`, `consumer`
//!   and `ipcbench` binaries

pub mod cli;
pub mod launch;
pub mod logging;
pub mod prelude;

/// Messages, payload sizes, mechanisms and timestamps.
pub mod core {
    pub use ipcbench_core::*;
}

/// Transports, named resources and the timestamp handshake.
pub mod transport {
    pub use ipcbench_transport::*;
}

/// Session runners, reports and statistics.
pub mod bench {
    pub use ipcbench_bench::*;
}

pub use ipcbench_bench::{
    ConsumerReport, DurationCollector, DurationStats, ProducerReport, SessionConfig,
    TransferReport, run_consumer, run_producer,
};
pub use ipcbench_core::{Mechanism, MessageStream, PayloadSize, Role, Timestamp};
pub use ipcbench_transport::{ResourceNames, TransportConfig, TransportError};
