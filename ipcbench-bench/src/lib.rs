//! # ipcbench Bench
//!
//! Session orchestration and reporting for the ipcbench roles.
//!
//! This crate provides:
//! - [`runner`] - Producer and consumer session runners
//! - [`report`] - Per-transfer timing report
//! - [`stats`] - Statistics over repeated runs

pub mod report;
pub mod runner;
pub mod stats;

pub use report::TransferReport;
pub use runner::{ConsumerReport, ProducerReport, SessionConfig, run_consumer, run_producer};
pub use stats::{DurationCollector, DurationStats};
