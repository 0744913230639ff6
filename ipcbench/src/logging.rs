//! Session log setup.
//!
//! Every process appends to two files in the log directory: `info.log` with
//! the full trail and `errors.log` with `ERROR` events only. `RUST_LOG`
//! overrides the default `info` level.

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File receiving every event.
pub const INFO_LOG: &str = "info.log";
/// File receiving `ERROR` events only.
pub const ERROR_LOG: &str = "errors.log";

fn open_append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Builds the subscriber writing to `log_dir`, creating the directory if
/// needed.
///
/// # Errors
/// Returns an error if the directory or a log file cannot be created.
pub fn subscriber(
    log_dir: &Path,
) -> anyhow::Result<impl tracing::Subscriber + Send + Sync + 'static> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let info = open_append(&log_dir.join(INFO_LOG))?;
    let errors = open_append(&log_dir.join(ERROR_LOG))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(info)))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(errors))
                .with_filter(LevelFilter::ERROR),
        ))
}

/// Installs the session log as the global subscriber.
///
/// # Errors
/// Returns an error if the log files cannot be opened or a subscriber is
/// already installed.
pub fn init(log_dir: &Path) -> anyhow::Result<()> {
    subscriber(log_dir)?
        .try_init()
        .context("cannot install log subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_files_split_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let subscriber = subscriber(&log_dir).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("transfer started");
            tracing::error!("transfer failed");
        });

        let info = std::fs::read_to_string(log_dir.join(INFO_LOG)).unwrap();
        let errors = std::fs::read_to_string(log_dir.join(ERROR_LOG)).unwrap();
        assert!(info.contains("transfer started"));
        assert!(info.contains("transfer failed"));
        assert!(!errors.contains("transfer started"));
        assert!(errors.contains("transfer failed"));
    }

    #[test]
    fn test_log_files_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        for run in 0..2 {
            let subscriber = subscriber(dir.path()).unwrap();
            tracing::subscriber::with_default(subscriber, || {
                tracing::error!("run {run}");
            });
        }
        let errors = std::fs::read_to_string(dir.path().join(ERROR_LOG)).unwrap();
        assert!(errors.contains("run 0"));
        assert!(errors.contains("run 1"));
    }
}
