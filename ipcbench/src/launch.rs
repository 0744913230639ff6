//! Process spawning for the anonymous pipe consumer and the launcher.

use crate::cli::{CommonArgs, LaunchArgs, RoleArgs};
use anyhow::{Context, bail, ensure};
use ipcbench_core::Mechanism;
use std::ffi::OsString;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resolves `name` next to the running executable.
///
/// # Errors
/// Returns an error if the current executable cannot be located.
pub fn sibling_binary(name: &str) -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate current executable")?;
    let dir = exe
        .parent()
        .with_context(|| format!("executable {} has no parent directory", exe.display()))?;
    Ok(dir.join(name))
}

/// Consumer binary: the configured one, or `consumer` next to the running
/// executable.
///
/// # Errors
/// Returns an error if the current executable cannot be located.
pub fn consumer_binary(common: &CommonArgs) -> anyhow::Result<PathBuf> {
    match &common.consumer_bin {
        Some(bin) => Ok(bin.clone()),
        None => sibling_binary("consumer"),
    }
}

/// Sets or clears `FD_CLOEXEC` on `fd`.
///
/// # Errors
/// Returns the OS error if `fcntl` fails.
pub fn set_close_on_exec(fd: &impl AsRawFd, close: bool) -> io::Result<()> {
    let flags = if close { libc::FD_CLOEXEC } else { 0 };
    // SAFETY: F_SETFD only touches the descriptor flags of a descriptor we own.
    if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Command-line arguments for a role binary.
#[must_use]
pub fn role_argv(role: &RoleArgs) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![role.mechanism.to_string().into(), role.size.to_string().into()];
    if let Some(extra) = role.extra {
        argv.push(extra.to_string().into());
    }
    argv.extend(role.common.to_args());
    argv
}

/// Spawns the anonymous pipe consumer, handing it `read_end` by descriptor
/// number.
///
/// Only `read_end` is made inheritable; the caller keeps the write end
/// close-on-exec so the consumer sees end of file once the producer is done.
///
/// # Errors
/// Returns an error if the descriptor flags cannot be changed or the binary
/// cannot be started.
pub fn spawn_anonymous_consumer(
    bin: &Path,
    role: &RoleArgs,
    read_end: &OwnedFd,
) -> anyhow::Result<Child> {
    set_close_on_exec(read_end, false).context("cannot make pipe read end inheritable")?;

    let mut consumer = role.clone();
    consumer.extra = Some(i64::from(read_end.as_raw_fd()));

    tracing::debug!(
        "Spawning {} with read descriptor {}",
        bin.display(),
        read_end.as_raw_fd()
    );
    Command::new(bin)
        .args(role_argv(&consumer))
        .spawn()
        .with_context(|| format!("cannot start consumer {}", bin.display()))
}

/// Waits for `child` and fails unless it exits successfully.
///
/// # Errors
/// Returns an error if waiting fails or the exit status is non-zero.
pub fn wait_success(child: &mut Child, what: &str) -> anyhow::Result<()> {
    let status = child
        .wait()
        .with_context(|| format!("cannot wait for {what}"))?;
    ensure!(status.success(), "{what} exited with {status}");
    Ok(())
}

fn spawn_role(bin: &Path, role: &RoleArgs, capture: bool) -> anyhow::Result<Child> {
    let mut command = Command::new(bin);
    command.args(role_argv(role));
    if capture {
        command.stdout(Stdio::piped());
    }
    command
        .spawn()
        .with_context(|| format!("cannot start {}", bin.display()))
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn purge_after_failure(role: &RoleArgs) {
    let purged = role
        .common
        .names()
        .and_then(|names| names.purge().context("cannot purge session resources"));
    match purged {
        Ok(purged) if !purged.is_empty() => {
            tracing::info!("Removed resources left by the failed session: {}", purged.join(", "));
        }
        Ok(_) => {}
        Err(err) => tracing::warn!("{err:#}"),
    }
}

/// Waits for both roles of a session.
///
/// The roles block on each other without timeouts, so as soon as one exits
/// unsuccessfully the other is killed instead of being waited for.
///
/// # Errors
/// Returns an error if waiting fails or either role exits non-zero.
pub fn wait_pair(producer: &mut Child, consumer: &mut Child) -> anyhow::Result<()> {
    let mut produced = None;
    let mut consumed = None;
    loop {
        if produced.is_none() {
            produced = producer.try_wait().context("cannot wait for producer")?;
        }
        if consumed.is_none() {
            consumed = consumer.try_wait().context("cannot wait for consumer")?;
        }
        match (produced, consumed) {
            (Some(producer_status), Some(consumer_status)) => {
                ensure!(consumer_status.success(), "consumer exited with {consumer_status}");
                ensure!(producer_status.success(), "producer exited with {producer_status}");
                return Ok(());
            }
            (None, Some(status)) if !status.success() => {
                stop(producer);
                bail!("consumer exited with {status}");
            }
            (Some(status), None) if !status.success() => {
                stop(consumer);
                bail!("producer exited with {status}");
            }
            _ => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Parses the duration a consumer printed.
///
/// # Errors
/// Returns an error unless `stdout` holds a single non-negative number.
pub fn parse_duration(stdout: &[u8]) -> anyhow::Result<f64> {
    let text = std::str::from_utf8(stdout).context("consumer output is not UTF-8")?;
    let seconds: f64 = text
        .trim()
        .parse()
        .with_context(|| format!("unexpected consumer output {text:?}"))?;
    ensure!(
        seconds.is_finite() && seconds >= 0.0,
        "unexpected consumer duration {seconds}"
    );
    Ok(seconds)
}

/// Runs one complete session and returns the duration the consumer printed.
///
/// Leftover names from an aborted session are purged first. For the
/// anonymous pipe only the producer is started; it spawns the consumer
/// itself, whose output reaches the producer's stdout.
///
/// # Errors
/// Returns an error for invalid arguments, if a role cannot be started or
/// exits non-zero, or if the printed duration cannot be parsed.
pub fn run_session(args: &LaunchArgs) -> anyhow::Result<f64> {
    let role = args.role_args()?;
    let mechanism = role.mechanism()?;

    let purged = role.common.names()?.purge()?;
    if !purged.is_empty() {
        tracing::info!("Removed stale resources: {}", purged.join(", "));
    }

    let anonymous = mechanism == Mechanism::AnonymousPipe;
    tracing::info!("Launching {} session, size {}", mechanism, role.size);

    let mut producer = spawn_role(&sibling_binary("producer")?, &role, anonymous)?;
    if anonymous {
        let output = producer
            .wait_with_output()
            .context("cannot wait for producer")?;
        ensure!(output.status.success(), "producer exited with {}", output.status);
        return finish(&output.stdout);
    }

    let mut consumer = match spawn_role(&consumer_binary(&role.common)?, &role, true) {
        Ok(child) => child,
        Err(err) => {
            stop(&mut producer);
            purge_after_failure(&role);
            return Err(err);
        }
    };

    if let Err(err) = wait_pair(&mut producer, &mut consumer) {
        purge_after_failure(&role);
        return Err(err);
    }

    let mut stdout = Vec::new();
    if let Some(mut pipe) = consumer.stdout.take() {
        pipe.read_to_end(&mut stdout)
            .context("cannot read consumer output")?;
    }
    finish(&stdout)
}

fn finish(stdout: &[u8]) -> anyhow::Result<f64> {
    let seconds = parse_duration(stdout)?;
    tracing::info!("Session finished in {:.3} seconds", seconds);
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(b"0.125\n").unwrap(), 0.125);
        assert_eq!(parse_duration(b"3.000").unwrap(), 3.0);
        assert!(parse_duration(b"").is_err());
        assert!(parse_duration(b"fast").is_err());
        assert!(parse_duration(b"-0.500").is_err());
    }

    #[test]
    fn test_role_argv() {
        let role = RoleArgs::try_parse_from(["producer", "2", "4", "4100", "--namespace", "n"])
            .unwrap();
        let argv: Vec<String> = role_argv(&role)
            .into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect();
        assert_eq!(&argv[..3], ["2", "4", "4100"]);

        let reparsed =
            RoleArgs::try_parse_from(std::iter::once("consumer".to_string()).chain(argv)).unwrap();
        assert_eq!(reparsed.extra, Some(4100));
        assert_eq!(reparsed.common.namespace.as_deref(), Some("n"));
    }

    #[test]
    fn test_consumer_binary_override() {
        let mut role = RoleArgs::try_parse_from(["producer", "0", "1"]).unwrap();
        assert!(consumer_binary(&role.common).unwrap().ends_with("consumer"));

        role.common.consumer_bin = Some(PathBuf::from("/opt/ipcbench/consumer"));
        assert_eq!(
            consumer_binary(&role.common).unwrap(),
            PathBuf::from("/opt/ipcbench/consumer")
        );
    }

    #[test]
    fn test_wait_pair_kills_survivor() {
        let mut producer = Command::new("sleep").arg("30").spawn().unwrap();
        let mut consumer = Command::new("false").spawn().unwrap();

        let started = std::time::Instant::now();
        let err = wait_pair(&mut producer, &mut consumer).unwrap_err();
        assert!(err.to_string().starts_with("consumer exited with"));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(producer.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_wait_pair_success() {
        let mut producer = Command::new("true").spawn().unwrap();
        let mut consumer = Command::new("true").spawn().unwrap();
        wait_pair(&mut producer, &mut consumer).unwrap();
    }

    #[test]
    fn test_close_on_exec_flags() {
        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        set_close_on_exec(&write_end, true).unwrap();
        set_close_on_exec(&read_end, false).unwrap();

        let flags = |fd: &OwnedFd| unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
        assert_eq!(flags(&write_end) & libc::FD_CLOEXEC, libc::FD_CLOEXEC);
        assert_eq!(flags(&read_end) & libc::FD_CLOEXEC, 0);
    }
}
