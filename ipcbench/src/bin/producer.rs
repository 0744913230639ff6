//! Producer role: generates the message stream and sends it.
//!
//! ```text
//! producer <mechanism> <size> [port]
//! ```
//!
//! For the anonymous pipe the producer creates the pipe and spawns the
//! consumer itself.

use anyhow::Context;
use clap::Parser;
use ipcbench::cli::RoleArgs;
use ipcbench::{launch, logging};
use ipcbench_bench::{SessionConfig, run_producer};
use ipcbench_core::Mechanism;
use std::process::ExitCode;

fn run(args: &RoleArgs) -> anyhow::Result<()> {
    let session = SessionConfig::new(args.transport_config()?);
    let stream = session.generate_stream();

    if session.transport.mechanism != Mechanism::AnonymousPipe {
        run_producer(&session, &stream, None)?;
        return Ok(());
    }

    let (read_end, write_end) = nix::unistd::pipe().context("cannot create pipe")?;
    launch::set_close_on_exec(&write_end, true).context("cannot protect pipe write end")?;
    let bin = launch::consumer_binary(&args.common)?;
    let mut consumer = launch::spawn_anonymous_consumer(&bin, args, &read_end)?;
    drop(read_end);

    let produced = run_producer(&session, &stream, Some(write_end));
    if produced.is_err() {
        let _ = consumer.kill();
    }
    let waited = launch::wait_success(&mut consumer, "consumer");
    produced?;
    waited
}

fn main() -> ExitCode {
    let args = RoleArgs::parse();
    if let Err(err) = logging::init(&args.common.log_dir) {
        eprintln!("producer: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(role = "producer", "{err:#}");
            eprintln!("producer: {err:#}");
            ExitCode::FAILURE
        }
    }
}
