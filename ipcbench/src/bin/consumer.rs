//! Consumer role: receives the message stream and prints the elapsed
//! transfer time in seconds.
//!
//! ```text
//! consumer <mechanism> <size> [port | inherited read descriptor]
//! ```

use clap::Parser;
use ipcbench::cli::RoleArgs;
use ipcbench::logging;
use ipcbench_bench::{SessionConfig, TransferReport, run_consumer};
use ipcbench_core::Mechanism;
use std::io::Write;
use std::process::ExitCode;

fn run(args: &RoleArgs) -> anyhow::Result<TransferReport> {
    let transport = args.transport_config()?;
    let inherited = match transport.mechanism {
        Mechanism::AnonymousPipe => Some(args.inherited_read_end()?),
        _ => None,
    };
    let consumed = run_consumer(&SessionConfig::new(transport), inherited)?;
    Ok(consumed.report)
}

fn main() -> ExitCode {
    let args = RoleArgs::parse();
    if let Err(err) = logging::init(&args.common.log_dir) {
        eprintln!("consumer: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(report) => {
            let mut stdout = std::io::stdout().lock();
            if writeln!(stdout, "{report}").and_then(|()| stdout.flush()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(role = "consumer", "{err:#}");
            eprintln!("consumer: {err:#}");
            ExitCode::FAILURE
        }
    }
}
