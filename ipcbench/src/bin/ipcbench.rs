//! Runs a complete producer/consumer session for one mechanism and size.
//!
//! ```text
//! ipcbench <mechanism> <size> [--port P] [--repeat N]
//! ```

use clap::Parser;
use ipcbench::cli::LaunchArgs;
use ipcbench::{launch, logging};
use ipcbench_bench::DurationCollector;
use ipcbench_core::format_elapsed;
use std::process::ExitCode;

fn run(args: &LaunchArgs) -> anyhow::Result<()> {
    let mut durations = DurationCollector::with_capacity(args.repeat);
    for run in 1..=args.repeat {
        let seconds = launch::run_session(args)?;
        tracing::info!("Run {}/{}: {} seconds", run, args.repeat, format_elapsed(seconds));
        println!("{}", format_elapsed(seconds));
        durations.record(seconds);
    }

    if args.repeat > 1 {
        if let Some(stats) = durations.stats() {
            tracing::info!("{}", stats);
            println!("{stats}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = LaunchArgs::parse();
    if let Err(err) = logging::init(&args.common.log_dir) {
        eprintln!("ipcbench: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(role = "launcher", "{err:#}");
            eprintln!("ipcbench: {err:#}");
            ExitCode::FAILURE
        }
    }
}
