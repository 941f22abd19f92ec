//! httpreplay CLI entry point.

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use httpreplay::cli::Args;
use httpreplay::{CaptureFlows, ConsoleReporter, ReplayEngine, dump_flows, open_captures};

/// Exit status for configuration and capture-opening failures
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level().into()))
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        },
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = args.resolve_config()?;
    let target = args.target()?;
    let sources = open_captures(&args.files)?;
    let flows = CaptureFlows::new(sources, config.assembler());

    let Some(target) = target else {
        let mut stdout = io::stdout().lock();
        let count = dump_flows(flows, &mut stdout, args.dump_format())?;
        info!(flows = count, "dump complete");
        return Ok(ExitCode::SUCCESS);
    };

    info!(target_addr = %target, "replaying");
    let engine = ReplayEngine::from_config(target, &config);
    let mut reporter = ConsoleReporter::new(io::stdout().lock());
    let mut replay = engine.replay(flows);
    for outcome in replay.by_ref() {
        reporter.outcome(&outcome)?;
    }

    let stats = replay.stats();
    reporter.summary(&stats)?;
    info!(skipped = replay.skipped(), "replay complete");

    Ok(if stats.all_matched() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
