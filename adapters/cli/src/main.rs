#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays scripted maze exploration through the
//! checkpointed path history.

mod replay;
mod script;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use maze_recall_core::ShortTermMemory;

use crate::script::ReplayScript;

/// Replays an exploration script and reports the resulting checkpoint.
#[derive(Debug, Parser)]
#[command(name = "maze-recall", version)]
struct CliArgs {
    /// Path to the TOML replay script.
    script: PathBuf,
    /// Overrides the short-term memory declared by the script.
    #[arg(long, value_name = "STEPS")]
    short_term_memory: Option<u32>,
    /// Maximum level of log messages written to stderr.
    #[arg(long, value_name = "LEVEL", default_value_t = tracing::Level::WARN)]
    log_level: tracing::Level,
    /// Prints the retained frontiers and pending mutations after the report.
    #[arg(long)]
    dump: bool,
}

/// Entry point for the maze recall command-line interface.
fn main() -> Result<()> {
    let args = CliArgs::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install log subscriber")?;

    let script = ReplayScript::from_path(&args.script)?;
    let steps = args.short_term_memory.unwrap_or(script.short_term_memory);
    let short_term_memory =
        ShortTermMemory::new(steps).context("short-term memory must be at least 1")?;
    tracing::debug!(
        script = %args.script.display(),
        short_term_memory = steps,
        steps = script.steps.len(),
        "replaying script"
    );

    let replay = replay::run(&script, short_term_memory)?;
    println!("{}", replay.report()?);
    if args.dump {
        print!("{}", replay.dump());
    }
    Ok(())
}
