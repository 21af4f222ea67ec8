use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Compare re-read state against the snapshot. When false every read is settled.
    #[arg(
        long,
        global = true,
        env = "TFSETTLE_CONSISTENCY_CHECKS",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub consistency_checks: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare one re-read snapshot against the expected snapshot.
    Check(CheckArgs),
    /// Feed re-read snapshots through the retry loop, one per attempt.
    Replay(ReplayArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    #[arg(long)]
    pub schema: PathBuf,

    #[arg(long)]
    pub expected: PathBuf,

    #[arg(long)]
    pub actual: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    #[arg(long)]
    pub schema: PathBuf,

    #[arg(long)]
    pub expected: PathBuf,

    /// Re-read snapshots in attempt order; the last one repeats.
    #[arg(required = true)]
    pub actual: Vec<PathBuf>,

    #[arg(long, env = "TFSETTLE_READ_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 500)]
    pub min_delay_ms: u64,
}
