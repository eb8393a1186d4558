//! farefriend CLI - Entry point
//!
//! Usage: farefriend <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use farefriend::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise warn, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init(args) => farefriend::cli::init::run(args),
        Commands::Estimate(args) => farefriend::cli::estimate::run(args, config_path),
        Commands::Report(args) => farefriend::cli::report::run(args, config_path),
        Commands::History(args) => farefriend::cli::history::run(args, config_path),
        Commands::Factors(args) => farefriend::cli::factors::run(args, config_path),
        Commands::Stats(args) => farefriend::cli::stats::execute(args, config_path),
        Commands::Config(args) => farefriend::cli::config::run(args, config_path),
    }
}
