//! CLI module - Command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub mod config;
pub mod estimate;
pub mod factors;
pub mod history;
pub mod init;
pub mod report;
pub mod stats;
pub mod utils;

/// farefriend - adaptive auto-rickshaw fare estimates
///
/// Estimates Mumbai auto-rickshaw fares from the official tariff and learns
/// from the fares riders actually paid.
#[derive(Parser, Debug)]
#[command(name = "farefriend")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "FAREFRIEND_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new farefriend repository
    Init(init::InitArgs),

    /// Estimate the fare for a route
    Estimate(estimate::EstimateArgs),

    /// Report the fare actually paid for a trip
    Report(report::ReportArgs),

    /// Show trips and reports for a route
    History(history::HistoryArgs),

    /// Show, retrain or reset adjustment factors
    Factors(factors::FactorsArgs),

    /// Show trip statistics
    Stats(stats::StatsArgs),

    /// Get or set configuration
    Config(config::ConfigArgs),
}

/// Output format shared by the read commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}
