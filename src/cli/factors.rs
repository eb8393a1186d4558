//! `farefriend factors` command
//!
//! # Usage
//! ```bash
//! farefriend factors               # Show current factors
//! farefriend factors --retrain     # Retrain from all reports
//! farefriend factors --reset -y    # Restore defaults without asking
//! ```

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;

use super::utils::open_engine;
use super::OutputFormat;
use crate::core::learner::{AdjustmentFactors, TrafficLevel};
use crate::core::trip::TimeOfDay;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Args, Debug)]
pub struct FactorsArgs {
    /// Retrain factors from all reported trips
    #[arg(long, conflicts_with = "reset")]
    pub retrain: bool,

    /// Restore default factors
    #[arg(long)]
    pub reset: bool,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub fn run(args: FactorsArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, mut engine) = open_engine(config_path)?;

    if args.reset {
        if !args.yes {
            let confirmed = Confirm::new()
                .with_prompt("Reset adjustment factors to defaults?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }
        }
        engine.reset_factors()?;
        println!("{} Adjustment factors reset to defaults", "✓".green());
    }

    if args.retrain {
        if engine.retrain()? {
            println!(
                "{} Retrained from {} report(s)",
                "✓".green(),
                engine.trips().reported_trips().len()
            );
        } else {
            bail!(
                "Need at least {} reported trips to retrain ({} so far)",
                config.learning.min_reports,
                engine.trips().reported_trips().len()
            );
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(engine.factors())?),
        OutputFormat::Pretty => print_pretty(engine.factors()),
    }

    Ok(())
}

fn print_pretty(factors: &AdjustmentFactors) {
    println!("{}", "Time of day".bold());
    for bucket in TimeOfDay::ALL {
        println!("  {:<10} ×{:.2}", bucket.to_string(), factors.time_factor(bucket));
    }

    println!("\n{}", "Day of week".bold());
    for (day, name) in DAY_NAMES.iter().enumerate() {
        println!("  {:<10} ×{:.2}", name, factors.day_factor(day));
    }

    println!("\n{}", "Traffic".bold());
    for level in [TrafficLevel::Low, TrafficLevel::Medium, TrafficLevel::High] {
        println!(
            "  {:<10} ×{:.2}",
            level.to_string(),
            factors.traffic_conditions.for_level(level)
        );
    }
}
