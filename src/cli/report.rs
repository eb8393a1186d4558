//! `farefriend report` command
//!
//! Records the fare actually paid for a saved trip and retrains the
//! adjustment factors.
//!
//! # Usage
//! ```bash
//! farefriend report #0 80
//! farefriend report trip-01HQ3K2JN5... 120 --issues meter-tampering,long-route
//! farefriend report 2 70 --comment "Driver took the sea link"
//! ```

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::utils::{open_engine, resolve_trip, TRIP_ID_PREFIX};
use crate::core::trip::IssueTag;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Trip reference: #INDEX or trip-<ID>
    pub trip: String,

    /// Fare actually paid (₹)
    pub fare: i64,

    /// Issues encountered (meter-tampering, overcharge, refusal, long-route, rude-behaviour, other)
    #[arg(short, long, value_delimiter = ',')]
    pub issues: Vec<IssueTag>,

    /// Free-text comment
    #[arg(long)]
    pub comment: Option<String>,
}

pub fn run(args: ReportArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, mut engine) = open_engine(config_path)?;
    let index = resolve_trip(&engine, &args.trip)?;

    let trip = engine.report_trip(index, args.fare, args.issues, args.comment)?;

    println!(
        "{} Reported ₹{} for #{} {} → {} ({}{})",
        "✓".green(),
        args.fare,
        index,
        trip.pickup,
        trip.dropoff,
        TRIP_ID_PREFIX,
        trip.id()
    );
    println!("  Estimated:   ₹{}", trip.estimated_fare);

    if let Some(diff) = trip.discrepancy() {
        let text = format!("{:+}", diff);
        let styled = match diff {
            d if d > 0 => text.red(),
            d if d < 0 => text.green(),
            _ => text.normal(),
        };
        println!("  Discrepancy: ₹{}", styled);
    }

    if !trip.reported_issues().is_empty() {
        let issues: Vec<String> = trip.reported_issues().iter().map(|i| i.to_string()).collect();
        println!("  Issues:      {}", issues.join(", "));
    }

    let reported = engine.trips().reported_trips().len();
    if reported >= config.learning.min_reports {
        println!("\n🔁 Adjustment factors retrained from {} report(s)", reported);
    } else {
        println!(
            "\n{}",
            format!(
                "Factors start learning after {} reports ({} so far)",
                config.learning.min_reports, reported
            )
            .dimmed()
        );
    }

    Ok(())
}
