//! `farefriend history` command
//!
//! # Usage
//! ```bash
//! farefriend history "Dadar" "Worli"
//! farefriend history "Dadar West" "Worli Naka" --pickup-coords 19.0195,72.8480 --dropoff-coords 19.0160,72.8175
//! farefriend history "Dadar" "Worli" --format json
//! ```

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::utils::{location, open_engine};
use super::OutputFormat;
use crate::core::engine::RouteSummary;
use crate::core::geo::Coordinates;
use crate::core::trip::TripRecord;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Pickup location name
    pub pickup: String,

    /// Dropoff location name
    pub dropoff: String,

    /// Pickup coordinates, to also match nearby trips
    #[arg(long, value_name = "LAT,LON")]
    pub pickup_coords: Option<Coordinates>,

    /// Dropoff coordinates, to also match nearby trips
    #[arg(long, value_name = "LAT,LON")]
    pub dropoff_coords: Option<Coordinates>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct TripRow {
    #[tabled(rename = "#")]
    index: String,
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Km")]
    distance: String,
    #[tabled(rename = "Estimate")]
    estimate: String,
    #[tabled(rename = "Paid")]
    paid: String,
    #[tabled(rename = "Diff")]
    diff: String,
    #[tabled(rename = "Issues")]
    issues: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

impl TripRow {
    fn new(index: Option<usize>, trip: &TripRecord) -> Self {
        let issues: Vec<String> = trip.reported_issues().iter().map(|i| i.to_string()).collect();
        Self {
            index: index.map(|i| format!("#{}", i)).unwrap_or_default(),
            when: trip.timestamp().format("%Y-%m-%d %H:%M").to_string(),
            distance: format!("{:.1}", trip.estimated_distance),
            estimate: format!("₹{}", trip.estimated_fare),
            paid: trip
                .actual_fare()
                .map(|f| format!("₹{}", f))
                .unwrap_or_else(|| "-".to_string()),
            diff: trip
                .discrepancy()
                .map(|d| format!("{:+}", d))
                .unwrap_or_else(|| "-".to_string()),
            issues: issues.join(", "),
            comment: trip.comments().unwrap_or_default().to_string(),
        }
    }
}

pub fn run(args: HistoryArgs, config_path: Option<&Path>) -> Result<()> {
    let (_config, engine) = open_engine(config_path)?;

    let pickup = location(&args.pickup, args.pickup_coords);
    let dropoff = location(&args.dropoff, args.dropoff_coords);

    let trips = engine.history_for_route(&pickup, &dropoff);
    let summary = engine.route_summary(&pickup, &dropoff);

    if args.format == OutputFormat::Json {
        let json = serde_json::json!({
            "pickup": pickup,
            "dropoff": dropoff,
            "trips": trips,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("🛺 {} → {}\n", pickup.name.cyan().bold(), dropoff.name.cyan().bold());

    if trips.is_empty() {
        println!("No trips recorded for this route.");
        println!(
            "\nEstimate one with: farefriend estimate \"{}\" \"{}\" --distance <KM>",
            pickup.name, dropoff.name
        );
        return Ok(());
    }

    let rows: Vec<TripRow> = trips
        .iter()
        .map(|t| TripRow::new(engine.trips().find_by_id(&t.id()), t))
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RouteSummary) {
    println!();
    println!(
        "  Trips: {} · Reported: {}",
        summary.trip_count, summary.reported_count
    );
    if let Some(avg) = summary.average_reported_fare {
        println!("  Average paid:        ₹{:.0}", avg);
    }
    if let Some(avg) = summary.average_discrepancy {
        println!("  Average discrepancy: ₹{:+.0}", avg);
    }
    if summary.tampering_reports > 0 {
        println!(
            "\n  ⚠ {}",
            format!(
                "{} rider(s) reported meter tampering on this route",
                summary.tampering_reports
            )
            .red()
            .bold()
        );
    }
}
