//! `farefriend estimate` command
//!
//! # Usage
//! ```bash
//! farefriend estimate "Dadar" "Worli" --distance 3.2 --waiting 4
//! farefriend estimate "Dadar" "Worli" --pickup-coords 19.0178,72.8478 --dropoff-coords 19.0176,72.8170
//! farefriend estimate "Dadar" "Worli" --distance 3.2 --at 2024-03-15T23:30 --no-save --format json
//! ```
//!
//! Without `--distance`, both coordinate pairs are required and distance,
//! duration and waiting time come from the heuristic route estimator.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::utils::{location, open_engine, parse_at, TRIP_ID_PREFIX};
use super::OutputFormat;
use crate::core::engine::FareEstimate;
use crate::core::geo::Coordinates;
use crate::core::predictor::FareRequest;
use crate::core::route::{drive_minutes, HeuristicRouteEstimator, RouteEstimate, RouteEstimator};

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Pickup location name
    pub pickup: String,

    /// Dropoff location name
    pub dropoff: String,

    /// Trip distance in km
    #[arg(short, long)]
    pub distance: Option<f64>,

    /// Expected trip duration in minutes
    #[arg(long)]
    pub duration: Option<u32>,

    /// Expected waiting time in minutes
    #[arg(short, long)]
    pub waiting: Option<u32>,

    /// Trip time (RFC 3339, or local YYYY-MM-DDTHH:MM); default now
    #[arg(long)]
    pub at: Option<String>,

    /// Pickup coordinates
    #[arg(long, value_name = "LAT,LON")]
    pub pickup_coords: Option<Coordinates>,

    /// Dropoff coordinates
    #[arg(long, value_name = "LAT,LON")]
    pub dropoff_coords: Option<Coordinates>,

    /// Don't record the estimate in the trip history
    #[arg(long)]
    pub no_save: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub fn run(args: EstimateArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, mut engine) = open_engine(config_path)?;

    let timestamp = match &args.at {
        Some(at) => parse_at(at, config.locale.offset()?)?,
        None => config.locale.now()?,
    };

    let route: Option<RouteEstimate> = match (args.pickup_coords, args.dropoff_coords) {
        (Some(p), Some(d)) => Some(HeuristicRouteEstimator::new().estimate(&p, &d, &timestamp)),
        _ => None,
    };

    let distance_km = match (args.distance, &route) {
        (Some(d), _) => d,
        (None, Some(r)) => r.distance_km,
        (None, None) => {
            bail!("Provide --distance, or both --pickup-coords and --dropoff-coords")
        }
    };
    if !distance_km.is_finite() || distance_km < 0.0 {
        bail!("Distance must be a non-negative number of km, got {}", distance_km);
    }

    let request = FareRequest {
        pickup: location(&args.pickup, args.pickup_coords),
        dropoff: location(&args.dropoff, args.dropoff_coords),
        distance_km,
        duration_min: args
            .duration
            .or(route.map(|r| r.traffic_duration_min))
            .unwrap_or_else(|| drive_minutes(distance_km)),
        waiting_min: args.waiting.or(route.map(|r| r.waiting_min)).unwrap_or(0),
        timestamp,
    };

    let estimate = engine.compute_fare(request);

    let saved = if args.no_save {
        None
    } else {
        let index = engine.record_estimate(&estimate)?;
        engine.trips().get(index).map(|t| (index, t.id()))
    };

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "index": saved.map(|(i, _)| i),
                "id": saved.map(|(_, id)| format!("{}{}", TRIP_ID_PREFIX, id)),
                "estimate": estimate,
                "route": route,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => print_pretty(&estimate, route.as_ref(), saved),
    }

    Ok(())
}

fn print_pretty(
    estimate: &FareEstimate,
    route: Option<&RouteEstimate>,
    saved: Option<(usize, ulid::Ulid)>,
) {
    let request = &estimate.request;
    let p = &estimate.prediction;
    let b = &p.breakdown;

    println!(
        "🛺 {} → {}",
        request.pickup.name.cyan().bold(),
        request.dropoff.name.cyan().bold()
    );
    println!(
        "   {} km · {} min · {}",
        request.distance_km,
        request.duration_min,
        request.timestamp.format("%a %d %b %H:%M")
    );
    if let Some(r) = route {
        println!(
            "   Traffic: {} (+{} min, ~{} min waiting)",
            r.condition, r.traffic_delay_min, r.waiting_min
        );
    }
    println!();
    println!(
        "   Fare:        {}  (confidence {:.0}%)",
        format!("₹{}", p.fare).green().bold(),
        p.confidence * 100.0
    );
    println!(
        "   Breakdown:   base ₹{} · distance ₹{} · night ₹{} · waiting ₹{}",
        b.base_fare, b.distance_charge, b.night_charge, b.waiting_charge
    );
    println!(
        "   Adjustments: time ×{:.2} · day ×{:.2} · traffic ×{:.2} ({})",
        p.adjustments.time, p.adjustments.day, p.adjustments.traffic, p.adjustments.traffic_level
    );

    if p.is_night {
        println!("   🌙 {}", "Night surcharge applies".yellow());
    }

    if p.report_count > 0 {
        println!(
            "   Based on {} rider report(s); tariff estimate ₹{}",
            p.report_count, p.standard_fare
        );
    } else {
        println!("   {}", "No reports for this route yet".dimmed());
    }

    if let Some((index, id)) = saved {
        println!();
        println!("   Saved as #{} ({}{})", index, TRIP_ID_PREFIX, id.to_string().dimmed());
        println!("   After the ride: farefriend report #{} <FARE>", index);
    }
}
