//! Stats command - Show trip statistics

use std::path::Path;

use clap::Args;

use super::utils::open_engine;

/// Stats command arguments
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn percent(part: usize, total: usize) -> usize {
    if total > 0 {
        part * 100 / total
    } else {
        0
    }
}

/// Execute stats command
pub fn execute(args: StatsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let (config, engine) = open_engine(config_path)?;
    let stats = engine.stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Trip Statistics\n");
    println!("  Total trips:      {}", stats.total_trips);
    println!(
        "  └── Reported:     {} ({}%)",
        stats.reported_trips,
        percent(stats.reported_trips, stats.total_trips)
    );
    println!(
        "      ├── Paid more than estimate: {} ({}%)",
        stats.underestimated,
        percent(stats.underestimated, stats.reported_trips)
    );
    println!(
        "      └── Paid less than estimate: {} ({}%)",
        stats.overestimated,
        percent(stats.overestimated, stats.reported_trips)
    );

    if let Some(avg) = stats.average_discrepancy {
        println!("\n  Average discrepancy: ₹{:+.1}", avg);
    }

    if !stats.issue_counts.is_empty() {
        println!("\n⚠ Reported issues:");
        for (issue, count) in &stats.issue_counts {
            println!("  {} ({})", issue, count);
        }
    }

    println!("\n📁 Database: {}", config.data_path().display());

    Ok(())
}
