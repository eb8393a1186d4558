//! CLI utility functions
//!
//! Common helpers shared across CLI commands:
//! - Repository discovery (find_farefriend_dir)
//! - Opening the engine over the active database (open_engine)
//! - Parsing trip references and `--at` times

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use ulid::Ulid;

use crate::config::{Config, DIR_NAME};
use crate::core::engine::FareEngine;
use crate::core::geo::{Coordinates, Location};
use crate::core::storage::SqliteStore;

/// Prefix of printed trip ids
pub const TRIP_ID_PREFIX: &str = "trip-";

/// Find .farefriend directory by walking up from current directory
///
/// # Errors
/// Returns an error if no `.farefriend` directory is found in any parent.
pub fn find_farefriend_dir() -> Result<PathBuf> {
    let mut current = std::env::current_dir()?;

    loop {
        let dir = current.join(DIR_NAME);
        if dir.exists() {
            return Ok(dir);
        }

        if !current.pop() {
            bail!("Not a farefriend repository (or any parent directory). Run 'farefriend init' first.");
        }
    }
}

/// Load config and open the engine over the active database
pub fn open_engine(config_path: Option<&Path>) -> Result<(Config, FareEngine)> {
    let config = Config::load_with(config_path)?;
    let db_path = config.data_path();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let engine = FareEngine::new(Arc::new(store), config.engine_config());

    Ok((config, engine))
}

/// Resolve a trip reference to its index
///
/// Accepts either:
/// - `#3` or `3` - insertion index
/// - `trip-01HQ3K2JN5...` - trip id (ULID format)
pub fn resolve_trip(engine: &FareEngine, target: &str) -> Result<usize> {
    if let Some(id_str) = target.strip_prefix(TRIP_ID_PREFIX) {
        let id = Ulid::from_string(id_str).map_err(|_| anyhow!("Invalid trip ID: {}", target))?;
        return engine
            .trips()
            .find_by_id(&id)
            .ok_or_else(|| anyhow!("Trip not found: {}", target));
    }

    let index: usize = target
        .trim_start_matches('#')
        .parse()
        .map_err(|_| anyhow!("Expected #INDEX or {}<ID>, got: {}", TRIP_ID_PREFIX, target))?;

    if engine.trips().get(index).is_none() {
        bail!("Trip not found: #{}", index);
    }
    Ok(index)
}

/// Parse an `--at` time.
///
/// RFC 3339 keeps its own offset; `YYYY-MM-DDTHH:MM[:SS]` without one is
/// read in the configured local offset.
pub fn parse_at(value: &str, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts);
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Invalid time: {} (expected RFC 3339)", value))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow!("Ambiguous local time: {}", value))
}

/// Build a location from a name and optional coordinates
pub fn location(name: &str, coordinates: Option<Coordinates>) -> Location {
    Location {
        name: name.to_string(),
        coordinates,
    }
}
