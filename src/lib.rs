//! farefriend - adaptive auto-rickshaw fare estimation
//!
//! Estimates Mumbai auto-rickshaw fares from the official tariff, scales them
//! by learned time-of-day and weekday factors, and blends in the fares riders
//! actually reported for the same route.
//!
//! ## Key Concepts
//!
//! - **Tariff**: base fare for the first 1.5 km, per-km rate beyond, night
//!   surcharge and waiting charge
//! - **Adjustment factors**: multipliers retrained from the gap between
//!   estimated and reported fares, clamped to [0.5, 2.0]
//! - **Route history**: trips matched by name or by endpoint proximity
//! - **Confidence**: 0.70 from the formula alone, rising with each report
//!
//! ```no_run
//! use std::sync::Arc;
//! use farefriend::{FareEngine, FareRequest, Location, SqliteStore};
//!
//! # fn main() -> farefriend::core::error::Result<()> {
//! let store = SqliteStore::open(std::path::Path::new(".farefriend/data.db"))?;
//! let mut engine = FareEngine::with_defaults(Arc::new(store));
//!
//! let estimate = engine.compute_fare(FareRequest {
//!     pickup: Location::named("Dadar"),
//!     dropoff: Location::named("Worli"),
//!     distance_km: 3.2,
//!     duration_min: 14,
//!     waiting_min: 4,
//!     timestamp: chrono::DateTime::parse_from_rfc3339("2024-03-15T14:00:00+05:30").unwrap(),
//! });
//! engine.submit_report(&estimate, 80, Vec::new(), None)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;

pub use crate::core::engine::{EngineConfig, FareEngine, FareEstimate, RouteSummary};
pub use crate::core::error::FareError;
pub use crate::core::geo::{distance_km, Coordinates, Location};
pub use crate::core::predictor::{FarePrediction, FareRequest};
pub use crate::core::storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use crate::core::trip::{IssueTag, TripRecord};
