//! Fare Engine - the embeddable surface
//!
//! ```text
//! ┌──────────────────────── FareEngine ────────────────────────┐
//! │  TariffCalculator ─▶ AdjustmentLearner ─▶ FarePredictor     │
//! │                            ▲                   │            │
//! │                            └──── TripStore ◀───┘            │
//! └──────────────── Arc<dyn KeyValueStore> ─────────────────────┘
//! ```
//!
//! The engine is the single owner of the trip history, so a report is
//! visible to the very next prediction without reloading anything.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ulid::Ulid;

use super::error::{FareError, Result};
use super::geo::Location;
use super::learner::{AdjustmentFactors, AdjustmentLearner, LearningConfig};
use super::predictor::{FarePrediction, FarePredictor, FareRequest, PredictionConfig};
use super::storage::KeyValueStore;
use super::tariff::{TariffCalculator, TariffConfig};
use super::trip::{IssueTag, TripRecord};
use super::trip_store::TripStore;

/// Settings for every engine component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
}

/// A computed fare together with the request that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareEstimate {
    /// Id of the trip this estimate is saved or reported as
    #[serde(default = "Ulid::new")]
    pub trip_id: Ulid,
    pub request: FareRequest,
    pub prediction: FarePrediction,
}

impl FareEstimate {
    /// Unreported trip record for this estimate
    pub fn to_trip_record(&self) -> TripRecord {
        TripRecord::new(
            self.request.pickup.clone(),
            self.request.dropoff.clone(),
            self.request.distance_km,
            self.request.duration_min,
            self.prediction.fare,
            self.prediction.breakdown,
            self.request.timestamp,
        )
        .with_id(self.trip_id)
    }
}

/// What riders have reported on one route
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSummary {
    pub trip_count: usize,
    pub reported_count: usize,
    pub average_reported_fare: Option<f64>,
    pub average_discrepancy: Option<f64>,
    pub tampering_reports: usize,
    pub issue_counts: BTreeMap<IssueTag, usize>,
}

impl RouteSummary {
    fn from_trips(trips: &[&TripRecord]) -> Self {
        let reported: Vec<&&TripRecord> = trips.iter().filter(|t| t.is_reported()).collect();

        let mut issue_counts = BTreeMap::new();
        for trip in &reported {
            for issue in trip.reported_issues() {
                *issue_counts.entry(*issue).or_insert(0) += 1;
            }
        }

        Self {
            trip_count: trips.len(),
            reported_count: reported.len(),
            average_reported_fare: mean(reported.iter().filter_map(|t| t.actual_fare())),
            average_discrepancy: mean(reported.iter().filter_map(|t| t.discrepancy())),
            tampering_reports: reported
                .iter()
                .filter(|t| t.has_issue(IssueTag::MeterTampering))
                .count(),
            issue_counts,
        }
    }
}

/// Engine-wide trip statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_trips: usize,
    pub reported_trips: usize,
    /// Reports above the estimate
    pub underestimated: usize,
    /// Reports below the estimate
    pub overestimated: usize,
    pub average_discrepancy: Option<f64>,
    pub issue_counts: BTreeMap<IssueTag, usize>,
}

fn mean(values: impl Iterator<Item = i64>) -> Option<f64> {
    let (sum, count) = values.fold((0i64, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Adaptive fare engine
pub struct FareEngine {
    tariff: TariffCalculator,
    learner: AdjustmentLearner,
    predictor: FarePredictor,
    trips: TripStore,
}

impl FareEngine {
    /// Build an engine over a store, loading trips and factors from it
    pub fn new(store: Arc<dyn KeyValueStore>, config: EngineConfig) -> Self {
        let trips = TripStore::load(store.clone());
        let learner = AdjustmentLearner::load(store, config.learning);

        Self {
            tariff: TariffCalculator::with_config(config.tariff),
            learner,
            predictor: FarePredictor::with_config(config.prediction),
            trips,
        }
    }

    /// Engine with the default Mumbai tariff and learning settings
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    pub fn tariff(&self) -> &TariffCalculator {
        &self.tariff
    }

    pub fn trips(&self) -> &TripStore {
        &self.trips
    }

    pub fn factors(&self) -> &AdjustmentFactors {
        self.learner.factors()
    }

    /// Estimate a fare
    pub fn compute_fare(&self, request: FareRequest) -> FareEstimate {
        let prediction = self
            .predictor
            .predict(&request, &self.tariff, &self.learner, &self.trips);

        info!(
            pickup = %request.pickup,
            dropoff = %request.dropoff,
            distance_km = request.distance_km,
            fare = prediction.fare,
            confidence = prediction.confidence,
            reports = prediction.report_count,
            "Computed fare"
        );

        FareEstimate {
            trip_id: Ulid::new(),
            request,
            prediction,
        }
    }

    /// Save an estimate as an unreported trip. Returns its index.
    ///
    /// Saving the same estimate again returns the existing index.
    pub fn record_estimate(&mut self, estimate: &FareEstimate) -> Result<usize> {
        if let Some(index) = self.trips.find_by_id(&estimate.trip_id) {
            return Ok(index);
        }
        self.trips.add_trip(estimate.to_trip_record())
    }

    /// Record a rider's actual fare for an estimate and retrain.
    ///
    /// An estimate already saved with [`record_estimate`](Self::record_estimate)
    /// has its trip updated in place; otherwise a reported trip is appended.
    /// Reporting the same estimate twice replaces the earlier report.
    pub fn submit_report(
        &mut self,
        estimate: &FareEstimate,
        actual_fare: i64,
        issues: Vec<IssueTag>,
        comments: Option<String>,
    ) -> Result<usize> {
        validate_fare(actual_fare)?;

        let index = match self.trips.find_by_id(&estimate.trip_id) {
            Some(index) => {
                debug!(index, id = %estimate.trip_id, "Reporting saved trip");
                self.trips.update_trip(index, actual_fare, issues, comments)?;
                index
            }
            None => {
                let mut trip = estimate.to_trip_record();
                trip.set_report(actual_fare, issues, comments);
                self.trips.add_trip(trip)?
            }
        };

        self.retrain()?;
        Ok(index)
    }

    /// Report the actual fare for a previously recorded trip and retrain
    pub fn report_trip(
        &mut self,
        index: usize,
        actual_fare: i64,
        issues: Vec<IssueTag>,
        comments: Option<String>,
    ) -> Result<TripRecord> {
        validate_fare(actual_fare)?;

        let trip = self
            .trips
            .update_trip(index, actual_fare, issues, comments)?
            .clone();

        self.retrain()?;
        Ok(trip)
    }

    /// Retrain adjustment factors from all reported trips
    pub fn retrain(&mut self) -> Result<bool> {
        self.learner.retrain(self.trips.all_trips())
    }

    /// Restore default adjustment factors
    pub fn reset_factors(&mut self) -> Result<()> {
        self.learner.reset()
    }

    /// All trips recorded for a route
    pub fn history_for_route(&self, pickup: &Location, dropoff: &Location) -> Vec<TripRecord> {
        self.trips
            .trips_for_route(pickup, dropoff, self.predictor.config().route_threshold_km)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Reported fares and issues on a route
    pub fn route_summary(&self, pickup: &Location, dropoff: &Location) -> RouteSummary {
        let trips =
            self.trips
                .trips_for_route(pickup, dropoff, self.predictor.config().route_threshold_km);
        RouteSummary::from_trips(&trips)
    }

    pub fn stats(&self) -> EngineStats {
        let reported = self.trips.reported_trips();
        let discrepancies: Vec<i64> = reported.iter().filter_map(|t| t.discrepancy()).collect();

        let mut issue_counts = BTreeMap::new();
        for trip in &reported {
            for issue in trip.reported_issues() {
                *issue_counts.entry(*issue).or_insert(0) += 1;
            }
        }

        EngineStats {
            total_trips: self.trips.len(),
            reported_trips: reported.len(),
            underestimated: discrepancies.iter().filter(|d| **d > 0).count(),
            overestimated: discrepancies.iter().filter(|d| **d < 0).count(),
            average_discrepancy: mean(discrepancies.iter().copied()),
            issue_counts,
        }
    }
}

fn validate_fare(actual_fare: i64) -> Result<()> {
    if actual_fare <= 0 {
        return Err(FareError::InvalidFare(format!(
            "reported fare must be a positive amount, got {}",
            actual_fare
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{MemoryStore, SqliteStore};
    use crate::core::trip::TimeOfDay;
    use chrono::{DateTime, FixedOffset};

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn request(pickup: &str, dropoff: &str, timestamp: &str) -> FareRequest {
        FareRequest {
            pickup: Location::named(pickup),
            dropoff: Location::named(dropoff),
            distance_km: 3.2,
            duration_min: 14,
            waiting_min: 4,
            timestamp: at(timestamp),
        }
    }

    fn engine() -> FareEngine {
        FareEngine::with_defaults(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_report_visible_to_next_prediction() -> Result<()> {
        let mut engine = engine();
        let first = engine.compute_fare(request("Dadar", "Worli", "2024-03-13T14:00:00+05:30"));
        assert_eq!(first.prediction.confidence, 0.70);

        engine.submit_report(&first, 90, vec![IssueTag::Overcharge], None)?;

        let second = engine.compute_fare(request("Dadar", "Worli", "2024-03-13T15:00:00+05:30"));
        assert_eq!(second.prediction.report_count, 1);
        assert!((second.prediction.confidence - 0.87).abs() < 1e-9);
        assert!(second.prediction.fare > first.prediction.fare);
        Ok(())
    }

    #[test]
    fn test_record_then_report() -> Result<()> {
        let mut engine = engine();
        let estimate = engine.compute_fare(request("Kurla", "BKC", "2024-03-13T14:00:00+05:30"));
        let index = engine.record_estimate(&estimate)?;
        assert!(engine.trips().get(index).map(|t| !t.is_reported()).unwrap_or(false));

        let trip = engine.report_trip(index, 75, vec![IssueTag::MeterTampering], Some("fast meter".into()))?;
        assert_eq!(trip.discrepancy(), Some(75 - estimate.prediction.fare));
        assert_eq!(trip.time_of_day(), TimeOfDay::Afternoon);

        let summary = engine.route_summary(&Location::named("Kurla"), &Location::named("BKC"));
        assert_eq!(summary.trip_count, 1);
        assert_eq!(summary.reported_count, 1);
        assert_eq!(summary.tampering_reports, 1);
        assert_eq!(summary.average_reported_fare, Some(75.0));
        Ok(())
    }

    #[test]
    fn test_invalid_fare_rejected() {
        let mut engine = engine();
        let estimate = engine.compute_fare(request("Kurla", "BKC", "2024-03-13T14:00:00+05:30"));
        let err = engine.submit_report(&estimate, 0, Vec::new(), None).unwrap_err();
        assert!(matches!(err, FareError::InvalidFare(_)));
        assert!(engine.trips().is_empty());
    }

    #[test]
    fn test_third_report_retrains() -> Result<()> {
        let mut engine = engine();
        let defaults = engine.factors().clone();

        for hour in ["14:00", "15:00"] {
            let e = engine.compute_fare(request("A", "B", &format!("2024-03-13T{}:00+05:30", hour)));
            engine.submit_report(&e, e.prediction.fare + 26, Vec::new(), None)?;
        }
        assert_eq!(engine.factors(), &defaults);

        let e = engine.compute_fare(request("C", "D", "2024-03-13T16:00:00+05:30"));
        engine.submit_report(&e, e.prediction.fare + 26, Vec::new(), None)?;
        assert!(engine.factors().time_factor(TimeOfDay::Afternoon) > 1.0);
        Ok(())
    }

    #[test]
    fn test_history_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("data.db");

        let estimate = {
            let mut engine = FareEngine::with_defaults(Arc::new(SqliteStore::open(&db_path)?));
            let estimate =
                engine.compute_fare(request("Colaba", "Churchgate", "2024-03-16T21:30:00+05:30"));
            engine.submit_report(&estimate, 70, Vec::new(), None)?;
            estimate
        };

        let engine = FareEngine::with_defaults(Arc::new(SqliteStore::open(&db_path)?));
        let history =
            engine.history_for_route(&Location::named("Colaba"), &Location::named("Churchgate"));
        assert_eq!(history.len(), 1);

        let trip = &history[0];
        assert_eq!(trip.estimated_distance, 3.2);
        assert_eq!(trip.actual_fare(), Some(70));
        assert_eq!(trip.time_of_day(), TimeOfDay::Night);
        assert_eq!(trip.day_of_week(), 6);
        assert_eq!(trip.discrepancy(), Some(70 - estimate.prediction.fare));
        Ok(())
    }

    #[test]
    fn test_saved_estimate_is_reported_in_place() -> Result<()> {
        let mut engine = engine();
        let estimate = engine.compute_fare(request("Bandra", "Khar", "2024-03-13T14:00:00+05:30"));
        let index = engine.record_estimate(&estimate)?;
        assert_eq!(engine.record_estimate(&estimate)?, index);

        let reported = engine.submit_report(&estimate, 80, vec![IssueTag::Overcharge], None)?;
        assert_eq!(reported, index);
        assert_eq!(engine.trips().len(), 1);

        let trip = engine.trips().get(index).expect("saved trip");
        assert_eq!(trip.id(), estimate.trip_id);
        assert_eq!(trip.actual_fare(), Some(80));

        // a second report replaces the first
        engine.submit_report(&estimate, 70, Vec::new(), None)?;
        assert_eq!(engine.trips().len(), 1);
        assert_eq!(engine.trips().reported_trips().len(), 1);
        assert_eq!(engine.trips().get(index).and_then(|t| t.actual_fare()), Some(70));
        Ok(())
    }

    #[test]
    fn test_stats() -> Result<()> {
        let mut engine = engine();
        let saved = engine.compute_fare(request("A", "B", "2024-03-13T14:00:00+05:30"));
        engine.record_estimate(&saved)?;
        engine.submit_report(&saved, saved.prediction.fare + 10, vec![IssueTag::Refusal], None)?;

        let direct = engine.compute_fare(request("A", "B", "2024-03-13T15:00:00+05:30"));
        engine.submit_report(&direct, direct.prediction.fare - 5, Vec::new(), None)?;

        let unreported = engine.compute_fare(request("A", "B", "2024-03-13T16:00:00+05:30"));
        engine.record_estimate(&unreported)?;

        let stats = engine.stats();
        assert_eq!(stats.total_trips, 3);
        assert_eq!(stats.reported_trips, 2);
        assert_eq!(stats.underestimated, 1);
        assert_eq!(stats.overestimated, 1);
        assert_eq!(stats.average_discrepancy, Some(2.5));
        assert_eq!(stats.issue_counts.get(&IssueTag::Refusal), Some(&1));
        Ok(())
    }
}
