//! Fare Predictor - blends the adjusted tariff with rider reports
//!
//! Without reports on a route the adjusted tariff is returned with a fixed
//! base confidence. With reports, each one contributes its per-km rate scaled
//! to the requested distance, weighted by recency and distance similarity:
//!
//! ```text
//! weight = 1 / (1 + days_apart * recency_weight + km_apart * distance_weight)
//! ```

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geo::Location;
use super::learner::{AdjustmentLearner, AppliedAdjustments};
use super::tariff::{FareBreakdown, TariffCalculator};
use super::trip_store::{TripStore, DEFAULT_ROUTE_THRESHOLD_KM};
use super::trip::TripRecord;

/// Seconds in a day, for recency weighting
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Predictor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Confidence when no reports exist for the route
    pub formula_confidence: f64,
    /// Confidence with reports, before the per-report bonus
    pub report_confidence: f64,
    /// Added per usable report
    pub confidence_per_report: f64,
    /// Upper bound for confidence
    pub max_confidence: f64,
    /// Weight penalty per day between the report and the requested time
    pub recency_weight: f64,
    /// Weight penalty per km of distance difference
    pub distance_weight: f64,
    /// Proximity threshold for route matching (km)
    pub route_threshold_km: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            formula_confidence: 0.70,
            report_confidence: 0.85,
            confidence_per_report: 0.02,
            max_confidence: 0.95,
            recency_weight: 0.1,
            distance_weight: 0.5,
            route_threshold_km: DEFAULT_ROUTE_THRESHOLD_KM,
        }
    }
}

/// Inputs for one fare prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareRequest {
    pub pickup: Location,
    pub dropoff: Location,
    pub distance_km: f64,
    pub duration_min: u32,
    pub waiting_min: u32,
    pub timestamp: DateTime<FixedOffset>,
}

/// A fare prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarePrediction {
    pub fare: i64,
    pub breakdown: FareBreakdown,
    pub confidence: f64,
    pub adjustments: AppliedAdjustments,
    /// Tariff total after adjustments, before report blending
    pub standard_fare: i64,
    /// Reports that contributed to the fare
    pub report_count: usize,
    pub is_night: bool,
}

/// Report-weighted predictor
#[derive(Debug, Clone)]
pub struct FarePredictor {
    config: PredictionConfig,
}

impl FarePredictor {
    pub fn new() -> Self {
        Self {
            config: PredictionConfig::default(),
        }
    }

    pub fn with_config(config: PredictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Confidence for a number of usable reports
    pub fn confidence_for(&self, report_count: usize) -> f64 {
        if report_count == 0 {
            return self.config.formula_confidence;
        }
        (self.config.report_confidence + self.config.confidence_per_report * report_count as f64)
            .min(self.config.max_confidence)
    }

    /// Similarity weight of a reported trip relative to the request
    pub fn weight(&self, trip: &TripRecord, request: &FareRequest) -> f64 {
        let seconds_apart = (request.timestamp - trip.timestamp()).num_seconds().abs() as f64;
        let days_apart = seconds_apart / SECONDS_PER_DAY;
        let km_apart = (trip.estimated_distance - request.distance_km).abs();
        1.0 / (1.0 + days_apart * self.config.recency_weight + km_apart * self.config.distance_weight)
    }

    /// Predict a fare for a route
    pub fn predict(
        &self,
        request: &FareRequest,
        tariff: &TariffCalculator,
        learner: &AdjustmentLearner,
        trips: &TripStore,
    ) -> FarePrediction {
        let is_night = tariff.is_night(request.timestamp.hour());
        let base = tariff.base_tariff(
            request.distance_km,
            f64::from(request.waiting_min),
            is_night,
        );
        let (standard_fare, adjustments) = learner.apply_adjustments(base.total, &request.timestamp);

        let standard = FarePrediction {
            fare: standard_fare,
            breakdown: base.breakdown,
            confidence: self.confidence_for(0),
            adjustments,
            standard_fare,
            report_count: 0,
            is_night,
        };

        let reported: Vec<&TripRecord> = trips
            .trips_for_route(&request.pickup, &request.dropoff, self.config.route_threshold_km)
            .into_iter()
            .filter(|t| t.is_reported() && t.estimated_distance > 0.0)
            .collect();

        if reported.is_empty() {
            return standard;
        }

        let mut total_weight = 0.0;
        let mut weighted_fare = 0.0;
        for trip in &reported {
            let Some(actual) = trip.actual_fare() else {
                continue;
            };
            let weight = self.weight(trip, request);
            let scaled = actual as f64 / trip.estimated_distance * request.distance_km;
            debug!(id = %trip.id(), weight, scaled, "Weighted report");
            total_weight += weight;
            weighted_fare += scaled * weight;
        }

        if !(total_weight.is_finite() && total_weight > 0.0) {
            debug!("No usable report weight, using standard fare");
            return standard;
        }

        let predicted = weighted_fare / total_weight;
        let breakdown_total = base.breakdown.sum();
        let ratio = if breakdown_total > 0 {
            predicted / breakdown_total as f64
        } else {
            1.0
        };

        FarePrediction {
            fare: predicted.round() as i64,
            breakdown: base.breakdown.scaled(ratio),
            confidence: self.confidence_for(reported.len()),
            adjustments,
            standard_fare,
            report_count: reported.len(),
            is_night,
        }
    }
}

impl Default for FarePredictor {
    fn default() -> Self {
        Self::new()
    }
}
