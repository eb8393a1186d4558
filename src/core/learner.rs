//! Adjustment Learner - self-tuning time-of-day and weekday multipliers
//!
//! Each retrain nudges every bucket's factor by its average fare discrepancy
//! normalised by the base fare. Factors are clamped so a burst of outlier
//! reports can never push them outside [min_factor, max_factor].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{FareError, Result};
use super::storage::{KeyValueStore, FACTORS_KEY};
use super::trip::{day_index, TimeOfDay, TripRecord};

/// Traffic level inferred from the hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Low,
    Medium,
    High,
}

impl TrafficLevel {
    /// Peak hours are high, their shoulders medium, everything else low
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            8..=10 | 17..=19 => TrafficLevel::High,
            7..=11 | 16..=20 => TrafficLevel::Medium,
            _ => TrafficLevel::Low,
        }
    }
}

impl std::fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficLevel::Low => write!(f, "low"),
            TrafficLevel::Medium => write!(f, "medium"),
            TrafficLevel::High => write!(f, "high"),
        }
    }
}

/// Static traffic multipliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficFactors {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for TrafficFactors {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 1.1,
            high: 1.2,
        }
    }
}

impl TrafficFactors {
    pub fn for_level(&self, level: TrafficLevel) -> f64 {
        match level {
            TrafficLevel::Low => self.low,
            TrafficLevel::Medium => self.medium,
            TrafficLevel::High => self.high,
        }
    }
}

/// Learned multipliers, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentFactors {
    pub time_of_day: BTreeMap<TimeOfDay, f64>,
    /// Sunday .. Saturday
    pub day_of_week: [f64; 7],
    #[serde(default)]
    pub traffic_conditions: TrafficFactors,
}

impl Default for AdjustmentFactors {
    fn default() -> Self {
        Self {
            time_of_day: BTreeMap::from([
                (TimeOfDay::Morning, 1.0),
                (TimeOfDay::Afternoon, 1.0),
                (TimeOfDay::Evening, 1.1),
                (TimeOfDay::Night, 1.25),
            ]),
            day_of_week: [1.0, 1.0, 1.0, 1.0, 1.0, 1.15, 1.15],
            traffic_conditions: TrafficFactors::default(),
        }
    }
}

impl AdjustmentFactors {
    /// Multiplier for a time bucket, 1.0 if the bucket is missing
    pub fn time_factor(&self, bucket: TimeOfDay) -> f64 {
        self.time_of_day.get(&bucket).copied().unwrap_or(1.0)
    }

    pub fn day_factor(&self, day: usize) -> f64 {
        self.day_of_week.get(day).copied().unwrap_or(1.0)
    }
}

/// Multipliers used for one adjusted fare
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedAdjustments {
    pub time: f64,
    pub day: f64,
    pub traffic: f64,
    pub traffic_level: TrafficLevel,
    pub route: f64,
}

impl AppliedAdjustments {
    pub fn combined(&self) -> f64 {
        self.time * self.day * self.traffic * self.route
    }
}

/// Learner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Reported trips required before factors move
    pub min_reports: usize,
    /// Discrepancy normaliser (₹), the base fare
    pub normalizing_fare: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_reports: 3,
            normalizing_fare: 26.0,
            min_factor: 0.5,
            max_factor: 2.0,
        }
    }
}

impl LearningConfig {
    /// Reject bounds that would make retraining meaningless
    pub fn validate(&self) -> Result<()> {
        let finite = [self.normalizing_fare, self.min_factor, self.max_factor]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(FareError::InvalidConfig(
                "learning values must be finite numbers".to_string(),
            ));
        }
        if self.normalizing_fare <= 0.0 {
            return Err(FareError::InvalidConfig(format!(
                "learning.normalizing_fare must be positive, got {}",
                self.normalizing_fare
            )));
        }
        if self.min_factor <= 0.0 || self.min_factor > self.max_factor {
            return Err(FareError::InvalidConfig(format!(
                "learning factor bounds need 0 < min_factor <= max_factor, got [{}, {}]",
                self.min_factor, self.max_factor
            )));
        }
        Ok(())
    }

    /// Pull a factor into [min_factor, max_factor]
    fn bound(&self, factor: f64) -> f64 {
        factor.max(self.min_factor).min(self.max_factor)
    }
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Learner owning the current adjustment factors
pub struct AdjustmentLearner {
    factors: AdjustmentFactors,
    config: LearningConfig,
    store: Arc<dyn KeyValueStore>,
}

impl AdjustmentLearner {
    /// Load persisted factors, falling back to defaults
    pub fn load(store: Arc<dyn KeyValueStore>, config: LearningConfig) -> Self {
        let factors = match store.get(FACTORS_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<AdjustmentFactors>(&bytes) {
                Ok(factors) => Self::within_bounds(factors, &config),
                Err(e) => {
                    warn!(error = %e, "Stored adjustment factors are corrupt, using defaults");
                    AdjustmentFactors::default()
                }
            },
            Ok(None) => AdjustmentFactors::default(),
            Err(e) => {
                warn!(error = %e, "Could not read adjustment factors, using defaults");
                AdjustmentFactors::default()
            }
        };

        Self {
            factors,
            config,
            store,
        }
    }

    /// Clamp persisted factors that fall outside the configured range
    fn within_bounds(mut factors: AdjustmentFactors, config: &LearningConfig) -> AdjustmentFactors {
        let out_of_range = factors
            .time_of_day
            .values()
            .chain(factors.day_of_week.iter())
            .any(|f| !(config.min_factor..=config.max_factor).contains(f));
        if !out_of_range {
            return factors;
        }

        warn!(
            min = config.min_factor,
            max = config.max_factor,
            "Stored adjustment factors out of range, clamping"
        );
        for factor in factors.time_of_day.values_mut() {
            *factor = config.bound(*factor);
        }
        for factor in factors.day_of_week.iter_mut() {
            *factor = config.bound(*factor);
        }
        factors
    }

    pub fn factors(&self) -> &AdjustmentFactors {
        &self.factors
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    fn persist(&self) -> Result<()> {
        let payload = serde_json::to_vec(&self.factors)?;
        self.store.set(FACTORS_KEY, &payload)
    }

    /// Restore and persist default factors
    pub fn reset(&mut self) -> Result<()> {
        self.factors = AdjustmentFactors::default();
        info!("Adjustment factors reset to defaults");
        self.persist()
    }

    /// Retrain from the trip history.
    ///
    /// Returns `false` without touching the factors when fewer than
    /// `min_reports` trips carry a reported fare.
    pub fn retrain(&mut self, trips: &[TripRecord]) -> Result<bool> {
        let reported: Vec<&TripRecord> = trips.iter().filter(|t| t.is_reported()).collect();
        if reported.len() < self.config.min_reports {
            debug!(
                reported = reported.len(),
                required = self.config.min_reports,
                "Not enough reports to retrain"
            );
            return Ok(false);
        }

        let mut by_time: BTreeMap<TimeOfDay, Accumulator> = BTreeMap::new();
        let mut by_day = [Accumulator::default(); 7];

        for trip in &reported {
            if let Some(discrepancy) = trip.discrepancy() {
                by_time
                    .entry(trip.time_of_day())
                    .or_default()
                    .add(discrepancy as f64);
                if let Some(acc) = by_day.get_mut(trip.day_of_week() as usize) {
                    acc.add(discrepancy as f64);
                }
            }
        }

        for (bucket, acc) in &by_time {
            if let Some(avg) = acc.mean() {
                let current = self.factors.time_factor(*bucket);
                let updated = self.nudge(current, avg);
                self.factors.time_of_day.insert(*bucket, updated);
            }
        }

        for (day, acc) in by_day.iter().enumerate() {
            if let Some(avg) = acc.mean() {
                self.factors.day_of_week[day] = self.nudge(self.factors.day_of_week[day], avg);
            }
        }

        info!(
            reports = reported.len(),
            time_of_day = ?self.factors.time_of_day,
            day_of_week = ?self.factors.day_of_week,
            "Retrained adjustment factors"
        );

        self.persist()?;
        Ok(true)
    }

    fn nudge(&self, current: f64, average_discrepancy: f64) -> f64 {
        let ratio = average_discrepancy / self.config.normalizing_fare;
        let clamped = self.config.bound(current + ratio);
        (clamped * 100.0).round() / 100.0
    }

    /// Multipliers in effect at a given local time
    pub fn adjustments_at(&self, timestamp: &DateTime<FixedOffset>) -> AppliedAdjustments {
        let traffic_level = TrafficLevel::for_hour(timestamp.hour());
        AppliedAdjustments {
            time: self.factors.time_factor(TimeOfDay::of(timestamp)),
            day: self.factors.day_factor(day_index(timestamp)),
            traffic: self.factors.traffic_conditions.for_level(traffic_level),
            traffic_level,
            route: 1.0,
        }
    }

    /// Scale a tariff total by the factors in effect at `timestamp`
    pub fn apply_adjustments(
        &self,
        tariff_total: i64,
        timestamp: &DateTime<FixedOffset>,
    ) -> (i64, AppliedAdjustments) {
        let adjustments = self.adjustments_at(timestamp);
        let adjusted = (tariff_total as f64 * adjustments.combined()).round() as i64;
        (adjusted, adjustments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Location;
    use crate::core::storage::MemoryStore;
    use crate::core::tariff::FareBreakdown;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn reported_trip(timestamp: &str, estimated: i64, actual: i64) -> TripRecord {
        let mut trip = TripRecord::new(
            Location::named("Andheri"),
            Location::named("Juhu"),
            4.0,
            15,
            estimated,
            FareBreakdown::default(),
            at(timestamp),
        );
        trip.set_report(actual, Vec::new(), None);
        trip
    }

    fn learner() -> AdjustmentLearner {
        AdjustmentLearner::load(Arc::new(MemoryStore::new()), LearningConfig::default())
    }

    #[test]
    fn test_traffic_levels() {
        assert_eq!(TrafficLevel::for_hour(9), TrafficLevel::High);
        assert_eq!(TrafficLevel::for_hour(18), TrafficLevel::High);
        assert_eq!(TrafficLevel::for_hour(7), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::for_hour(11), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::for_hour(16), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::for_hour(20), TrafficLevel::Medium);
        assert_eq!(TrafficLevel::for_hour(14), TrafficLevel::Low);
        assert_eq!(TrafficLevel::for_hour(2), TrafficLevel::Low);
    }

    #[test]
    fn test_retrain_needs_three_reports() -> Result<()> {
        let mut learner = learner();
        let trips = vec![
            reported_trip("2024-03-13T09:00:00+05:30", 69, 100),
            reported_trip("2024-03-13T10:00:00+05:30", 69, 100),
        ];

        assert!(!learner.retrain(&trips)?);
        assert_eq!(learner.factors(), &AdjustmentFactors::default());
        Ok(())
    }

    #[test]
    fn test_retrain_moves_only_observed_buckets() -> Result<()> {
        let mut learner = learner();
        // Wednesday mornings, each underestimated by 13
        let trips = vec![
            reported_trip("2024-03-13T09:00:00+05:30", 69, 82),
            reported_trip("2024-03-13T09:30:00+05:30", 69, 82),
            reported_trip("2024-03-13T10:00:00+05:30", 69, 82),
        ];

        assert!(learner.retrain(&trips)?);
        let factors = learner.factors();
        // 1.0 + 13/26
        assert_eq!(factors.time_factor(TimeOfDay::Morning), 1.5);
        assert_eq!(factors.day_of_week[3], 1.5);
        // untouched
        assert_eq!(factors.time_factor(TimeOfDay::Evening), 1.1);
        assert_eq!(factors.day_of_week[6], 1.15);
        Ok(())
    }

    #[test]
    fn test_factors_stay_clamped() -> Result<()> {
        let mut learner = learner();
        let overcharged = vec![
            reported_trip("2024-03-16T22:00:00+05:30", 30, 400),
            reported_trip("2024-03-16T23:00:00+05:30", 30, 400),
            reported_trip("2024-03-17T01:00:00+05:30", 30, 400),
        ];
        let undercharged = vec![
            reported_trip("2024-03-12T13:00:00+05:30", 200, 26),
            reported_trip("2024-03-12T14:00:00+05:30", 200, 26),
            reported_trip("2024-03-12T15:00:00+05:30", 200, 26),
        ];

        for _ in 0..5 {
            learner.retrain(&overcharged)?;
            learner.retrain(&undercharged)?;
        }

        let factors = learner.factors();
        for f in factors.time_of_day.values().chain(factors.day_of_week.iter()) {
            assert!((0.5..=2.0).contains(f), "factor {} out of range", f);
        }
        assert_eq!(factors.time_factor(TimeOfDay::Night), 2.0);
        assert_eq!(factors.time_factor(TimeOfDay::Afternoon), 0.5);
        Ok(())
    }

    #[test]
    fn test_factors_persist() -> Result<()> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut learner = AdjustmentLearner::load(kv.clone(), LearningConfig::default());
        let trips = vec![
            reported_trip("2024-03-13T09:00:00+05:30", 69, 82),
            reported_trip("2024-03-13T09:30:00+05:30", 69, 82),
            reported_trip("2024-03-13T10:00:00+05:30", 69, 82),
        ];
        learner.retrain(&trips)?;

        let reloaded = AdjustmentLearner::load(kv, LearningConfig::default());
        assert_eq!(reloaded.factors(), learner.factors());
        Ok(())
    }

    #[test]
    fn test_corrupt_factors_fall_back() -> Result<()> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.set(FACTORS_KEY, b"[]")?;
        let learner = AdjustmentLearner::load(kv, LearningConfig::default());
        assert_eq!(learner.factors(), &AdjustmentFactors::default());
        Ok(())
    }

    #[test]
    fn test_out_of_range_factors_are_clamped_on_load() -> Result<()> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut stored = AdjustmentFactors::default();
        stored.day_of_week[5] = 5.0;
        stored.time_of_day.insert(TimeOfDay::Morning, 0.1);
        kv.set(FACTORS_KEY, &serde_json::to_vec(&stored)?)?;

        let learner = AdjustmentLearner::load(kv, LearningConfig::default());
        let factors = learner.factors();
        assert_eq!(factors.day_of_week[5], 2.0);
        assert_eq!(factors.time_factor(TimeOfDay::Morning), 0.5);
        // in-range values are kept
        assert_eq!(factors.day_of_week[6], 1.15);
        assert_eq!(factors.time_factor(TimeOfDay::Night), 1.25);
        Ok(())
    }

    #[test]
    fn test_learning_config_validation() {
        assert!(LearningConfig::default().validate().is_ok());

        let inverted = LearningConfig {
            min_factor: 3.0,
            ..LearningConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(FareError::InvalidConfig(_))));

        let zero_normaliser = LearningConfig {
            normalizing_fare: 0.0,
            ..LearningConfig::default()
        };
        assert!(zero_normaliser.validate().is_err());

        let nan_bound = LearningConfig {
            max_factor: f64::NAN,
            ..LearningConfig::default()
        };
        assert!(nan_bound.validate().is_err());

        let zero_floor = LearningConfig {
            min_factor: 0.0,
            ..LearningConfig::default()
        };
        assert!(zero_floor.validate().is_err());
    }

    #[test]
    fn test_apply_default_adjustments() {
        let learner = learner();

        // Friday 14:00: afternoon 1.0, Friday 1.15, low traffic 1.0
        let (total, adj) = learner.apply_adjustments(100, &at("2024-03-15T14:00:00+05:30"));
        assert_eq!(total, 115);
        assert_eq!(adj.traffic_level, TrafficLevel::Low);

        // Wednesday 09:00: morning 1.0, Wednesday 1.0, high traffic 1.2
        let (total, adj) = learner.apply_adjustments(65, &at("2024-03-13T09:00:00+05:30"));
        assert_eq!(total, 78);
        assert_eq!(adj.traffic, 1.2);
        assert_eq!(adj.route, 1.0);
    }

    #[test]
    fn test_factors_json_layout() {
        let json = serde_json::to_value(AdjustmentFactors::default()).unwrap();
        assert_eq!(json["timeOfDay"]["night"], 1.25);
        assert_eq!(json["dayOfWeek"][5], 1.15);
        assert_eq!(json["trafficConditions"]["high"], 1.2);
    }
}
