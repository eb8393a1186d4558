//! Route estimation from coordinates
//!
//! Static heuristic: straight-line distance stretched to road distance, a
//! city average speed, fixed stop buffers and a time-of-week traffic profile.
//! Callers with a real routing service implement [`RouteEstimator`] instead.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use super::geo::{distance_km, Coordinates};

/// Road distance coefficient (straight line to road)
const ROAD_COEFFICIENT: f64 = 1.2;

/// Average auto-rickshaw speed in km/h
const AVERAGE_SPEED_KMH: f64 = 20.0;

/// Free-flow driving time at the city average speed
pub fn drive_minutes(distance_km: f64) -> u32 {
    (distance_km.max(0.0) * 60.0 / AVERAGE_SPEED_KMH).ceil() as u32
}

/// Traffic condition along a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficCondition {
    Normal,
    Light,
    Moderate,
    Heavy,
}

impl std::fmt::Display for TrafficCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficCondition::Normal => write!(f, "normal"),
            TrafficCondition::Light => write!(f, "light"),
            TrafficCondition::Moderate => write!(f, "moderate"),
            TrafficCondition::Heavy => write!(f, "heavy"),
        }
    }
}

/// Estimated distance and timings for a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub base_duration_min: u32,
    pub traffic_duration_min: u32,
    pub traffic_delay_min: u32,
    pub waiting_min: u32,
    pub condition: TrafficCondition,
}

/// Source of distance and duration for a pickup/dropoff pair
pub trait RouteEstimator {
    fn estimate(
        &self,
        pickup: &Coordinates,
        dropoff: &Coordinates,
        at: &DateTime<FixedOffset>,
    ) -> RouteEstimate;
}

/// Heuristic estimator for Mumbai roads
#[derive(Debug, Clone, Default)]
pub struct HeuristicRouteEstimator;

impl HeuristicRouteEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Traffic multiplier and condition for a local time
    pub fn traffic_at(at: &DateTime<FixedOffset>) -> (f64, TrafficCondition) {
        let hour = at.hour();
        let weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);

        if weekend {
            return match hour {
                18..=21 => (1.3, TrafficCondition::Moderate),
                _ => (0.8, TrafficCondition::Normal),
            };
        }

        match hour {
            9 | 18 => (1.8, TrafficCondition::Heavy),
            8..=10 | 17..=19 => (1.5, TrafficCondition::Moderate),
            11..=16 | 20..=22 => (1.2, TrafficCondition::Light),
            _ => (1.0, TrafficCondition::Normal),
        }
    }

    /// Fixed allowance for signals and pickup, by trip length
    fn stop_buffer_min(distance_km: f64) -> u32 {
        if distance_km <= 2.0 {
            5
        } else if distance_km <= 5.0 {
            8
        } else if distance_km <= 10.0 {
            12
        } else {
            15
        }
    }
}

impl RouteEstimator for HeuristicRouteEstimator {
    fn estimate(
        &self,
        pickup: &Coordinates,
        dropoff: &Coordinates,
        at: &DateTime<FixedOffset>,
    ) -> RouteEstimate {
        let road_km = distance_km(pickup, dropoff) * ROAD_COEFFICIENT;
        let distance_km = (road_km * 10.0).round() / 10.0;

        let base_duration_min = drive_minutes(distance_km) + Self::stop_buffer_min(distance_km);

        let (multiplier, condition) = Self::traffic_at(at);
        let traffic_duration_min = (base_duration_min as f64 * multiplier).ceil() as u32;
        let traffic_delay_min = traffic_duration_min.saturating_sub(base_duration_min);

        let waiting_share = match condition {
            TrafficCondition::Heavy => 0.8,
            TrafficCondition::Moderate => 0.5,
            TrafficCondition::Light => 0.3,
            TrafficCondition::Normal => 0.0,
        };
        let waiting_min = (traffic_delay_min as f64 * waiting_share).ceil() as u32;

        RouteEstimate {
            distance_km,
            base_duration_min,
            traffic_duration_min,
            traffic_delay_min,
            waiting_min,
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_traffic_profile() {
        // Wednesday
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-13T09:15:00+05:30")).1,
            TrafficCondition::Heavy
        );
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-13T10:15:00+05:30")).1,
            TrafficCondition::Moderate
        );
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-13T13:00:00+05:30")).1,
            TrafficCondition::Light
        );
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-13T03:00:00+05:30")).1,
            TrafficCondition::Normal
        );
        // Saturday evening
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-16T19:00:00+05:30")),
            (1.3, TrafficCondition::Moderate)
        );
        // Sunday afternoon
        assert_eq!(
            HeuristicRouteEstimator::traffic_at(&at("2024-03-17T14:00:00+05:30")),
            (0.8, TrafficCondition::Normal)
        );
    }

    #[test]
    fn test_estimate_in_heavy_traffic() {
        let estimator = HeuristicRouteEstimator::new();
        let bandra = Coordinates::new(19.0544, 72.8406);
        let andheri = Coordinates::new(19.1197, 72.8464);

        let est = estimator.estimate(&bandra, &andheri, &at("2024-03-13T09:00:00+05:30"));

        // ~7.3 km straight line -> ~8.8 km by road
        assert!(est.distance_km > 8.5 && est.distance_km < 9.0, "{}", est.distance_km);
        assert_eq!(est.condition, TrafficCondition::Heavy);
        assert!(est.traffic_duration_min > est.base_duration_min);
        assert_eq!(
            est.traffic_delay_min,
            est.traffic_duration_min - est.base_duration_min
        );
        assert!(est.waiting_min > 0 && est.waiting_min <= est.traffic_delay_min);
    }

    #[test]
    fn test_short_trip_at_night_has_no_waiting() {
        let estimator = HeuristicRouteEstimator::new();
        let a = Coordinates::new(19.0178, 72.8478);
        let b = Coordinates::new(19.0250, 72.8478);

        let est = estimator.estimate(&a, &b, &at("2024-03-13T01:00:00+05:30"));
        assert_eq!(est.distance_km, 1.0);
        // ceil(1.0 * 60 / 20) = 3, plus 5 min buffer
        assert_eq!(est.base_duration_min, 8);
        assert_eq!(est.waiting_min, 0);
    }
}
