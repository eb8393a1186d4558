//! Tariff Calculator
//!
//! Deterministic Mumbai auto-rickshaw tariff:
//! - Flat base fare covering the first 1.5 km
//! - Per-km charge beyond the minimum distance
//! - Night surcharge on base + distance
//! - Per-minute waiting charge
//!
//! Intermediate math stays in `f64`. The total is rounded once from the raw
//! sum; the breakdown components are rounded independently for display, so
//! their sum can differ from the total by a rupee.

use serde::{Deserialize, Serialize};

/// Fare components in whole rupees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_fare: i64,
    pub distance_charge: i64,
    pub night_charge: i64,
    pub waiting_charge: i64,
}

impl FareBreakdown {
    /// Sum of all components
    pub fn sum(&self) -> i64 {
        self.base_fare + self.distance_charge + self.night_charge + self.waiting_charge
    }

    /// Scale every component by `ratio`, rounding each one
    pub fn scaled(&self, ratio: f64) -> Self {
        let scale = |v: i64| (v as f64 * ratio).round().max(0.0) as i64;
        Self {
            base_fare: scale(self.base_fare),
            distance_charge: scale(self.distance_charge),
            night_charge: scale(self.night_charge),
            waiting_charge: scale(self.waiting_charge),
        }
    }
}

/// Output of the base formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffResult {
    pub breakdown: FareBreakdown,
    pub total: i64,
}

/// Local hours during which the night surcharge applies.
///
/// `start_hour` is inclusive, `end_hour` exclusive. A window with
/// `start_hour > end_hour` wraps past midnight (e.g. 22..5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start_hour: 0,
            end_hour: 5,
        }
    }
}

impl NightWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Tariff rates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Flat fare, also the minimum fare (₹)
    pub base_fare: f64,
    /// Distance covered by the base fare (km)
    pub min_distance_km: f64,
    /// Rate per km beyond the minimum distance (₹)
    pub per_km_rate: f64,
    /// Night fare multiplier (1.25 = 25% surcharge)
    pub night_multiplier: f64,
    /// Waiting charge per minute (₹)
    pub waiting_per_min: f64,
    /// When the night surcharge applies
    pub night_window: NightWindow,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            base_fare: 26.0,
            min_distance_km: 1.5,
            per_km_rate: 17.14,
            night_multiplier: 1.25,
            waiting_per_min: 2.6,
            night_window: NightWindow::default(),
        }
    }
}

/// Tariff calculator
#[derive(Debug, Clone)]
pub struct TariffCalculator {
    config: TariffConfig,
}

impl TariffCalculator {
    pub fn new() -> Self {
        Self {
            config: TariffConfig::default(),
        }
    }

    pub fn with_config(config: TariffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TariffConfig {
        &self.config
    }

    /// Whether a local hour falls in the night window
    pub fn is_night(&self, hour: u32) -> bool {
        self.config.night_window.contains(hour)
    }

    /// Distance billed at the per-km rate
    pub fn chargeable_distance(&self, distance_km: f64) -> f64 {
        (distance_km - self.config.min_distance_km).max(0.0)
    }

    /// Apply the base formula
    pub fn base_tariff(&self, distance_km: f64, waiting_minutes: f64, is_night: bool) -> TariffResult {
        let base_fare = self.config.base_fare;
        let distance_charge = self.chargeable_distance(distance_km) * self.config.per_km_rate;
        let night_charge = if is_night {
            (base_fare + distance_charge) * (self.config.night_multiplier - 1.0)
        } else {
            0.0
        };
        let waiting_charge = waiting_minutes.max(0.0) * self.config.waiting_per_min;

        let breakdown = FareBreakdown {
            base_fare: base_fare.round() as i64,
            distance_charge: distance_charge.round() as i64,
            night_charge: night_charge.round() as i64,
            waiting_charge: waiting_charge.round() as i64,
        };
        let raw_total = base_fare + distance_charge + night_charge + waiting_charge;
        let total = raw_total.max(base_fare).round() as i64;

        TariffResult { breakdown, total }
    }
}

impl Default for TariffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_distance() {
        let calc = TariffCalculator::new();
        let result = calc.base_tariff(1.5, 0.0, false);
        assert_eq!(
            result.breakdown,
            FareBreakdown {
                base_fare: 26,
                distance_charge: 0,
                night_charge: 0,
                waiting_charge: 0,
            }
        );
        assert_eq!(result.total, 26);
    }

    #[test]
    fn test_distance_charge() {
        let calc = TariffCalculator::new();
        let result = calc.base_tariff(5.5, 0.0, false);
        // 4.0 km * 17.14 = 68.56
        assert_eq!(result.breakdown.distance_charge, 69);
        assert_eq!(result.total, 95);
    }

    #[test]
    fn test_floor_holds_for_any_distance() {
        let calc = TariffCalculator::new();
        for tenths in 0..300 {
            let d = tenths as f64 / 10.0;
            assert!(calc.base_tariff(d, 0.0, false).total >= 26, "distance {}", d);
        }
    }

    #[test]
    fn test_night_surcharge() {
        let calc = TariffCalculator::new();
        for d in [0.0, 1.5, 3.2, 5.5, 12.7] {
            let chargeable = (d - 1.5f64).max(0.0);
            let distance_charge = chargeable * 17.14;
            let expected = ((26.0 + distance_charge) * 0.25).round() as i64;
            assert_eq!(calc.base_tariff(d, 0.0, true).breakdown.night_charge, expected);
        }
    }

    #[test]
    fn test_waiting_scenario() {
        let calc = TariffCalculator::new();
        let result = calc.base_tariff(3.2, 4.0, false);
        assert_eq!(result.breakdown.base_fare, 26);
        assert_eq!(result.breakdown.distance_charge, 29);
        assert_eq!(result.breakdown.night_charge, 0);
        assert_eq!(result.breakdown.waiting_charge, 10);
        assert_eq!(result.breakdown.sum(), 65);
        // 26 + 29.138 + 10.4 = 65.538
        assert_eq!(result.total, 66);
    }

    #[test]
    fn test_total_rounds_raw_sum() {
        let calc = TariffCalculator::new();
        // distance 0.4 and waiting 10.4 both round down, together they round up
        let result = calc.base_tariff(1.5 + 0.4 / 17.14, 4.0, false);
        assert_eq!(result.breakdown.distance_charge, 0);
        assert_eq!(result.breakdown.waiting_charge, 10);
        assert_eq!(result.breakdown.sum(), 36);
        assert_eq!(result.total, 37);
    }

    #[test]
    fn test_night_window() {
        let default = NightWindow::default();
        assert!(default.contains(0));
        assert!(default.contains(4));
        assert!(!default.contains(5));
        assert!(!default.contains(23));

        let wrapping = NightWindow {
            start_hour: 22,
            end_hour: 5,
        };
        assert!(wrapping.contains(22));
        assert!(wrapping.contains(2));
        assert!(!wrapping.contains(12));
    }

    #[test]
    fn test_scaled_breakdown() {
        let b = FareBreakdown {
            base_fare: 26,
            distance_charge: 29,
            night_charge: 0,
            waiting_charge: 10,
        };
        let doubled = b.scaled(2.0);
        assert_eq!(doubled.sum(), 130);
        assert_eq!(b.scaled(1.0), b);
    }
}
