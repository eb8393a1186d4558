//! Trip - one journey's estimate and its optional fare report
//!
//! # Key Properties
//! - **id**: ULID assigned at creation
//! - **timestamp**: journey instant with its local UTC offset
//! - **time_of_day / day_of_week**: derived once from the timestamp
//! - **discrepancy**: `actual_fare - estimated_fare`, recomputed on every report

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::geo::Location;
use super::tariff::FareBreakdown;

/// Time-of-day bucket used by the adjustment learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Night,
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
    ];

    /// Bucket for a local hour (0-23)
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn of(timestamp: &DateTime<FixedOffset>) -> Self {
        Self::from_hour(timestamp.hour())
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeOfDay::Night => write!(f, "night"),
            TimeOfDay::Morning => write!(f, "morning"),
            TimeOfDay::Afternoon => write!(f, "afternoon"),
            TimeOfDay::Evening => write!(f, "evening"),
        }
    }
}

/// Weekday index, 0 = Sunday .. 6 = Saturday
pub fn day_index(timestamp: &DateTime<FixedOffset>) -> usize {
    timestamp.weekday().num_days_from_sunday() as usize
}

/// Problems a rider can flag alongside a fare report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueTag {
    MeterTampering,
    Overcharge,
    Refusal,
    LongRoute,
    RudeBehaviour,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for IssueTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueTag::MeterTampering => write!(f, "meter_tampering"),
            IssueTag::Overcharge => write!(f, "overcharge"),
            IssueTag::Refusal => write!(f, "refusal"),
            IssueTag::LongRoute => write!(f, "long_route"),
            IssueTag::RudeBehaviour => write!(f, "rude_behaviour"),
            IssueTag::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for IssueTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "meter_tampering" | "tampering" => Ok(IssueTag::MeterTampering),
            "overcharge" => Ok(IssueTag::Overcharge),
            "refusal" => Ok(IssueTag::Refusal),
            "long_route" => Ok(IssueTag::LongRoute),
            "rude_behaviour" | "rude_behavior" | "rude" => Ok(IssueTag::RudeBehaviour),
            "other" => Ok(IssueTag::Other),
            _ => anyhow::bail!("Unknown issue: {}", s),
        }
    }
}

/// A recorded journey
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredTrip")]
pub struct TripRecord {
    id: Ulid,

    pub pickup: Location,
    pub dropoff: Location,

    /// Estimated road distance (km)
    pub estimated_distance: f64,

    /// Estimated duration (minutes)
    pub estimated_time: u32,

    /// Fare quoted to the rider (₹)
    pub estimated_fare: i64,

    pub fare_breakdown: FareBreakdown,

    actual_fare: Option<i64>,

    reported_issues: BTreeSet<IssueTag>,

    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<String>,

    timestamp: DateTime<FixedOffset>,

    time_of_day: TimeOfDay,

    day_of_week: u8,

    discrepancy: Option<i64>,
}

impl TripRecord {
    /// Create an unreported trip from an estimate
    pub fn new(
        pickup: Location,
        dropoff: Location,
        estimated_distance: f64,
        estimated_time: u32,
        estimated_fare: i64,
        fare_breakdown: FareBreakdown,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            pickup,
            dropoff,
            estimated_distance,
            estimated_time,
            estimated_fare,
            fare_breakdown,
            actual_fare: None,
            reported_issues: BTreeSet::new(),
            comments: None,
            timestamp,
            time_of_day: TimeOfDay::of(&timestamp),
            day_of_week: day_index(&timestamp) as u8,
            discrepancy: None,
        }
    }

    /// Same trip under a caller-chosen id
    pub fn with_id(mut self, id: Ulid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn actual_fare(&self) -> Option<i64> {
        self.actual_fare
    }

    pub fn reported_issues(&self) -> &BTreeSet<IssueTag> {
        &self.reported_issues
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn discrepancy(&self) -> Option<i64> {
        self.discrepancy
    }

    pub fn is_reported(&self) -> bool {
        self.actual_fare.is_some()
    }

    pub fn has_issue(&self, issue: IssueTag) -> bool {
        self.reported_issues.contains(&issue)
    }

    /// Attach a rider's report, replacing any earlier one
    pub fn set_report(
        &mut self,
        actual_fare: i64,
        issues: impl IntoIterator<Item = IssueTag>,
        comments: Option<String>,
    ) {
        self.actual_fare = Some(actual_fare);
        self.reported_issues = issues.into_iter().collect();
        self.comments = comments.filter(|c| !c.trim().is_empty());
        self.recalculate_discrepancy();
    }

    fn recalculate_discrepancy(&mut self) {
        self.discrepancy = self.actual_fare.map(|actual| actual - self.estimated_fare);
    }
}

/// Persisted shape of a trip. Derived fields in the payload are ignored and
/// recomputed from the timestamp and fares.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTrip {
    #[serde(default = "Ulid::new")]
    id: Ulid,
    pickup: Location,
    dropoff: Location,
    estimated_distance: f64,
    #[serde(default)]
    estimated_time: u32,
    estimated_fare: i64,
    #[serde(default)]
    fare_breakdown: FareBreakdown,
    #[serde(default)]
    actual_fare: Option<i64>,
    #[serde(default)]
    reported_issues: BTreeSet<IssueTag>,
    #[serde(default)]
    comments: Option<String>,
    timestamp: DateTime<FixedOffset>,
}

impl From<StoredTrip> for TripRecord {
    fn from(stored: StoredTrip) -> Self {
        let mut trip = TripRecord::new(
            stored.pickup,
            stored.dropoff,
            stored.estimated_distance,
            stored.estimated_time,
            stored.estimated_fare,
            stored.fare_breakdown,
            stored.timestamp,
        );
        trip.id = stored.id;
        trip.actual_fare = stored.actual_fare;
        trip.reported_issues = stored.reported_issues;
        trip.comments = stored.comments;
        trip.recalculate_discrepancy();
        trip
    }
}
