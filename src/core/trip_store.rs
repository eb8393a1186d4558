//! Trip Store - append-only trip history with route-similarity lookup
//!
//! The whole collection lives in memory and is written back to the
//! key-value store as one JSON array after every mutation.

use std::sync::Arc;

use tracing::{debug, info, warn};
use ulid::Ulid;

use super::error::{FareError, Result};
use super::geo::{distance_km, Location};
use super::storage::{KeyValueStore, TRIPS_KEY};
use super::trip::{IssueTag, TripRecord};

/// Default proximity threshold for route matching (km)
pub const DEFAULT_ROUTE_THRESHOLD_KM: f64 = 0.5;

/// Persistent trip collection
pub struct TripStore {
    trips: Vec<TripRecord>,
    store: Arc<dyn KeyValueStore>,
}

impl TripStore {
    /// Load trips from the store.
    ///
    /// A missing, unreadable or corrupt payload yields an empty collection.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let trips = match store.get(TRIPS_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<TripRecord>>(&bytes) {
                Ok(trips) => {
                    debug!(count = trips.len(), "Loaded trips from storage");
                    trips
                }
                Err(e) => {
                    warn!(error = %e, "Stored trips are corrupt, starting with an empty history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Could not read stored trips, starting with an empty history");
                Vec::new()
            }
        };

        Self { trips, store }
    }

    fn persist(&self) -> Result<()> {
        let payload = serde_json::to_vec(&self.trips)?;
        self.store.set(TRIPS_KEY, &payload)
    }

    /// Append a trip and persist. Returns its index.
    pub fn add_trip(&mut self, trip: TripRecord) -> Result<usize> {
        info!(
            id = %trip.id(),
            pickup = %trip.pickup,
            dropoff = %trip.dropoff,
            reported = trip.is_reported(),
            "Saving trip"
        );
        self.trips.push(trip);
        self.persist()?;
        Ok(self.trips.len() - 1)
    }

    /// All trips in insertion order
    pub fn all_trips(&self) -> &[TripRecord] {
        &self.trips
    }

    pub fn get(&self, index: usize) -> Option<&TripRecord> {
        self.trips.get(index)
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Index of the trip with the given id
    pub fn find_by_id(&self, id: &Ulid) -> Option<usize> {
        self.trips.iter().position(|t| t.id() == *id)
    }

    /// Trips that carry a rider-reported fare
    pub fn reported_trips(&self) -> Vec<&TripRecord> {
        self.trips.iter().filter(|t| t.is_reported()).collect()
    }

    /// Trips on the same route, matched by name or by endpoint proximity
    pub fn trips_for_route(
        &self,
        pickup: &Location,
        dropoff: &Location,
        threshold_km: f64,
    ) -> Vec<&TripRecord> {
        let result: Vec<&TripRecord> = self
            .trips
            .iter()
            .filter(|trip| same_route(trip, pickup, dropoff, threshold_km))
            .collect();

        debug!(
            count = result.len(),
            pickup = %pickup,
            dropoff = %dropoff,
            "Found trips for route"
        );
        result
    }

    /// Record a report against an existing trip and persist
    pub fn update_trip(
        &mut self,
        index: usize,
        actual_fare: i64,
        issues: Vec<IssueTag>,
        comments: Option<String>,
    ) -> Result<&TripRecord> {
        let total = self.trips.len();
        let trip = self
            .trips
            .get_mut(index)
            .ok_or_else(|| FareError::TripNotFound(format!("#{} (have {} trips)", index, total)))?;

        trip.set_report(actual_fare, issues, comments);
        info!(
            index,
            actual_fare,
            discrepancy = ?trip.discrepancy(),
            "Updated trip report"
        );

        self.persist()?;
        Ok(&self.trips[index])
    }
}

fn same_route(trip: &TripRecord, pickup: &Location, dropoff: &Location, threshold_km: f64) -> bool {
    if trip.pickup.name == pickup.name && trip.dropoff.name == dropoff.name {
        return true;
    }

    match (
        trip.pickup.coordinates,
        trip.dropoff.coordinates,
        pickup.coordinates,
        dropoff.coordinates,
    ) {
        (Some(tp), Some(td), Some(qp), Some(qd)) => {
            distance_km(&tp, &qp) < threshold_km && distance_km(&td, &qd) < threshold_km
        }
        _ => false,
    }
}
