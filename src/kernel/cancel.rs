use serde::{Deserialize, Serialize};

use super::content::ContentCandidate;
use super::trip::TripState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// The vehicle is past the candidate's POI by more than the configured distance.
    PassedPoi,
    TripEnded,
    /// The generation task died without producing an outcome.
    Aborted,
}

/// Decides when in-flight work has been invalidated by the trip state.
/// Holds no task handles; those live with the dispatch itself.
#[derive(Debug, Clone, Copy)]
pub struct CancellationRegistry {
    passed_poi_m: f64,
}

impl CancellationRegistry {
    pub fn new(passed_poi_m: f64) -> Self {
        Self { passed_poi_m }
    }

    /// Pure: observe trip state -> decide whether the candidate is still worth delivering.
    pub fn assess(&self, candidate: &ContentCandidate, trip: &TripState) -> Option<CancelReason> {
        let poi = candidate.poi.as_ref()?;
        trip.has_passed(poi, self.passed_poi_m)
            .then_some(CancelReason::PassedPoi)
    }
}
