use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::geo::{angle_between, BoundingBox, Position};
use super::poi::{NearbyPoi, Poi, PoiCache, PoiId};
use super::session::TripId;
use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::services::retry::{retry, with_timeout, RetryPolicy};
use crate::services::PoiLookup;

/// Two samples closer than this with the same timestamp count as a duplicate, not a jump.
const DUPLICATE_TOLERANCE_M: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub lat: f64,
    pub lon: f64,
    pub heading_degrees: f64,
    pub speed_mps: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn position(&self) -> Position {
        Position::new(self.lat, self.lon)
    }

    fn is_well_formed(&self) -> bool {
        self.position().is_valid()
            && self.heading_degrees.is_finite()
            && self.speed_mps.is_finite()
            && self.speed_mps >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripState {
    pub position: Position,
    pub heading_deg: f64,
    pub speed_mps: f64,
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub elapsed: TimeDelta,
    /// Cached POIs in lookup order, annotated against `position`.
    pub nearby: Vec<NearbyPoi>,
    pub pois_stale: bool,
}

impl TripState {
    pub fn now(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn nearby_poi(&self, id: &PoiId) -> Option<&NearbyPoi> {
        self.nearby.iter().find(|n| &n.poi.id == id)
    }

    /// A POI is passed once it is farther than `threshold_m` and lies behind the heading.
    pub fn has_passed(&self, poi: &Poi, threshold_m: f64) -> bool {
        let distance = self.position.distance_m(&poi.location);
        if distance <= threshold_m {
            return false;
        }
        let bearing = self.position.bearing_to(&poi.location);
        angle_between(self.heading_deg, bearing) > 90.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleVerdict {
    Accepted,
    /// Timestamp older than the last accepted sample.
    Stale,
    /// Implied speed above the plausibility threshold.
    Implausible,
    /// Malformed coordinates, heading or speed.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiRefresh {
    NotNeeded,
    /// Lookup handed off; the result lands through `apply_refresh`.
    Scheduled,
    Refreshed(usize),
    /// Lookup failed; previous POIs were kept and flagged stale.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub verdict: SampleVerdict,
    pub refresh: PoiRefresh,
}

impl UpdateOutcome {
    fn discarded(verdict: SampleVerdict) -> Self {
        Self {
            verdict,
            refresh: PoiRefresh::NotNeeded,
        }
    }

    pub fn accepted(&self) -> bool {
        self.verdict == SampleVerdict::Accepted
    }
}

/// A bounded POI lookup the tracker wants run. Self-contained so it can run off the trip loop.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub area: BoundingBox,
    pub from: Position,
    pub requested_at: DateTime<Utc>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl RefreshRequest {
    pub async fn fetch(&self, lookup: &dyn PoiLookup) -> Result<Vec<Poi>, ServiceError> {
        let area = &self.area;
        let limit = self.timeout;
        retry("poi-lookup", self.retry, move |_| {
            with_timeout("poi-lookup", limit, lookup.lookup(area))
        })
        .await
    }
}

#[derive(Debug, Clone)]
struct TrackerSettings {
    max_speed_mps: f64,
    refresh_distance_m: f64,
    lookup_radius_m: f64,
    cache_ttl: TimeDelta,
    lookup_timeout: Duration,
    retry: RetryPolicy,
}

/// Owns the trip's position state and POI cache. Only this type mutates `TripState`.
#[derive(Debug)]
pub struct TripStateTracker {
    trip_id: TripId,
    state: Option<TripState>,
    cache: PoiCache,
    refreshing: bool,
    settings: TrackerSettings,
}

impl TripStateTracker {
    pub fn new(trip_id: TripId, config: &EngineConfig) -> Self {
        Self {
            trip_id,
            state: None,
            cache: PoiCache::new(),
            refreshing: false,
            settings: TrackerSettings {
                max_speed_mps: config.max_plausible_speed_mps(),
                refresh_distance_m: config.poi_refresh_distance_m,
                lookup_radius_m: config.poi_lookup_radius_m,
                cache_ttl: config.poi_cache_ttl,
                lookup_timeout: config.timeouts.poi_lookup,
                retry: RetryPolicy::single_retry(config.retry_backoff),
            },
        }
    }

    /// None until the first sample is accepted.
    pub fn state(&self) -> Option<&TripState> {
        self.state.as_ref()
    }

    pub fn cache(&self) -> &PoiCache {
        &self.cache
    }

    /// True between a scheduled refresh and its `apply_refresh` or `abandon_refresh`.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Pure check of a sample against the last accepted one.
    pub fn classify(&self, sample: &LocationSample) -> SampleVerdict {
        if !sample.is_well_formed() {
            return SampleVerdict::Invalid;
        }
        let Some(last) = &self.state else {
            return SampleVerdict::Accepted;
        };
        if sample.timestamp < last.timestamp {
            return SampleVerdict::Stale;
        }

        let distance = last.position.distance_m(&sample.position());
        let dt = (sample.timestamp - last.timestamp).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            return if distance > DUPLICATE_TOLERANCE_M {
                SampleVerdict::Implausible
            } else {
                SampleVerdict::Accepted
            };
        }
        if distance / dt > self.settings.max_speed_mps {
            SampleVerdict::Implausible
        } else {
            SampleVerdict::Accepted
        }
    }

    /// Ingest one sample and run any due POI refresh inline.
    pub async fn update(&mut self, sample: LocationSample, lookup: &dyn PoiLookup) -> UpdateOutcome {
        let (mut outcome, request) = self.ingest(sample);
        if let Some(request) = request {
            let result = request.fetch(lookup).await;
            outcome.refresh = self.apply_refresh(&request, result);
        }
        outcome
    }

    /// Apply one sample without touching the network. Stale, implausible and
    /// malformed samples are dropped and the last known good state stays in place.
    /// A due refresh comes back as a request; at most one is outstanding.
    pub fn ingest(&mut self, sample: LocationSample) -> (UpdateOutcome, Option<RefreshRequest>) {
        let verdict = self.classify(&sample);
        if verdict != SampleVerdict::Accepted {
            debug!(trip_id = %self.trip_id, ?verdict, at = %sample.timestamp, "location sample discarded");
            return (UpdateOutcome::discarded(verdict), None);
        }

        let position = sample.position();
        let started_at = self.state.as_ref().map_or(sample.timestamp, |s| s.started_at);
        self.state = Some(TripState {
            position,
            heading_deg: sample.heading_degrees,
            speed_mps: sample.speed_mps,
            timestamp: sample.timestamp,
            started_at,
            elapsed: sample.timestamp - started_at,
            nearby: Vec::new(),
            pois_stale: false,
        });

        let due = !self.refreshing
            && self.cache.needs_refresh(
                &position,
                sample.timestamp,
                self.settings.refresh_distance_m,
                self.settings.cache_ttl,
            );
        let request = due.then(|| {
            self.refreshing = true;
            RefreshRequest {
                area: position.bounding_box(self.settings.lookup_radius_m),
                from: position,
                requested_at: sample.timestamp,
                timeout: self.settings.lookup_timeout,
                retry: self.settings.retry,
            }
        });

        self.annotate_nearby();
        let refresh = if request.is_some() {
            PoiRefresh::Scheduled
        } else {
            PoiRefresh::NotNeeded
        };
        (UpdateOutcome { verdict, refresh }, request)
    }

    /// Land a lookup result. On failure the previous POIs stay, flagged stale.
    pub fn apply_refresh(&mut self, request: &RefreshRequest, result: Result<Vec<Poi>, ServiceError>) -> PoiRefresh {
        self.refreshing = false;
        let refresh = match result {
            Ok(pois) => {
                let count = pois.len();
                self.cache.replace(pois, request.from, request.requested_at);
                info!(trip_id = %self.trip_id, count, "POI cache refreshed");
                PoiRefresh::Refreshed(count)
            }
            Err(e) => {
                warn!(trip_id = %self.trip_id, "POI lookup failed, keeping {} cached POIs: {}", self.cache.len(), e);
                self.cache.mark_failed(request.from, request.requested_at);
                PoiRefresh::Failed
            }
        };
        self.annotate_nearby();
        refresh
    }

    /// The lookup was cancelled before it finished. The next due sample asks again.
    pub fn abandon_refresh(&mut self) {
        self.refreshing = false;
    }

    fn annotate_nearby(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.nearby = self
            .cache
            .pois()
            .iter()
            .map(|poi| NearbyPoi {
                poi: poi.clone(),
                distance_m: state.position.distance_m(&poi.location),
                bearing_deg: state.position.bearing_to(&poi.location),
            })
            .collect();
        state.pois_stale = self.cache.is_stale(state.timestamp, self.settings.cache_ttl);
    }
}
