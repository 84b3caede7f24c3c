use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Position;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiId(pub String);

impl PoiId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    Landmark,
    History,
    Nature,
    Culture,
    Food,
    Lodging,
    Roadside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiMetadata {
    pub name: String,
    /// Short factual seed handed to the text generator.
    #[serde(default)]
    pub description_seed: String,
    /// Partner venue that can be booked (read-only flag, settlement lives elsewhere).
    #[serde(default)]
    pub bookable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: PoiId,
    pub category: PoiCategory,
    pub location: Position,
    pub metadata: PoiMetadata,
}

/// A cached POI annotated relative to the latest accepted position.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPoi {
    pub poi: Poi,
    pub distance_m: f64,
    pub bearing_deg: f64,
}

/// Per-trip POI cache. Refreshed on movement or TTL expiry; a failed refresh
/// keeps the previous set and flags it stale.
#[derive(Debug, Clone, Default)]
pub struct PoiCache {
    entries: Vec<Poi>,
    fetched_at: Option<DateTime<Utc>>,
    // Last lookup attempt, successful or not. Drives the refresh trigger so a
    // failing lookup is not retried on every sample.
    attempted_at: Option<DateTime<Utc>>,
    attempted_from: Option<Position>,
    last_attempt_failed: bool,
}

impl PoiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_refresh(
        &self,
        position: &Position,
        now: DateTime<Utc>,
        refresh_distance_m: f64,
        ttl: TimeDelta,
    ) -> bool {
        match (self.attempted_from, self.attempted_at) {
            (Some(from), Some(at)) => {
                from.distance_m(position) > refresh_distance_m || now - at >= ttl
            }
            _ => true,
        }
    }

    /// Replace contents with a fresh lookup result. Duplicate ids keep their first occurrence.
    pub fn replace(&mut self, pois: Vec<Poi>, from: Position, now: DateTime<Utc>) {
        let mut seen = HashSet::new();
        self.entries = pois
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();
        self.fetched_at = Some(now);
        self.attempted_at = Some(now);
        self.attempted_from = Some(from);
        self.last_attempt_failed = false;
    }

    pub fn mark_failed(&mut self, from: Position, now: DateTime<Utc>) {
        self.attempted_at = Some(now);
        self.attempted_from = Some(from);
        self.last_attempt_failed = true;
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        if self.last_attempt_failed {
            return true;
        }
        match self.fetched_at {
            Some(at) => now - at > ttl,
            None => false,
        }
    }

    pub fn pois(&self) -> &[Poi] {
        &self.entries
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
