use std::collections::{HashMap, HashSet};

use super::content::{CandidateId, ContentCandidate, ContentKind, GenerationParams};
use super::geo::relative_bearing;
use super::poi::{NearbyPoi, PoiCategory, PoiId};
use super::trip::TripState;
use crate::config::EngineConfig;

/// Topics for POI-less filler, rotated in order.
const AMBIENT_TOPICS: &[&str] = &[
    "the history of the road you are driving on",
    "a little-known fact about the surrounding region",
    "how travellers crossed this landscape a century ago",
    "the local climate and what grows here",
];

/// Tunable scoring weights. Treated as defaults, not invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub distance: f64,
    pub category: f64,
    pub novelty: f64,
    pub categories: HashMap<PoiCategory, f64>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let categories = HashMap::from([
            (PoiCategory::Landmark, 1.0),
            (PoiCategory::History, 0.9),
            (PoiCategory::Culture, 0.8),
            (PoiCategory::Nature, 0.7),
            (PoiCategory::Food, 0.5),
            (PoiCategory::Lodging, 0.4),
            (PoiCategory::Roadside, 0.3),
        ]);
        Self {
            distance: 0.5,
            category: 0.3,
            novelty: 0.2,
            categories,
        }
    }
}

impl ScoringWeights {
    pub fn category_weight(&self, category: PoiCategory) -> f64 {
        self.categories.get(&category).copied().unwrap_or(0.0)
    }
}

/// What has already been delivered this trip.
#[derive(Debug, Clone, Default)]
pub struct SelectionHistory {
    used_pois: HashSet<PoiId>,
    delivered_categories: HashMap<PoiCategory, u32>,
    ambient_count: usize,
}

impl SelectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_used(&self, id: &PoiId) -> bool {
        self.used_pois.contains(id)
    }

    pub fn used_count(&self) -> usize {
        self.used_pois.len()
    }

    pub fn mark_delivered(&mut self, candidate: &ContentCandidate) {
        match &candidate.poi {
            Some(poi) => {
                self.used_pois.insert(poi.id.clone());
                *self.delivered_categories.entry(poi.category).or_insert(0) += 1;
            }
            None => self.ambient_count += 1,
        }
    }

    /// 1.0 for a category never delivered this trip, decaying with each repeat.
    pub fn novelty(&self, category: PoiCategory) -> f64 {
        let repeats = self.delivered_categories.get(&category).copied().unwrap_or(0);
        1.0 / (1.0 + repeats as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoi {
    pub nearby: NearbyPoi,
    pub score: f64,
    /// Position in the trip's POI list; last-resort tie-break.
    pub order: usize,
}

#[derive(Debug, Clone)]
pub struct CandidateSelector {
    radius_m: f64,
    min_relevance: f64,
    ambient_score: f64,
    weights: ScoringWeights,
    /// POIs farther than this and behind the heading are never candidates.
    passed_threshold_m: Option<f64>,
}

impl CandidateSelector {
    pub fn new(radius_m: f64, min_relevance: f64, ambient_score: f64, weights: ScoringWeights) -> Self {
        Self {
            radius_m,
            min_relevance,
            ambient_score,
            weights,
            passed_threshold_m: None,
        }
    }

    pub fn with_passed_threshold(mut self, threshold_m: f64) -> Self {
        self.passed_threshold_m = Some(threshold_m);
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.proximity_radius_m,
            config.min_relevance_score,
            config.ambient_score,
            config.weights.clone(),
        )
        .with_passed_threshold(config.passed_poi_cancel_m)
    }

    fn is_passed(&self, trip: &TripState, nearby: &NearbyPoi) -> bool {
        self.passed_threshold_m
            .is_some_and(|threshold| trip.has_passed(&nearby.poi, threshold))
    }

    pub fn score(&self, nearby: &NearbyPoi, history: &SelectionHistory) -> f64 {
        let w = &self.weights;
        let total = w.distance + w.category + w.novelty;
        if total <= 0.0 {
            return 0.0;
        }
        let closeness = (1.0 - nearby.distance_m / self.radius_m).clamp(0.0, 1.0);
        let raw = w.distance * closeness
            + w.category * w.category_weight(nearby.poi.category)
            + w.novelty * history.novelty(nearby.poi.category);
        raw / total
    }

    /// Unused POIs within the radius and not yet passed, best first. Ties go to the closer POI,
    /// then to the earlier one in the trip's POI list.
    pub fn rank(&self, trip: &TripState, history: &SelectionHistory) -> Vec<ScoredPoi> {
        let mut ranked: Vec<ScoredPoi> = trip
            .nearby
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.distance_m <= self.radius_m && !history.is_used(&n.poi.id) && !self.is_passed(trip, n)
            })
            .map(|(order, n)| ScoredPoi {
                score: self.score(n, history),
                nearby: n.clone(),
                order,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.nearby.distance_m.total_cmp(&b.nearby.distance_m))
                .then_with(|| a.order.cmp(&b.order))
        });
        ranked
    }

    pub fn select(&self, trip: &TripState, history: &SelectionHistory) -> Option<ContentCandidate> {
        let best = self
            .rank(trip, history)
            .into_iter()
            .find(|s| s.score >= self.min_relevance);

        if let Some(best) = best {
            return Some(self.poi_candidate(trip, best));
        }

        if self.ambient_score >= self.min_relevance {
            return Some(self.ambient_candidate(trip, history));
        }
        None
    }

    fn poi_candidate(&self, trip: &TripState, scored: ScoredPoi) -> ContentCandidate {
        let ScoredPoi { nearby, score, .. } = scored;
        let kind = ContentKind::for_poi(&nearby.poi);
        let seed = if nearby.poi.metadata.description_seed.is_empty() {
            nearby.poi.metadata.name.clone()
        } else {
            nearby.poi.metadata.description_seed.clone()
        };
        ContentCandidate {
            id: CandidateId::new(),
            kind,
            score,
            distance_m: Some(nearby.distance_m),
            relative_bearing_deg: Some(relative_bearing(trip.heading_deg, nearby.bearing_deg)),
            params: GenerationParams {
                prompt_seed: seed,
                subject: Some(nearby.poi.metadata.name.clone()),
                max_words: max_words_for(kind),
            },
            poi: Some(nearby.poi),
            selected_at: trip.now(),
        }
    }

    fn ambient_candidate(&self, trip: &TripState, history: &SelectionHistory) -> ContentCandidate {
        let topic = AMBIENT_TOPICS[history.ambient_count % AMBIENT_TOPICS.len()];
        ContentCandidate {
            id: CandidateId::new(),
            kind: ContentKind::Ambient,
            poi: None,
            score: self.ambient_score,
            distance_m: None,
            relative_bearing_deg: None,
            params: GenerationParams {
                prompt_seed: topic.to_string(),
                subject: None,
                max_words: max_words_for(ContentKind::Ambient),
            },
            selected_at: trip.now(),
        }
    }
}

fn max_words_for(kind: ContentKind) -> u32 {
    match kind {
        ContentKind::Story => 180,
        ContentKind::BookingSuggestion => 60,
        ContentKind::Ambient => 90,
        _ => 80,
    }
}
