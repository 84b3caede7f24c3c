use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::poi::{Poi, PoiId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Story,
    Trivia,
    Fact,
    BookingSuggestion,
    /// POI-less filler chosen when nothing nearby qualifies.
    Ambient,
    /// Pushed by the navigation/safety subsystem, never generated here.
    Alert,
}

impl ContentKind {
    pub fn for_poi(poi: &Poi) -> Self {
        use super::poi::PoiCategory::*;
        match poi.category {
            Food | Lodging if poi.metadata.bookable => ContentKind::BookingSuggestion,
            Landmark | History | Culture => ContentKind::Story,
            Nature => ContentKind::Fact,
            Food | Lodging | Roadside => ContentKind::Trivia,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub Uuid);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Factual seed for the prompt (POI description, or an ambient topic).
    pub prompt_seed: String,
    /// Display name of the subject, if bound to a POI.
    pub subject: Option<String>,
    pub max_words: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentCandidate {
    pub id: CandidateId,
    pub kind: ContentKind,
    pub poi: Option<Poi>,
    pub score: f64,
    pub distance_m: Option<f64>,
    /// Bearing of the POI relative to vehicle heading at selection time (right positive).
    pub relative_bearing_deg: Option<f64>,
    pub params: GenerationParams,
    pub selected_at: DateTime<Utc>,
}

impl ContentCandidate {
    pub fn poi_id(&self) -> Option<&PoiId> {
        self.poi.as_ref().map(|p| &p.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioHandle {
    pub uri: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMetadata {
    pub azimuth_deg: f64,
    #[serde(default)]
    pub distance_m: Option<f64>,
}

/// Result of one remote sub-call within a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    Succeeded,
    Failed,
    TimedOut,
    /// Not attempted because an earlier step already degraded the content.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCallReport {
    pub text: CallOutcome,
    pub speech: CallOutcome,
    pub spatial: CallOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fidelity {
    /// Generated text, synthesized and spatialized.
    Full,
    /// Generated text, no audio (synthesis or spatial step failed).
    TextOnly,
    /// Template text because generation failed; audio may or may not be present.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub id: Uuid,
    pub candidate_id: Option<CandidateId>,
    pub kind: ContentKind,
    pub poi_id: Option<PoiId>,
    pub text: String,
    pub audio: Option<AudioHandle>,
    pub spatial: Option<SpatialMetadata>,
    pub latency: Duration,
    pub calls: SubCallReport,
    pub fallback_text: bool,
}

impl GeneratedContent {
    /// Externally supplied content (navigation or safety alert). Nothing is generated.
    pub fn external(content_ref: &str, text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id: None,
            kind: ContentKind::Alert,
            poi_id: None,
            text: text.unwrap_or_else(|| content_ref.to_string()),
            audio: Some(AudioHandle {
                uri: content_ref.to_string(),
                duration_ms: None,
            }),
            spatial: None,
            latency: Duration::ZERO,
            calls: SubCallReport {
                text: CallOutcome::Skipped,
                speech: CallOutcome::Skipped,
                spatial: CallOutcome::Skipped,
            },
            fallback_text: false,
        }
    }

    pub fn fidelity(&self) -> Fidelity {
        if self.fallback_text {
            Fidelity::Fallback
        } else if self.audio.is_none() {
            Fidelity::TextOnly
        } else {
            Fidelity::Full
        }
    }

    pub fn is_silent(&self) -> bool {
        self.audio.is_none()
    }
}
