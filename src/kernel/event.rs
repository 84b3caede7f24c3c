use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::ContentKind;
use super::lifecycle::EngineState;
use super::playback::PriorityTier;
use super::poi::PoiId;
use super::session::TripId;
use super::trip::LocationSample;

/// Inbound signals for one trip loop.
#[derive(Debug, Clone)]
pub enum Event {
    Location(LocationSample),
    /// Navigation/safety content that skips evaluation entirely.
    Preemption(PreemptionEvent),
    /// The audio output finished the active slot.
    PlaybackFinished,
    Pause,
    Resume,
    EndTrip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreemptionEvent {
    pub priority_tier: PriorityTier,
    pub content_ref: String,
    /// Optional display text; defaults to the reference.
    #[serde(default)]
    pub text: Option<String>,
}

impl PreemptionEvent {
    pub fn new(priority_tier: PriorityTier, content_ref: impl Into<String>) -> Self {
        Self {
            priority_tier,
            content_ref: content_ref.into(),
            text: None,
        }
    }
}

/// Emitted on every state machine transition, for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub trip_id: TripId,
    pub from: EngineState,
    pub to: EngineState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    DeliveredTextOnly,
    DeliveredFallback,
    /// Replaced while pending, or too old to play once the slot freed.
    Superseded,
    /// Cut off by higher-priority content.
    Preempted,
    /// Dispatch aborted before delivery (candidate invalidated or trip ended).
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLogEntry {
    pub trip_id: TripId,
    pub timestamp: DateTime<Utc>,
    pub content_type: ContentKind,
    pub poi_id: Option<PoiId>,
    pub outcome: DeliveryOutcome,
}
