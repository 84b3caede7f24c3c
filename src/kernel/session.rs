use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::EngineState;
use super::pacing::PacingWindow;
use super::playback::PlaybackQueue;
use super::selector::SelectionHistory;
use super::trip::{TripState, TripStateTracker};
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub Uuid);

impl TripId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything one trip owns. Created at trip start, dropped at trip end,
/// never shared between trips.
#[derive(Debug)]
pub struct OrchestrationSession {
    pub trip_id: TripId,
    pub tracker: TripStateTracker,
    pub pacing_window: PacingWindow,
    pub playback: PlaybackQueue,
    pub history: SelectionHistory,
    pub state: EngineState,
}

impl OrchestrationSession {
    pub fn new(trip_id: TripId, config: &EngineConfig) -> Self {
        Self {
            trip_id,
            tracker: TripStateTracker::new(trip_id, config),
            pacing_window: PacingWindow::new(),
            playback: PlaybackQueue::new(config.pending_max_age),
            history: SelectionHistory::new(),
            state: EngineState::default(),
        }
    }

    pub fn trip_state(&self) -> Option<&TripState> {
        self.tracker.state()
    }

    pub fn is_ended(&self) -> bool {
        self.state == EngineState::TripEnded
    }
}
