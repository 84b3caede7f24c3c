use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one trip's orchestration loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Checking pacing and selecting a candidate.
    Evaluating,
    /// Pacing gate closed this tick.
    Ineligible,
    /// Nothing cleared the relevance threshold.
    NoCandidate,
    /// Generation in flight. Ticks are skipped until it resolves.
    Dispatching,
    /// Handing generated content to the playback queue.
    Delivering,
    /// Terminal.
    TripEnded,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requests for a transition. The graph decides whether they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    PacingRejected,
    NothingSelected,
    CandidateSelected,
    /// Return to Idle after a tick that produced no action.
    Settle,
    DispatchResolved,
    /// Dispatch was cancelled or its result invalidated.
    DispatchDropped,
    Delivered,
    EndTrip,
}

pub struct LifecycleGraph;

impl LifecycleGraph {
    /// Pure function: (current, trigger) -> next. None means the request is ignored.
    pub fn transition(current: EngineState, trigger: Trigger) -> Option<EngineState> {
        use EngineState::*;
        use Trigger::*;

        match (current, trigger) {
            (TripEnded, _) => None,
            (_, EndTrip) => Some(TripEnded),

            (Idle, Tick) => Some(Evaluating),

            (Evaluating, PacingRejected) => Some(Ineligible),
            (Evaluating, NothingSelected) => Some(NoCandidate),
            (Evaluating, CandidateSelected) => Some(Dispatching),

            (Ineligible, Settle) => Some(Idle),
            (NoCandidate, Settle) => Some(Idle),

            (Dispatching, DispatchResolved) => Some(Delivering),
            (Dispatching, DispatchDropped) => Some(Idle),

            (Delivering, Delivered) => Some(Idle),
            (Delivering, DispatchDropped) => Some(Idle),

            _ => None,
        }
    }
}
