use serde::{Deserialize, Serialize};

use crate::kernel::cancel::CancelReason;
use crate::kernel::content::{CandidateId, ContentKind, Fidelity};
use crate::kernel::event::DeliveryOutcome;
use crate::kernel::lifecycle::EngineState;
use crate::kernel::pacing::PacingRejection;
use crate::kernel::playback::PriorityTier;
use crate::kernel::trip::SampleVerdict;

// Allowed: IDs, Kinds, Tiers, Counts, Durations
// Forbidden: Text, Audio refs, Positions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    StateTransition {
        from: EngineState,
        to: EngineState,
    },

    Tick {
        kind: TickKind,
    },

    SampleDiscarded {
        verdict: SampleVerdict,
    },

    PoiRefresh {
        ok: bool,
    },

    PacingRejected {
        kind: PacingRejectionKind,
    },

    Dispatched {
        candidate_id: CandidateId,
        kind: ContentKind,
    },

    Delivered {
        kind: ContentKind,
        fidelity: Fidelity,
        latency_ms: u64,
    },

    DispatchCancelled {
        reason: CancelReason,
    },

    Preemption {
        cancelled: PriorityTier,
        by: PriorityTier,
    },

    PlaybackDropped {
        outcome: DeliveryOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickKind {
    /// No location accepted yet.
    NoFix,
    /// A dispatch was still in flight.
    Busy,
    Ineligible,
    NoCandidate,
    Dispatched,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacingRejectionKind {
    Gap,
    HourlyCap,
}

impl From<&PacingRejection> for PacingRejectionKind {
    fn from(rejection: &PacingRejection) -> Self {
        match rejection {
            PacingRejection::GapNotElapsed { .. } => PacingRejectionKind::Gap,      // Remaining time STRIPPED
            PacingRejection::HourlyCapReached { .. } => PacingRejectionKind::HourlyCap,
        }
    }
}
