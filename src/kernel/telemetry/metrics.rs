use std::collections::VecDeque;

use chrono::TimeDelta;
use serde::Serialize;

use super::event::{PacingRejectionKind, TelemetryEvent, TickKind};
use crate::kernel::content::Fidelity;
use crate::kernel::session::TripId;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub tick_stats: TickStats,
    pub pacing_stats: PacingStats,
    pub delivery_stats: DeliveryStats,
    pub disruption_stats: DisruptionStats,
    pub input_stats: InputStats,
}

#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub total: u64,
    pub no_fix: u64,
    pub busy: u64,
    pub ineligible: u64,
    pub no_candidate: u64,
    pub dispatched: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PacingStats {
    pub gap_rejections: u64,
    pub cap_rejections: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub full: u64,
    pub text_only: u64,
    pub fallback: u64,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DisruptionStats {
    pub cancellations: u64,
    pub preemptions: u64,
    pub dropped_playback: u64,
}

#[derive(Debug, Clone, Default)]
pub struct InputStats {
    pub discarded_samples: u64,
    pub poi_refreshes: u64,
    pub poi_refresh_failures: u64,
}

/// End-of-trip aggregate returned when a session tears down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub trip_id: TripId,
    pub elapsed_secs: i64,
    pub ticks: u64,
    pub deliveries: u64,
    pub degraded: u64,
    pub pacing_rejections: u64,
    pub cancellations: u64,
    pub preemptions: u64,
}

impl TripSummary {
    pub fn from_snapshot(trip_id: TripId, elapsed: TimeDelta, snap: &TelemetrySnapshot) -> Self {
        Self {
            trip_id,
            elapsed_secs: elapsed.num_seconds(),
            ticks: snap.tick_stats.total,
            deliveries: snap.delivery_stats.delivered,
            degraded: snap.delivery_stats.text_only + snap.delivery_stats.fallback,
            pacing_rejections: snap.pacing_stats.gap_rejections + snap.pacing_stats.cap_rejections,
            cancellations: snap.disruption_stats.cancellations,
            preemptions: snap.disruption_stats.preemptions,
        }
    }
}

impl TelemetrySnapshot {
    /// Fold one event into the aggregate.
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Tick { kind } => {
                self.tick_stats.total += 1;
                match kind {
                    TickKind::NoFix => self.tick_stats.no_fix += 1,
                    TickKind::Busy => self.tick_stats.busy += 1,
                    TickKind::Ineligible => self.tick_stats.ineligible += 1,
                    TickKind::NoCandidate => self.tick_stats.no_candidate += 1,
                    TickKind::Dispatched => self.tick_stats.dispatched += 1,
                    TickKind::Ended => {}
                }
            }
            TelemetryEvent::PacingRejected { kind } => match kind {
                PacingRejectionKind::Gap => self.pacing_stats.gap_rejections += 1,
                PacingRejectionKind::HourlyCap => self.pacing_stats.cap_rejections += 1,
            },
            TelemetryEvent::Delivered { fidelity, latency_ms, .. } => {
                let stats = &mut self.delivery_stats;
                stats.delivered += 1;
                stats.total_latency_ms += latency_ms;
                stats.avg_latency_ms = stats.total_latency_ms as f64 / stats.delivered as f64;
                match fidelity {
                    Fidelity::Full => stats.full += 1,
                    Fidelity::TextOnly => stats.text_only += 1,
                    Fidelity::Fallback => stats.fallback += 1,
                }
            }
            TelemetryEvent::DispatchCancelled { .. } => self.disruption_stats.cancellations += 1,
            TelemetryEvent::Preemption { .. } => self.disruption_stats.preemptions += 1,
            TelemetryEvent::PlaybackDropped { .. } => self.disruption_stats.dropped_playback += 1,
            TelemetryEvent::SampleDiscarded { .. } => self.input_stats.discarded_samples += 1,
            TelemetryEvent::PoiRefresh { ok } => {
                self.input_stats.poi_refreshes += 1;
                if !ok {
                    self.input_stats.poi_refresh_failures += 1;
                }
            }
            TelemetryEvent::StateTransition { .. } | TelemetryEvent::Dispatched { .. } => {}
        }
    }
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    for event in events {
        snap.apply(event);
    }
    snap
}
