use std::collections::VecDeque;

use chrono::TimeDelta;

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot, TripSummary};
use crate::kernel::session::TripId;

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
    /// Whole-trip aggregate. Never evicted with the buffer.
    totals: TelemetrySnapshot,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
            totals: TelemetrySnapshot::default(),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        self.totals.apply(&event);
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    /// Aggregate over the retained window only.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.buffer)
    }

    /// Aggregate over every event ever recorded.
    pub fn totals(&self) -> &TelemetrySnapshot {
        &self.totals
    }

    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Called once at trip end. Uses the running totals, not the retained window.
    pub fn summarize(&self, trip_id: TripId, elapsed: TimeDelta) -> TripSummary {
        TripSummary::from_snapshot(trip_id, elapsed, &self.totals)
    }
}
