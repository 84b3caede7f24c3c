use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::content::ContentKind;
use super::trip::TripState;
use crate::config::EngineConfig;

/// Length of the trailing window the hourly cap applies to, in seconds.
pub const PACING_HORIZON_SECS: i64 = 3600;

pub fn pacing_horizon() -> TimeDelta {
    TimeDelta::seconds(PACING_HORIZON_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub at: DateTime<Utc>,
    pub kind: ContentKind,
}

/// Rolling record of deliveries within the trailing hour.
#[derive(Debug, Clone, Default)]
pub struct PacingWindow {
    entries: VecDeque<Delivery>,
    last_delivery: Option<DateTime<Utc>>,
}

impl PacingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_delivery(&self) -> Option<DateTime<Utc>> {
        self.last_delivery
    }

    pub fn entries(&self) -> impl Iterator<Item = &Delivery> {
        self.entries.iter()
    }

    /// Deliveries in `(now - 1h, now]`.
    pub fn count_within_horizon(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|d| d.at <= now && now - d.at < pacing_horizon())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingRejection {
    GapNotElapsed { remaining: TimeDelta },
    HourlyCapReached { count: usize },
}

/// Hard gate on delivery frequency. Pure over the window it is given.
#[derive(Debug, Clone, Copy)]
pub struct PacingController {
    min_gap: TimeDelta,
    max_per_hour: u32,
}

impl PacingController {
    pub fn new(min_gap: TimeDelta, max_per_hour: u32) -> Self {
        Self { min_gap, max_per_hour }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.min_story_gap, config.max_stories_per_hour)
    }

    pub fn min_gap(&self) -> TimeDelta {
        self.min_gap
    }

    pub fn max_per_hour(&self) -> u32 {
        self.max_per_hour
    }

    /// Eligibility as of the trip's latest accepted sample.
    pub fn is_eligible(&self, trip: &TripState, window: &PacingWindow) -> bool {
        self.check(trip.now(), window).is_ok()
    }

    pub fn check(&self, now: DateTime<Utc>, window: &PacingWindow) -> Result<(), PacingRejection> {
        if let Some(last) = window.last_delivery() {
            let since = now - last;
            if since < self.min_gap {
                return Err(PacingRejection::GapNotElapsed {
                    remaining: self.min_gap - since,
                });
            }
        }
        let count = window.count_within_horizon(now);
        if count >= self.max_per_hour as usize {
            return Err(PacingRejection::HourlyCapReached { count });
        }
        Ok(())
    }

    /// Append a delivery and evict entries that fell out of the trailing hour.
    pub fn record(&self, window: &mut PacingWindow, delivery: Delivery) {
        window.entries.push_back(delivery);
        window.last_delivery = Some(match window.last_delivery {
            Some(prev) if prev > delivery.at => prev,
            _ => delivery.at,
        });
        while let Some(front) = window.entries.front() {
            if delivery.at - front.at >= pacing_horizon() {
                window.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
