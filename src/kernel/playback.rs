use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::content::GeneratedContent;

/// Playback priority. Declaration order is rank order (last is highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    AmbientFiller,
    Story,
    SafetyNotice,
    NavigationAlert,
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ambient" | "filler" | "ambient_filler" => Ok(PriorityTier::AmbientFiller),
            "story" | "trivia" => Ok(PriorityTier::Story),
            "safety" | "safety_notice" => Ok(PriorityTier::SafetyNotice),
            "navigation" | "navigation_alert" => Ok(PriorityTier::NavigationAlert),
            other => Err(format!("unknown priority tier: {other}")),
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriorityTier::AmbientFiller => "ambient_filler",
            PriorityTier::Story => "story",
            PriorityTier::SafetyNotice => "safety_notice",
            PriorityTier::NavigationAlert => "navigation_alert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Empty,
    Queued,
    Playing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSlot {
    pub content: GeneratedContent,
    pub tier: PriorityTier,
    pub state: SlotState,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused: bool,
}

impl PlaybackSlot {
    fn queued(content: GeneratedContent, tier: PriorityTier, now: DateTime<Utc>) -> Self {
        Self {
            content,
            tier,
            state: SlotState::Queued,
            queued_at: now,
            started_at: None,
            paused: false,
        }
    }

    fn start(&mut self, now: DateTime<Utc>) {
        self.state = SlotState::Playing;
        self.started_at = Some(now);
        self.paused = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueOutcome {
    /// The arrival is now playing. `cancelled` is the slot it preempted, if any.
    Started { cancelled: Option<PlaybackSlot> },
    /// Waiting behind the active slot. `superseded` is the pending item it replaced.
    Pending { superseded: Option<PlaybackSlot> },
    /// A higher-tier item is already pending; the arrival was discarded.
    Dropped(PlaybackSlot),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub finished: Option<PlaybackSlot>,
    /// Pending item that was too old to play once the slot freed.
    pub discarded: Option<PlaybackSlot>,
    pub started: bool,
}

/// One playing slot and at most one pending item.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    active: Option<PlaybackSlot>,
    pending: Option<PlaybackSlot>,
    max_pending_age: TimeDelta,
}

impl PlaybackQueue {
    pub fn new(max_pending_age: TimeDelta) -> Self {
        Self {
            active: None,
            pending: None,
            max_pending_age,
        }
    }

    pub fn current(&self) -> Option<&PlaybackSlot> {
        self.active.as_ref()
    }

    pub fn pending(&self) -> Option<&PlaybackSlot> {
        self.pending.as_ref()
    }

    pub fn slot_state(&self) -> SlotState {
        self.active.as_ref().map_or(SlotState::Empty, |s| s.state)
    }

    /// Play now if idle, otherwise wait behind the active slot. Never preempts.
    pub fn enqueue(&mut self, content: GeneratedContent, tier: PriorityTier, now: DateTime<Utc>) -> QueueOutcome {
        let mut slot = PlaybackSlot::queued(content, tier, now);
        if self.active.is_none() {
            slot.start(now);
            self.active = Some(slot);
            return QueueOutcome::Started { cancelled: None };
        }

        match self.pending.take() {
            Some(existing) if existing.tier > slot.tier => {
                self.pending = Some(existing);
                slot.state = SlotState::Cancelled;
                QueueOutcome::Dropped(slot)
            }
            superseded => {
                self.pending = Some(slot);
                QueueOutcome::Pending {
                    superseded: superseded.map(|mut s| {
                        s.state = SlotState::Cancelled;
                        s
                    }),
                }
            }
        }
    }

    /// Replace the active slot if `tier` is strictly higher; otherwise behave like `enqueue`.
    /// The replaced slot is cancelled, never resumed.
    pub fn preempt(&mut self, content: GeneratedContent, tier: PriorityTier, now: DateTime<Utc>) -> QueueOutcome {
        let outranks = self.active.as_ref().is_some_and(|active| tier > active.tier);
        if !outranks {
            return self.enqueue(content, tier, now);
        }

        let mut slot = PlaybackSlot::queued(content, tier, now);
        slot.start(now);
        let cancelled = self.active.replace(slot).map(|mut old| {
            old.state = SlotState::Cancelled;
            old
        });
        QueueOutcome::Started { cancelled }
    }

    /// Active slot finished naturally. Promotes the pending item unless it went stale.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Completion {
        let finished = self.active.take().map(|mut s| {
            s.state = SlotState::Completed;
            s
        });

        let mut completion = Completion {
            finished,
            ..Completion::default()
        };

        if let Some(mut next) = self.pending.take() {
            if now - next.queued_at > self.max_pending_age {
                next.state = SlotState::Cancelled;
                completion.discarded = Some(next);
            } else {
                next.start(now);
                self.active = Some(next);
                completion.started = true;
            }
        }
        completion
    }

    /// Returns false when nothing is playing.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        match self.active.as_mut() {
            Some(slot) => {
                slot.paused = paused;
                true
            }
            None => false,
        }
    }

    /// Cancel everything (trip end). Returns the cancelled slots, active first.
    pub fn clear(&mut self) -> Vec<PlaybackSlot> {
        [self.active.take(), self.pending.take()]
            .into_iter()
            .flatten()
            .map(|mut s| {
                s.state = SlotState::Cancelled;
                s
            })
            .collect()
    }
}
