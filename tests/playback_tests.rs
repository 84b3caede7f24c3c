use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use wayfarer::kernel::content::GeneratedContent;
use wayfarer::kernel::playback::{PlaybackQueue, PriorityTier, QueueOutcome, SlotState};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn clip(name: &str) -> GeneratedContent {
    GeneratedContent::external(name, None)
}

fn queue() -> PlaybackQueue {
    PlaybackQueue::new(TimeDelta::seconds(120))
}

fn playing_text(q: &PlaybackQueue) -> Option<&str> {
    q.current().map(|s| s.content.text.as_str())
}

#[test]
fn test_idle_queue_starts_immediately() {
    let mut q = queue();
    assert_eq!(q.slot_state(), SlotState::Empty);

    let outcome = q.enqueue(clip("story-1"), PriorityTier::Story, t0());
    assert_eq!(outcome, QueueOutcome::Started { cancelled: None });
    assert_eq!(q.slot_state(), SlotState::Playing);
    assert_eq!(q.current().unwrap().started_at, Some(t0()));
}

#[test]
fn test_higher_tier_preempts_lower() {
    let mut q = queue();
    q.enqueue(clip("story-1"), PriorityTier::Story, t0());

    let outcome = q.preempt(clip("nav-1"), PriorityTier::NavigationAlert, t0());
    match outcome {
        QueueOutcome::Started { cancelled: Some(old) } => {
            assert_eq!(old.state, SlotState::Cancelled);
            assert_eq!(old.content.text, "story-1");
        }
        other => panic!("expected preemption, got {:?}", other),
    }
    assert_eq!(playing_text(&q), Some("nav-1"));

    // The cancelled story is never resumed.
    let done = q.complete(t0() + TimeDelta::seconds(10));
    assert!(!done.started);
    assert_eq!(q.slot_state(), SlotState::Empty);
}

#[test]
fn test_equal_tier_waits_and_supersedes() {
    let mut q = queue();
    q.enqueue(clip("nav-1"), PriorityTier::NavigationAlert, t0());

    let outcome = q.preempt(clip("nav-2"), PriorityTier::NavigationAlert, t0());
    assert_eq!(outcome, QueueOutcome::Pending { superseded: None });
    assert_eq!(playing_text(&q), Some("nav-1"), "equal tier does not interrupt");

    match q.preempt(clip("nav-3"), PriorityTier::NavigationAlert, t0()) {
        QueueOutcome::Pending { superseded: Some(old) } => assert_eq!(old.content.text, "nav-2"),
        other => panic!("expected supersede, got {:?}", other),
    }

    let done = q.complete(t0() + TimeDelta::seconds(5));
    assert!(done.started);
    assert_eq!(done.finished.unwrap().state, SlotState::Completed);
    assert_eq!(playing_text(&q), Some("nav-3"));
}

#[test]
fn test_lower_tier_dropped_behind_higher_pending() {
    let mut q = queue();
    q.enqueue(clip("nav-1"), PriorityTier::NavigationAlert, t0());
    q.preempt(clip("safety-1"), PriorityTier::SafetyNotice, t0());

    let outcome = q.enqueue(clip("story-1"), PriorityTier::Story, t0());
    assert!(matches!(outcome, QueueOutcome::Dropped(ref s) if s.content.text == "story-1"));
    assert_eq!(q.pending().unwrap().content.text, "safety-1");
}

#[test]
fn test_generated_content_never_preempts() {
    let mut q = queue();
    q.enqueue(clip("filler"), PriorityTier::AmbientFiller, t0());

    let outcome = q.enqueue(clip("story-1"), PriorityTier::Story, t0());
    assert_eq!(outcome, QueueOutcome::Pending { superseded: None });
    assert_eq!(playing_text(&q), Some("filler"));
}

#[test]
fn test_stale_pending_discarded() {
    let mut q = queue();
    q.enqueue(clip("story-1"), PriorityTier::Story, t0());
    q.enqueue(clip("story-2"), PriorityTier::Story, t0());

    let done = q.complete(t0() + TimeDelta::seconds(121));
    assert!(!done.started);
    let stale = done.discarded.expect("stale pending discarded");
    assert_eq!(stale.content.text, "story-2");
    assert_eq!(stale.state, SlotState::Cancelled);
    assert!(q.current().is_none());
}

#[test]
fn test_pause_and_clear() {
    let mut q = queue();
    assert!(!q.set_paused(true), "nothing to pause");

    q.enqueue(clip("story-1"), PriorityTier::Story, t0());
    q.enqueue(clip("story-2"), PriorityTier::Story, t0());
    assert!(q.set_paused(true));
    assert!(q.current().unwrap().paused);

    let cleared = q.clear();
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|s| s.state == SlotState::Cancelled));
    assert_eq!(q.slot_state(), SlotState::Empty);
    assert!(q.pending().is_none());
}
