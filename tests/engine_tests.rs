use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tokio::sync::mpsc;
use wayfarer::config::EngineConfig;
use wayfarer::error::EngineError;
use wayfarer::kernel::content::ContentKind;
use wayfarer::kernel::event::{DeliveryLogEntry, DeliveryOutcome, Event, PreemptionEvent};
use wayfarer::kernel::geo::Position;
use wayfarer::kernel::lifecycle::EngineState;
use wayfarer::kernel::pacing::PacingRejection;
use wayfarer::kernel::playback::{PriorityTier, QueueOutcome};
use wayfarer::kernel::poi::{Poi, PoiCategory, PoiId, PoiMetadata};
use wayfarer::kernel::time::ManualClock;
use wayfarer::kernel::trip::LocationSample;
use wayfarer::services::mock::{
    MockPoiLookup, MockSpatialRenderer, MockSpeechSynthesizer, MockTextGenerator, PlaybackCommand,
    RecordingPlaybackSink,
};
use wayfarer::services::store::MemoryDeliveryLog;
use wayfarer::{Collaborators, OrchestrationEngine, TickOutcome, TripLoop};

const METERS_PER_MINUTE: f64 = 1000.0;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn minute(m: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(m)
}

fn origin() -> Position {
    Position::new(45.0, 7.0)
}

/// Vehicle drives east at 1 km per minute.
fn position_at(m: f64) -> Position {
    origin().offset(90.0, m * METERS_PER_MINUTE)
}

fn sample(m: i64) -> LocationSample {
    let here = position_at(m as f64);
    LocationSample {
        lat: here.lat,
        lon: here.lon,
        heading_degrees: 90.0,
        speed_mps: METERS_PER_MINUTE / 60.0,
        timestamp: minute(m),
    }
}

/// POI 100 m north of where the vehicle will be at minute `m`.
fn roadside_poi(m: i64) -> Poi {
    Poi {
        id: PoiId::new(format!("poi-{m}")),
        category: PoiCategory::Landmark,
        location: position_at(m as f64).offset(0.0, 100.0),
        metadata: PoiMetadata {
            name: format!("Landmark {m}"),
            description_seed: format!("the landmark at kilometer {m}"),
            bookable: false,
        },
    }
}

/// Each POI is within the candidate radius for exactly one tick.
fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.proximity_radius_m = 600.0;
    config.poi_refresh_distance_m = 500.0;
    config.ambient_score = 0.1;
    config.retry_backoff = Duration::from_millis(1);
    config.timeouts.generation = Duration::from_millis(50);
    config.timeouts.synthesis = Duration::from_millis(50);
    config.timeouts.spatial = Duration::from_millis(50);
    config.timeouts.poi_lookup = Duration::from_millis(50);
    config
}

struct Harness {
    engine: OrchestrationEngine,
    sink: Arc<RecordingPlaybackSink>,
    log: Arc<MemoryDeliveryLog>,
}

impl Harness {
    fn new(config: EngineConfig, text: MockTextGenerator, pois: Vec<Poi>) -> Self {
        Self::with_lookup(config, text, MockPoiLookup::with_pois(pois))
    }

    fn with_lookup(config: EngineConfig, text: MockTextGenerator, lookup: MockPoiLookup) -> Self {
        let sink = Arc::new(RecordingPlaybackSink::new());
        let log = Arc::new(MemoryDeliveryLog::new());
        let collaborators = Collaborators {
            text: Arc::new(text),
            speech: Arc::new(MockSpeechSynthesizer::default()),
            spatial: Arc::new(MockSpatialRenderer::default()),
            poi: Arc::new(lookup),
            sink: sink.clone(),
            delivery_log: log.clone(),
        };
        let engine = OrchestrationEngine::start(config, collaborators).expect("valid config");
        Self { engine, sink, log }
    }

    /// Location sample at minute `m`, with any POI refresh it started applied.
    async fn locate(&mut self, m: i64) {
        self.engine.on_location(sample(m)).await.expect("trip active");
        self.engine.settle_poi_refresh().await;
    }

    /// Location sample, tick, and (if dispatched) settle, all at minute `m`.
    async fn step(&mut self, m: i64) -> TickOutcome {
        self.locate(m).await;
        let outcome = self.engine.on_tick(minute(m)).await;
        if let TickOutcome::Dispatched(_) = outcome {
            self.engine.settle_dispatch(minute(m)).await;
            self.engine.on_playback_finished(minute(m)).await;
        }
        outcome
    }

    fn delivered(&self) -> Vec<DeliveryLogEntry> {
        self.log
            .entries()
            .into_iter()
            .filter(|e| {
                matches!(
                    e.outcome,
                    DeliveryOutcome::Delivered | DeliveryOutcome::DeliveredTextOnly | DeliveryOutcome::DeliveredFallback
                )
            })
            .collect()
    }
}

fn assert_pacing_invariants(entries: &[DeliveryLogEntry], min_gap: TimeDelta, max_per_hour: usize) {
    for pair in entries.windows(2) {
        assert!(
            pair[1].timestamp - pair[0].timestamp >= min_gap,
            "gap violated: {} -> {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
    for end in entries {
        let in_hour = entries
            .iter()
            .filter(|e| e.timestamp <= end.timestamp && end.timestamp - e.timestamp < TimeDelta::hours(1))
            .count();
        assert!(in_hour <= max_per_hour, "{} deliveries in the hour ending {}", in_hour, end.timestamp);
    }
}

#[tokio::test]
async fn test_invalid_config_never_starts() {
    let mut config = EngineConfig::default();
    config.max_stories_per_hour = 0;
    let result = OrchestrationEngine::start(
        config,
        Collaborators {
            text: Arc::new(MockTextGenerator::default()),
            speech: Arc::new(MockSpeechSynthesizer::default()),
            spatial: Arc::new(MockSpatialRenderer::default()),
            poi: Arc::new(MockPoiLookup::default()),
            sink: Arc::new(RecordingPlaybackSink::new()),
            delivery_log: Arc::new(MemoryDeliveryLog::new()),
        },
    );
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[tokio::test]
async fn test_tick_without_fix() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![]);
    assert_eq!(h.engine.on_tick(t0()).await, TickOutcome::NoFix);
    assert_eq!(h.engine.state(), EngineState::Idle);
}

#[tokio::test]
async fn test_seventy_minute_scenario() {
    let poi_minutes = [0, 12, 25, 40, 55, 68];
    let pois = poi_minutes.iter().map(|&m| roadside_poi(m)).collect();
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), pois);

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for m in 0..70 {
        match h.step(m).await {
            TickOutcome::Dispatched(_) => accepted.push(m),
            TickOutcome::Ineligible(rejection) if poi_minutes.contains(&m) => {
                assert_eq!(rejection, PacingRejection::HourlyCapReached { count: 4 });
                rejected.push(m);
            }
            _ => {}
        }
        assert_eq!(h.engine.state(), EngineState::Idle, "settled after minute {}", m);
    }

    assert_eq!(accepted, vec![0, 12, 25, 40, 68]);
    assert_eq!(rejected, vec![55]);

    let delivered = h.delivered();
    let minutes: Vec<i64> = delivered.iter().map(|e| (e.timestamp - t0()).num_minutes()).collect();
    assert_eq!(minutes, accepted);
    assert!(delivered.iter().all(|e| e.outcome == DeliveryOutcome::Delivered));
    assert!(delivered.iter().all(|e| e.trip_id == h.engine.trip_id()));
    assert_pacing_invariants(&delivered, TimeDelta::minutes(10), 4);

    let snapshot = h.engine.telemetry().snapshot();
    assert_eq!(snapshot.delivery_stats.delivered, 5);
    assert_eq!(snapshot.tick_stats.total, 70);
}

#[tokio::test]
async fn test_always_failing_generation_over_long_trip() {
    // POI every 5 km for three hours, ambient filler on.
    let pois = (0..180).step_by(5).map(roadside_poi).collect();
    let mut config = test_config();
    config.ambient_score = EngineConfig::default().ambient_score;
    let mut h = Harness::new(config, MockTextGenerator::failing(), pois);

    let mut outcomes = 0;
    for m in 0..180 {
        let outcome = h.step(m).await;
        assert_ne!(outcome, TickOutcome::Busy, "dispatch settled every minute");
        outcomes += 1;
    }
    assert_eq!(outcomes, 180, "every tick produced an outcome");

    let delivered = h.delivered();
    assert!(delivered.len() >= 9, "kept delivering through the outage, got {}", delivered.len());
    assert!(
        delivered.iter().all(|e| e.outcome == DeliveryOutcome::DeliveredFallback),
        "all deliveries degraded to the template"
    );
    assert_pacing_invariants(&delivered, TimeDelta::minutes(10), 4);

    let mut seen = HashSet::new();
    for poi in delivered.iter().filter_map(|e| e.poi_id.as_ref()) {
        assert!(seen.insert(poi.clone()), "{} delivered twice", poi);
    }

    let summary = h.engine.end_trip(minute(180)).await.expect("end once");
    assert_eq!(summary.deliveries as usize, delivered.len());
    assert_eq!(summary.degraded, summary.deliveries);
}

#[tokio::test]
async fn test_preemption_cancels_lower_tier_immediately() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);

    h.locate(0).await;
    assert!(matches!(h.engine.on_tick(minute(0)).await, TickOutcome::Dispatched(_)));
    assert_eq!(h.engine.settle_dispatch(minute(0)).await, Some(DeliveryOutcome::Delivered));
    assert_eq!(h.engine.playback().current().unwrap().tier, PriorityTier::Story);

    let mut nav = PreemptionEvent::new(PriorityTier::NavigationAlert, "nav://turn-left");
    nav.text = Some("Turn left in 300 meters".to_string());
    let outcome = h.engine.on_preemption(nav, minute(1)).await.unwrap();
    assert!(matches!(outcome, QueueOutcome::Started { cancelled: Some(ref s) } if s.tier == PriorityTier::Story));

    let playing = h.engine.playback().current().unwrap();
    assert_eq!(playing.tier, PriorityTier::NavigationAlert);
    assert_eq!(playing.content.kind, ContentKind::Alert);

    let commands = h.sink.commands();
    assert!(matches!(commands.as_slice(), [
        PlaybackCommand::Play { tier: PriorityTier::Story, .. },
        PlaybackCommand::Stop,
        PlaybackCommand::Play { tier: PriorityTier::NavigationAlert, .. },
    ]), "got {:?}", commands);

    let preempted: Vec<_> = h
        .log
        .entries()
        .into_iter()
        .filter(|e| e.outcome == DeliveryOutcome::Preempted)
        .collect();
    assert_eq!(preempted.len(), 1);
    assert_eq!(preempted[0].poi_id, Some(PoiId::new("poi-0")));

    // Same tier waits, then plays next.
    let again = PreemptionEvent::new(PriorityTier::NavigationAlert, "nav://keep-right");
    let outcome = h.engine.on_preemption(again, minute(1)).await.unwrap();
    assert_eq!(outcome, QueueOutcome::Pending { superseded: None });

    let done = h.engine.on_playback_finished(minute(2)).await;
    assert!(done.started);
    assert_eq!(h.engine.playback().current().unwrap().content.text, "nav://keep-right");
    assert_eq!(h.sink.played().len(), 3);
    assert_eq!(h.engine.telemetry().snapshot().disruption_stats.preemptions, 1);
}

#[tokio::test]
async fn test_end_trip_cancels_in_flight_generation() {
    let mut config = test_config();
    config.timeouts.generation = Duration::from_secs(30);
    let mut h = Harness::new(config, MockTextGenerator::hanging(), vec![roadside_poi(0)]);

    h.locate(0).await;
    assert!(matches!(h.engine.on_tick(minute(0)).await, TickOutcome::Dispatched(_)));
    assert_eq!(h.engine.state(), EngineState::Dispatching);
    assert_eq!(h.engine.on_tick(minute(1)).await, TickOutcome::Busy);

    let summary = h.engine.end_trip(minute(2)).await.expect("first end");
    assert_eq!(h.engine.state(), EngineState::TripEnded);
    assert!(h.engine.in_flight().is_none());
    assert_eq!(summary.deliveries, 0);
    assert_eq!(summary.cancellations, 1);

    let log = h.log.entries();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].outcome, DeliveryOutcome::Cancelled);

    // Terminal.
    assert_eq!(h.engine.on_tick(minute(3)).await, TickOutcome::Ended);
    assert!(matches!(h.engine.on_location(sample(3)).await, Err(EngineError::TripEnded(_))));
    assert!(h.engine.end_trip(minute(4)).await.is_err());
}

#[tokio::test]
async fn test_passing_the_poi_cancels_dispatch() {
    let mut config = test_config();
    config.timeouts.generation = Duration::from_secs(30);
    let mut h = Harness::new(config, MockTextGenerator::hanging(), vec![roadside_poi(0)]);

    h.locate(0).await;
    assert!(matches!(h.engine.on_tick(minute(0)).await, TickOutcome::Dispatched(_)));

    // Two kilometres on, the POI is well behind.
    h.locate(2).await;
    assert_eq!(h.engine.settle_dispatch(minute(2)).await, Some(DeliveryOutcome::Cancelled));
    assert_eq!(h.engine.state(), EngineState::Idle);
    assert!(h.sink.played().is_empty(), "nothing partial reaches the sink");

    let log = h.log.entries();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].outcome, DeliveryOutcome::Cancelled);
    assert_eq!(log[0].poi_id, Some(PoiId::new("poi-0")));
    assert!(h.engine.pacing_window().last_delivery().is_none(), "cancelled work does not count");
}

#[tokio::test]
async fn test_status_event_on_every_transition() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);
    let mut status = h.engine.subscribe();

    h.step(0).await;
    h.step(1).await;

    let mut transitions = Vec::new();
    while let Ok(event) = status.try_recv() {
        assert_eq!(event.trip_id, h.engine.trip_id());
        transitions.push((event.from, event.to));
    }

    use EngineState::*;
    assert_eq!(
        transitions,
        vec![
            (Idle, Evaluating),
            (Evaluating, Dispatching),
            (Dispatching, Delivering),
            (Delivering, Idle),
            (Idle, Evaluating),
            (Evaluating, Ineligible),
            (Ineligible, Idle),
        ]
    );
}

#[tokio::test]
async fn test_pause_and_resume_forward_to_sink() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);
    assert!(!h.engine.pause().await, "nothing playing yet");

    h.locate(0).await;
    h.engine.on_tick(minute(0)).await;
    h.engine.settle_dispatch(minute(0)).await;

    assert!(h.engine.pause().await);
    assert!(h.engine.playback().current().unwrap().paused);
    assert!(h.engine.resume().await);

    let commands = h.sink.commands();
    assert_eq!(&commands[1..], &[PlaybackCommand::Pause, PlaybackCommand::Resume]);
}

#[tokio::test]
async fn test_trip_loop_runs_until_end() {
    let mut config = test_config();
    config.story_check_interval = Duration::from_millis(10);
    let h = Harness::new(config, MockTextGenerator::default(), vec![roadside_poi(0)]);
    let trip_id = h.engine.trip_id();

    let clock = Arc::new(ManualClock::new(t0()));
    let (tx, rx) = mpsc::channel(16);
    let trip = tokio::spawn(TripLoop::new(h.engine, rx, clock.clone()).run());

    tx.send(Event::Location(sample(0))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(Event::EndTrip).await.unwrap();

    let summary = trip.await.expect("loop exits cleanly");
    assert_eq!(summary.trip_id, trip_id);
    assert_eq!(summary.deliveries, 1, "frozen clock keeps the gap closed after one delivery");
    assert!(summary.ticks > 1);
    assert!(summary.pacing_rejections >= 1);
    assert_eq!(h.sink.played().len(), 1);
}

fn poi_at(id: &str, category: PoiCategory, location: Position) -> Poi {
    Poi {
        id: PoiId::new(id),
        category,
        location,
        metadata: PoiMetadata {
            name: id.to_string(),
            description_seed: format!("facts about {id}"),
            bookable: false,
        },
    }
}

fn nav_alert(content_ref: &str) -> PreemptionEvent {
    let mut nav = PreemptionEvent::new(PriorityTier::NavigationAlert, content_ref);
    nav.text = Some("Take the next exit".to_string());
    nav
}

#[tokio::test]
async fn test_poi_behind_is_skipped_for_one_ahead() {
    let mut config = test_config();
    config.proximity_radius_m = 2000.0;
    let here = position_at(0.0);
    let pois = vec![
        poi_at("behind", PoiCategory::Landmark, here.offset(270.0, 700.0)),
        poi_at("ahead", PoiCategory::Roadside, here.offset(90.0, 1500.0)),
    ];
    let mut h = Harness::new(config, MockTextGenerator::default(), pois);

    h.locate(0).await;
    for _ in 0..3 {
        // The higher-scoring landmark is behind the car: it must never be dispatched.
        let outcome = h.engine.on_tick(minute(0)).await;
        if let TickOutcome::Dispatched(_) = outcome {
            assert_eq!(h.engine.in_flight().and_then(|c| c.poi_id()), Some(&PoiId::new("ahead")));
            assert_eq!(h.engine.settle_dispatch(minute(0)).await, Some(DeliveryOutcome::Delivered));
        }
    }

    let log = h.log.entries();
    assert_eq!(log.len(), 1, "one delivery, no cancelled dispatches: {:?}", log);
    assert_eq!(log[0].poi_id, Some(PoiId::new("ahead")));
    assert_eq!(h.sink.played(), vec![(ContentKind::Trivia, PriorityTier::Story)]);

    // Gap elapsed, car parked: the landmark behind is still not a candidate.
    assert_eq!(h.engine.on_tick(minute(10)).await, TickOutcome::NoCandidate);
}

#[tokio::test]
async fn test_summary_exact_after_telemetry_wraps() {
    // Parked car, ambient filler on, a tick every 15 s for 12 hours.
    let mut config = test_config();
    config.ambient_score = EngineConfig::default().ambient_score;
    let mut h = Harness::new(config, MockTextGenerator::default(), vec![]);
    h.locate(0).await;

    let ticks = 12 * 60 * 4;
    for i in 0..ticks {
        let now = t0() + TimeDelta::seconds(15 * i);
        if let TickOutcome::Dispatched(_) = h.engine.on_tick(now).await {
            h.engine.settle_dispatch(now).await;
            h.engine.on_playback_finished(now).await;
        }
    }
    assert_eq!(h.engine.telemetry().len(), 10_000, "ring buffer wrapped");

    let delivered = h.delivered();
    assert_eq!(delivered.len(), 48, "four per hour for twelve hours");

    let summary = h.engine.end_trip(t0() + TimeDelta::hours(12)).await.expect("end once");
    assert_eq!(summary.ticks, ticks as u64);
    assert_eq!(summary.deliveries, 48);
    assert_eq!(summary.pacing_rejections, ticks as u64 - 48);
}

#[tokio::test]
async fn test_generated_content_waits_behind_alert() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);

    // 1. Story dispatched, alert starts playing while it generates.
    h.locate(0).await;
    assert!(matches!(h.engine.on_tick(minute(0)).await, TickOutcome::Dispatched(_)));
    let outcome = h.engine.on_preemption(nav_alert("nav://exit"), minute(0)).await.unwrap();
    assert_eq!(outcome, QueueOutcome::Started { cancelled: None });

    // 2. Story resolves behind the alert: counted and logged, not yet played.
    assert_eq!(h.engine.settle_dispatch(minute(0)).await, Some(DeliveryOutcome::Delivered));
    assert_eq!(h.engine.state(), EngineState::Idle);
    assert_eq!(h.engine.playback().current().unwrap().tier, PriorityTier::NavigationAlert);
    assert_eq!(h.engine.playback().pending().unwrap().tier, PriorityTier::Story);
    assert_eq!(h.engine.pacing_window().last_delivery(), Some(minute(0)));
    assert_eq!(h.sink.played().len(), 1);

    // 3. Alert finishes; the story plays next.
    let done = h.engine.on_playback_finished(minute(1)).await;
    assert!(done.started);
    assert_eq!(
        h.sink.played(),
        vec![
            (ContentKind::Alert, PriorityTier::NavigationAlert),
            (ContentKind::Story, PriorityTier::Story),
        ]
    );
    let outcomes: Vec<_> = h.log.entries().into_iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered]);
}

#[tokio::test]
async fn test_pending_story_discarded_when_stale() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);

    h.locate(0).await;
    h.engine.on_tick(minute(0)).await;
    h.engine.on_preemption(nav_alert("nav://long-detour"), minute(0)).await.unwrap();
    assert_eq!(h.engine.settle_dispatch(minute(0)).await, Some(DeliveryOutcome::Delivered));

    // The alert outlasts the pending age limit.
    let done = h.engine.on_playback_finished(minute(3)).await;
    assert!(!done.started);
    assert!(done.discarded.is_some());
    assert!(h.engine.playback().current().is_none());
    assert_eq!(h.sink.played(), vec![(ContentKind::Alert, PriorityTier::NavigationAlert)]);

    let log = h.log.entries();
    let outcomes: Vec<_> = log.iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![DeliveryOutcome::Delivered, DeliveryOutcome::Superseded]);
    assert_eq!(log[1].poi_id, Some(PoiId::new("poi-0")));
}

#[tokio::test]
async fn test_story_dropped_behind_pending_safety_notice() {
    let mut h = Harness::new(test_config(), MockTextGenerator::default(), vec![roadside_poi(0)]);

    h.locate(0).await;
    h.engine.on_tick(minute(0)).await;
    h.engine.on_preemption(nav_alert("nav://merge"), minute(0)).await.unwrap();
    let safety = PreemptionEvent::new(PriorityTier::SafetyNotice, "safety://ice-ahead");
    let outcome = h.engine.on_preemption(safety, minute(0)).await.unwrap();
    assert_eq!(outcome, QueueOutcome::Pending { superseded: None });

    // A strictly higher tier already waits: the story never enters the queue.
    assert_eq!(h.engine.settle_dispatch(minute(0)).await, Some(DeliveryOutcome::Superseded));
    assert_eq!(h.engine.state(), EngineState::Idle);
    assert_eq!(h.engine.playback().pending().unwrap().tier, PriorityTier::SafetyNotice);
    assert!(h.engine.pacing_window().last_delivery().is_none(), "dropped content does not count");

    let log = h.log.entries();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].outcome, DeliveryOutcome::Superseded);
    assert_eq!(log[0].poi_id, Some(PoiId::new("poi-0")));
    assert_eq!(h.engine.summary().deliveries, 0);
}

#[tokio::test]
async fn test_alert_not_held_up_by_poi_lookup() {
    let mut config = test_config();
    config.story_check_interval = Duration::from_secs(3600);
    config.timeouts.poi_lookup = Duration::from_secs(2);
    let h = Harness::with_lookup(config, MockTextGenerator::default(), MockPoiLookup::hanging());

    let clock = Arc::new(ManualClock::new(t0()));
    let (tx, rx) = mpsc::channel(16);
    let trip = tokio::spawn(TripLoop::new(h.engine, rx, clock).run());

    // 1. First fix starts a lookup that hangs until its timeout.
    tx.send(Event::Location(sample(0))).await.unwrap();
    // 2. Alert queued right behind it.
    tx.send(Event::Preemption(nav_alert("nav://exit-now"))).await.unwrap();

    // 3. Reaches the sink long before a single lookup attempt times out.
    let reached = tokio::time::timeout(Duration::from_millis(500), async {
        while h.sink.played().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "alert waited on the POI lookup");
    assert_eq!(h.sink.played(), vec![(ContentKind::Alert, PriorityTier::NavigationAlert)]);

    // 4. Ending the trip cancels the lookup rather than waiting it out.
    tx.send(Event::EndTrip).await.unwrap();
    let summary = tokio::time::timeout(Duration::from_millis(500), trip)
        .await
        .expect("end does not wait for the lookup")
        .expect("loop exits cleanly");
    assert_eq!(summary.deliveries, 0);
}
