use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::{CancelReason, CancellationRegistry};
use super::content::{CandidateId, ContentCandidate, ContentKind, Fidelity, GeneratedContent};
use super::event::{DeliveryLogEntry, DeliveryOutcome, Event, PreemptionEvent, StatusEvent};
use super::lifecycle::{EngineState, LifecycleGraph, Trigger};
use super::pacing::{Delivery, PacingController, PacingRejection, PacingWindow};
use super::playback::{Completion, PlaybackQueue, PlaybackSlot, PriorityTier, QueueOutcome};
use super::poi::{Poi, PoiId};
use super::selector::CandidateSelector;
use super::session::{OrchestrationSession, TripId};
use super::telemetry::event::{PacingRejectionKind, TelemetryEvent, TickKind};
use super::telemetry::metrics::TripSummary;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::Clock;
use super::trip::{LocationSample, PoiRefresh, RefreshRequest, TripState, UpdateOutcome};
use crate::config::EngineConfig;
use crate::error::{EngineError, ServiceError};
use crate::generation::dispatcher::{DispatchHandle, DispatchOutcome, DispatchSettings, GenerationDispatcher};
use crate::services::{
    DeliveryLog, PlaybackSink, PoiLookup, SpatialRenderer, SpeechSynthesizer, TextGenerator,
};

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// External capabilities one trip talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub spatial: Arc<dyn SpatialRenderer>,
    pub poi: Arc<dyn PoiLookup>,
    pub sink: Arc<dyn PlaybackSink>,
    pub delivery_log: Arc<dyn DeliveryLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No location sample accepted yet.
    NoFix,
    /// A dispatch is still in flight; evaluation skipped.
    Busy,
    Ineligible(PacingRejection),
    NoCandidate,
    Dispatched(CandidateId),
    Ended,
}

impl TickOutcome {
    fn kind(&self) -> TickKind {
        match self {
            TickOutcome::NoFix => TickKind::NoFix,
            TickOutcome::Busy => TickKind::Busy,
            TickOutcome::Ineligible(_) => TickKind::Ineligible,
            TickOutcome::NoCandidate => TickKind::NoCandidate,
            TickOutcome::Dispatched(_) => TickKind::Dispatched,
            TickOutcome::Ended => TickKind::Ended,
        }
    }
}

/// A POI lookup running beside the trip loop.
#[derive(Debug)]
struct RefreshTask {
    request: RefreshRequest,
    token: CancellationToken,
    join: JoinHandle<Result<Vec<Poi>, ServiceError>>,
}

/// Off-loop work that finished and needs to be applied.
#[derive(Debug)]
pub enum Background {
    PoiRefresh(Result<Result<Vec<Poi>, ServiceError>, JoinError>),
    Dispatch(Result<DispatchOutcome, JoinError>),
}

/// The orchestration state machine for one trip.
///
/// Owns the session (pacing window, playback queue, history) exclusively.
/// Every entry point takes `now` from the caller so a simulated clock can drive it.
pub struct OrchestrationEngine {
    config: EngineConfig,
    session: OrchestrationSession,
    pacing: PacingController,
    selector: CandidateSelector,
    dispatcher: GenerationDispatcher,
    cancel_registry: CancellationRegistry,
    in_flight: Option<DispatchHandle>,
    poi_refresh: Option<RefreshTask>,
    poi: Arc<dyn PoiLookup>,
    sink: Arc<dyn PlaybackSink>,
    delivery_log: Arc<dyn DeliveryLog>,
    telemetry: TelemetryRecorder,
    status_tx: broadcast::Sender<StatusEvent>,
}

impl OrchestrationEngine {
    /// Validates the configuration. An invalid configuration never starts a trip.
    pub fn start(config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        Self::start_with_id(TripId::new(), config, collaborators)
    }

    pub fn start_with_id(trip_id: TripId, config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        config.validate()?;

        let dispatcher = GenerationDispatcher::new(
            collaborators.text,
            collaborators.speech,
            collaborators.spatial,
            DispatchSettings::from_config(&config),
        );
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        info!(
            %trip_id,
            min_gap_min = config.min_story_gap.num_minutes(),
            max_per_hour = config.max_stories_per_hour,
            "trip started"
        );

        Ok(Self {
            session: OrchestrationSession::new(trip_id, &config),
            pacing: PacingController::from_config(&config),
            selector: CandidateSelector::from_config(&config),
            cancel_registry: CancellationRegistry::new(config.passed_poi_cancel_m),
            dispatcher,
            in_flight: None,
            poi_refresh: None,
            poi: collaborators.poi,
            sink: collaborators.sink,
            delivery_log: collaborators.delivery_log,
            telemetry: TelemetryRecorder::new(),
            status_tx,
            config,
        })
    }

    /// Swap the dispatcher, e.g. to register extra capabilities.
    pub fn with_dispatcher(mut self, dispatcher: GenerationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn trip_id(&self) -> TripId {
        self.session.trip_id
    }

    pub fn state(&self) -> EngineState {
        self.session.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trip_state(&self) -> Option<&TripState> {
        self.session.trip_state()
    }

    pub fn pacing_window(&self) -> &PacingWindow {
        &self.session.pacing_window
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.session.playback
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn in_flight(&self) -> Option<&ContentCandidate> {
        self.in_flight.as_ref().map(|h| h.candidate())
    }

    /// Status events for every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn summary(&self) -> TripSummary {
        let elapsed = self
            .session
            .trip_state()
            .map_or(TimeDelta::zero(), |t| t.elapsed);
        self.telemetry.summarize(self.session.trip_id, elapsed)
    }

    fn ensure_active(&self) -> Result<(), EngineError> {
        if self.session.is_ended() {
            return Err(EngineError::TripEnded(self.session.trip_id));
        }
        Ok(())
    }

    fn fire(&mut self, trigger: Trigger, now: DateTime<Utc>) -> bool {
        let from = self.session.state;
        match LifecycleGraph::transition(from, trigger) {
            Some(to) => {
                self.session.state = to;
                debug!(trip_id = %self.session.trip_id, %from, %to, "state transition");
                self.telemetry.record(TelemetryEvent::StateTransition { from, to });
                // No subscribers is fine.
                let _ = self.status_tx.send(StatusEvent {
                    trip_id: self.session.trip_id,
                    from,
                    to,
                    at: now,
                });
                true
            }
            None => {
                debug!(trip_id = %self.session.trip_id, ?trigger, %from, "transition ignored");
                false
            }
        }
    }

    /// Ingest a location sample, then re-check whether in-flight work was invalidated.
    /// A due POI refresh is spawned, never awaited here; see `next_background`.
    pub async fn on_location(&mut self, sample: LocationSample) -> Result<UpdateOutcome, EngineError> {
        self.ensure_active()?;

        let (outcome, request) = self.session.tracker.ingest(sample);
        if !outcome.accepted() {
            self.telemetry.record(TelemetryEvent::SampleDiscarded {
                verdict: outcome.verdict,
            });
            return Ok(outcome);
        }
        if let Some(request) = request {
            self.spawn_refresh(request);
        }

        if let (Some(handle), Some(trip)) = (self.in_flight.as_mut(), self.session.tracker.state()) {
            if !handle.is_cancelled() {
                if let Some(reason) = self.cancel_registry.assess(handle.candidate(), trip) {
                    info!(
                        trip_id = %self.session.trip_id,
                        candidate_id = %handle.candidate().id,
                        ?reason,
                        "cancelling in-flight generation"
                    );
                    handle.cancel(reason);
                }
            }
        }
        Ok(outcome)
    }

    fn spawn_refresh(&mut self, request: RefreshRequest) {
        debug!(trip_id = %self.session.trip_id, "POI refresh started");
        let lookup = self.poi.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_request = request.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(ServiceError::Cancelled),
                result = task_request.fetch(lookup.as_ref()) => result,
            }
        });
        self.poi_refresh = Some(RefreshTask { request, token, join });
    }

    /// Wait for the outstanding POI refresh and apply it. None when nothing was running.
    pub async fn settle_poi_refresh(&mut self) -> Option<PoiRefresh> {
        let joined = match self.poi_refresh.as_mut() {
            Some(task) => (&mut task.join).await,
            None => return None,
        };
        self.resolve_poi_refresh(joined)
    }

    pub fn resolve_poi_refresh(&mut self, joined: Result<Result<Vec<Poi>, ServiceError>, JoinError>) -> Option<PoiRefresh> {
        let task = self.poi_refresh.take()?;
        let result = joined.unwrap_or_else(|e| Err(ServiceError::Unavailable(format!("POI lookup task ended: {e}"))));
        if matches!(result, Err(ServiceError::Cancelled)) {
            self.session.tracker.abandon_refresh();
            return None;
        }

        let refresh = self.session.tracker.apply_refresh(&task.request, result);
        self.telemetry.record(TelemetryEvent::PoiRefresh {
            ok: matches!(refresh, PoiRefresh::Refreshed(_)),
        });
        Some(refresh)
    }

    /// One evaluation cycle: pacing gate, selection, dispatch.
    pub async fn on_tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let outcome = self.evaluate(now);
        self.telemetry.record(TelemetryEvent::Tick { kind: outcome.kind() });
        outcome
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.session.is_ended() {
            return TickOutcome::Ended;
        }
        if self.in_flight.is_some() {
            return TickOutcome::Busy;
        }

        let decision = {
            let Some(trip) = self.session.tracker.state() else {
                return TickOutcome::NoFix;
            };
            self.pacing
                .check(now, &self.session.pacing_window)
                .map(|()| self.selector.select(trip, &self.session.history))
        };

        self.fire(Trigger::Tick, now);

        let candidate = match decision {
            Err(rejection) => return self.reject(rejection, now),
            Ok(None) => {
                debug!(trip_id = %self.session.trip_id, "no candidate above threshold");
                self.fire(Trigger::NothingSelected, now);
                self.fire(Trigger::Settle, now);
                return TickOutcome::NoCandidate;
            }
            Ok(Some(candidate)) => candidate,
        };

        // Hard gate, checked again right before anything is spawned.
        if let Err(rejection) = self.pacing.check(now, &self.session.pacing_window) {
            return self.reject(rejection, now);
        }

        let id = candidate.id;
        info!(
            trip_id = %self.session.trip_id,
            candidate_id = %id,
            kind = ?candidate.kind,
            poi = ?candidate.poi_id(),
            score = candidate.score,
            "dispatching candidate"
        );
        self.telemetry.record(TelemetryEvent::Dispatched {
            candidate_id: id,
            kind: candidate.kind,
        });
        self.in_flight = Some(self.dispatcher.spawn(candidate));
        self.fire(Trigger::CandidateSelected, now);
        TickOutcome::Dispatched(id)
    }

    fn reject(&mut self, rejection: PacingRejection, now: DateTime<Utc>) -> TickOutcome {
        debug!(trip_id = %self.session.trip_id, ?rejection, "pacing gate closed");
        self.telemetry.record(TelemetryEvent::PacingRejected {
            kind: PacingRejectionKind::from(&rejection),
        });
        self.fire(Trigger::PacingRejected, now);
        self.fire(Trigger::Settle, now);
        TickOutcome::Ineligible(rejection)
    }

    /// Resolves when a POI refresh or the in-flight dispatch finishes.
    /// Pending forever when neither is running.
    pub async fn next_background(&mut self) -> Background {
        let refresh = self.poi_refresh.as_mut();
        let dispatch = self.in_flight.as_mut();
        tokio::select! {
            biased;
            joined = async move {
                match refresh {
                    Some(task) => (&mut task.join).await,
                    None => std::future::pending().await,
                }
            } => Background::PoiRefresh(joined),
            joined = async move {
                match dispatch {
                    Some(handle) => handle.wait().await,
                    None => std::future::pending().await,
                }
            } => Background::Dispatch(joined),
        }
    }

    pub async fn resolve_background(&mut self, background: Background, now: DateTime<Utc>) {
        match background {
            Background::PoiRefresh(joined) => {
                self.resolve_poi_refresh(joined);
            }
            Background::Dispatch(joined) => {
                self.resolve_dispatch(joined, now).await;
            }
        }
    }

    /// Wait for the in-flight dispatch and deliver it. None when nothing was in flight.
    pub async fn settle_dispatch(&mut self, now: DateTime<Utc>) -> Option<DeliveryOutcome> {
        let joined = match self.in_flight.as_mut() {
            Some(handle) => handle.wait().await,
            None => return None,
        };
        self.resolve_dispatch(joined, now).await
    }

    /// Hand a finished dispatch to the playback queue, unless it was cancelled
    /// or the candidate went stale while generating.
    pub async fn resolve_dispatch(
        &mut self,
        joined: Result<DispatchOutcome, JoinError>,
        now: DateTime<Utc>,
    ) -> Option<DeliveryOutcome> {
        let handle = self.in_flight.take()?;
        let mut reason = handle.cancel_reason();
        let candidate = handle.into_candidate();

        let outcome = joined.unwrap_or_else(|e| {
            warn!(trip_id = %self.session.trip_id, "generation task ended abnormally: {}", e);
            reason.get_or_insert(CancelReason::Aborted);
            DispatchOutcome::Cancelled
        });

        let content = match (outcome, reason) {
            (DispatchOutcome::Completed(content), None) => content,
            (_, reason) => {
                self.drop_dispatch(&candidate, reason.unwrap_or(CancelReason::Aborted), now)
                    .await;
                return Some(DeliveryOutcome::Cancelled);
            }
        };

        self.fire(Trigger::DispatchResolved, now);

        let invalidated = self
            .session
            .tracker
            .state()
            .and_then(|trip| self.cancel_registry.assess(&candidate, trip));
        if let Some(reason) = invalidated {
            self.drop_dispatch(&candidate, reason, now).await;
            return Some(DeliveryOutcome::Cancelled);
        }

        let tier = self.config.tiers.tier_for(candidate.kind);
        let fidelity = content.fidelity();
        let latency_ms = content.latency.as_millis() as u64;

        match self.session.playback.enqueue(content.clone(), tier, now) {
            QueueOutcome::Started { .. } => self.play(&content, tier).await,
            QueueOutcome::Pending { superseded } => {
                debug!(trip_id = %self.session.trip_id, "content waiting behind active playback");
                if let Some(old) = superseded {
                    self.retire(&old, DeliveryOutcome::Superseded, now).await;
                }
            }
            QueueOutcome::Dropped(slot) => {
                info!(trip_id = %self.session.trip_id, "higher-priority item pending, content dropped");
                self.retire(&slot, DeliveryOutcome::Superseded, now).await;
                self.fire(Trigger::DispatchDropped, now);
                return Some(DeliveryOutcome::Superseded);
            }
        }

        self.pacing.record(
            &mut self.session.pacing_window,
            Delivery {
                at: now,
                kind: candidate.kind,
            },
        );
        self.session.history.mark_delivered(&candidate);

        let outcome = match fidelity {
            Fidelity::Full => DeliveryOutcome::Delivered,
            Fidelity::TextOnly => DeliveryOutcome::DeliveredTextOnly,
            Fidelity::Fallback => DeliveryOutcome::DeliveredFallback,
        };
        if fidelity != Fidelity::Full {
            info!(trip_id = %self.session.trip_id, ?fidelity, "delivering degraded content");
        }
        self.log_delivery(candidate.kind, candidate.poi_id().cloned(), outcome, now)
            .await;
        self.telemetry.record(TelemetryEvent::Delivered {
            kind: candidate.kind,
            fidelity,
            latency_ms,
        });
        self.fire(Trigger::Delivered, now);
        Some(outcome)
    }

    async fn drop_dispatch(&mut self, candidate: &ContentCandidate, reason: CancelReason, now: DateTime<Utc>) {
        info!(trip_id = %self.session.trip_id, candidate_id = %candidate.id, ?reason, "dispatch dropped");
        self.telemetry.record(TelemetryEvent::DispatchCancelled { reason });
        self.log_delivery(candidate.kind, candidate.poi_id().cloned(), DeliveryOutcome::Cancelled, now)
            .await;
        self.fire(Trigger::DispatchDropped, now);
    }

    /// Navigation/safety content. Skips evaluation and goes straight to the queue.
    pub async fn on_preemption(&mut self, event: PreemptionEvent, now: DateTime<Utc>) -> Result<QueueOutcome, EngineError> {
        self.ensure_active()?;

        let tier = event.priority_tier;
        let content = GeneratedContent::external(&event.content_ref, event.text);
        let outcome = self.session.playback.preempt(content.clone(), tier, now);

        match &outcome {
            QueueOutcome::Started { cancelled } => {
                if let Some(old) = cancelled {
                    info!(trip_id = %self.session.trip_id, cancelled = %old.tier, by = %tier, "playback preempted");
                    self.stop().await;
                    self.telemetry.record(TelemetryEvent::Preemption {
                        cancelled: old.tier,
                        by: tier,
                    });
                    self.retire(old, DeliveryOutcome::Preempted, now).await;
                }
                self.play(&content, tier).await;
            }
            QueueOutcome::Pending { superseded: Some(old) } => {
                self.retire(old, DeliveryOutcome::Superseded, now).await;
            }
            QueueOutcome::Pending { superseded: None } => {}
            QueueOutcome::Dropped(slot) => {
                self.retire(slot, DeliveryOutcome::Superseded, now).await;
            }
        }
        Ok(outcome)
    }

    /// The sink finished the active slot. Starts the pending item if it is still fresh.
    pub async fn on_playback_finished(&mut self, now: DateTime<Utc>) -> Completion {
        let completion = self.session.playback.complete(now);
        if let Some(stale) = &completion.discarded {
            debug!(trip_id = %self.session.trip_id, "pending content too old, discarded");
            self.retire(stale, DeliveryOutcome::Superseded, now).await;
        }
        if completion.started {
            if let Some(slot) = self.session.playback.current() {
                let (content, tier) = (slot.content.clone(), slot.tier);
                self.play(&content, tier).await;
            }
        }
        completion
    }

    /// Returns false when nothing was playing.
    pub async fn pause(&mut self) -> bool {
        if !self.session.playback.set_paused(true) {
            return false;
        }
        if let Err(e) = self.sink.pause().await {
            warn!(trip_id = %self.session.trip_id, "sink pause failed: {}", e);
        }
        true
    }

    pub async fn resume(&mut self) -> bool {
        if !self.session.playback.set_paused(false) {
            return false;
        }
        if let Err(e) = self.sink.resume().await {
            warn!(trip_id = %self.session.trip_id, "sink resume failed: {}", e);
        }
        true
    }

    /// Cancel everything in flight and in the queue, then move to `TripEnded`.
    pub async fn end_trip(&mut self, now: DateTime<Utc>) -> Result<TripSummary, EngineError> {
        self.ensure_active()?;

        if let Some(task) = self.poi_refresh.take() {
            task.token.cancel();
            task.join.abort();
            self.session.tracker.abandon_refresh();
        }

        if let Some(mut handle) = self.in_flight.take() {
            handle.cancel(CancelReason::TripEnded);
            handle.abort();
            // Aborted tasks resolve immediately; this only makes teardown observable.
            let _ = handle.wait().await;
            let candidate = handle.into_candidate();
            info!(trip_id = %self.session.trip_id, candidate_id = %candidate.id, "in-flight generation cancelled at trip end");
            self.telemetry.record(TelemetryEvent::DispatchCancelled {
                reason: CancelReason::TripEnded,
            });
            self.log_delivery(candidate.kind, candidate.poi_id().cloned(), DeliveryOutcome::Cancelled, now)
                .await;
        }

        let cleared = self.session.playback.clear();
        if !cleared.is_empty() {
            self.stop().await;
            for slot in &cleared {
                self.retire(slot, DeliveryOutcome::Cancelled, now).await;
            }
        }

        self.fire(Trigger::EndTrip, now);
        let summary = self.summary();
        info!(
            trip_id = %summary.trip_id,
            deliveries = summary.deliveries,
            degraded = summary.degraded,
            elapsed_secs = summary.elapsed_secs,
            "trip ended"
        );
        Ok(summary)
    }

    /// Route one inbound event. Errors only mean the trip already ended.
    pub async fn handle(&mut self, event: Event, now: DateTime<Utc>) {
        let result = match event {
            Event::Location(sample) => self.on_location(sample).await.map(|_| ()),
            Event::Preemption(preemption) => self.on_preemption(preemption, now).await.map(|_| ()),
            Event::PlaybackFinished => {
                self.on_playback_finished(now).await;
                Ok(())
            }
            Event::Pause => {
                self.pause().await;
                Ok(())
            }
            Event::Resume => {
                self.resume().await;
                Ok(())
            }
            Event::EndTrip => self.end_trip(now).await.map(|_| ()),
        };
        if let Err(e) = result {
            debug!(trip_id = %self.session.trip_id, "event ignored: {}", e);
        }
    }

    async fn play(&self, content: &GeneratedContent, tier: PriorityTier) {
        if let Err(e) = self.sink.play(content, tier).await {
            warn!(trip_id = %self.session.trip_id, "sink play failed: {}", e);
        }
    }

    async fn stop(&self) {
        if let Err(e) = self.sink.stop().await {
            warn!(trip_id = %self.session.trip_id, "sink stop failed: {}", e);
        }
    }

    async fn retire(&mut self, slot: &PlaybackSlot, outcome: DeliveryOutcome, now: DateTime<Utc>) {
        self.telemetry.record(TelemetryEvent::PlaybackDropped { outcome });
        self.log_delivery(slot.content.kind, slot.content.poi_id.clone(), outcome, now)
            .await;
    }

    async fn log_delivery(&self, content_type: ContentKind, poi_id: Option<PoiId>, outcome: DeliveryOutcome, now: DateTime<Utc>) {
        let entry = DeliveryLogEntry {
            trip_id: self.session.trip_id,
            timestamp: now,
            content_type,
            poi_id,
            outcome,
        };
        if let Err(e) = self.delivery_log.append(entry).await {
            warn!(trip_id = %self.session.trip_id, "delivery log append failed: {}", e);
        }
    }
}

/// Single logical task per trip: inbound events first, then finished background
/// work (POI refresh, dispatch), then the periodic tick. Nothing in a branch
/// awaits a remote call.
pub struct TripLoop {
    engine: OrchestrationEngine,
    events: mpsc::Receiver<Event>,
    clock: Arc<dyn Clock>,
}

impl TripLoop {
    pub fn new(engine: OrchestrationEngine, events: mpsc::Receiver<Event>, clock: Arc<dyn Clock>) -> Self {
        Self { engine, events, clock }
    }

    pub async fn run(self) -> TripSummary {
        let TripLoop {
            mut engine,
            mut events,
            clock,
        } = self;

        let mut cadence = interval(engine.config.story_check_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            trip_id = %engine.trip_id(),
            interval_ms = engine.config.story_check_interval.as_millis() as u64,
            "trip loop started"
        );

        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(Event::EndTrip) | None => break,
                    Some(event) => engine.handle(event, clock.now()).await,
                },
                background = engine.next_background() => {
                    engine.resolve_background(background, clock.now()).await;
                }
                _ = cadence.tick() => {
                    engine.on_tick(clock.now()).await;
                }
            }
        }

        let now = clock.now();
        match engine.end_trip(now).await {
            Ok(summary) => summary,
            Err(_) => engine.summary(),
        }
    }
}
