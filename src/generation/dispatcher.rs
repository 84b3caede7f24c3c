use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::capability::{default_capabilities, ContentCapability, GenerationContext};
use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::kernel::cancel::CancelReason;
use crate::kernel::content::{
    AudioHandle, CallOutcome, ContentCandidate, GeneratedContent, SpatialMetadata, SubCallReport,
};
use crate::outputs::realizer::realize_fallback;
use crate::services::retry::{retry, with_timeout, RetryPolicy};
use crate::services::{
    SpatialRenderer, SpatialRequest, SpeechRequest, SpeechSynthesizer, TextGenerator,
};

const DEFAULT_VOICE: &str = "narrator";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub generation_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub spatial_timeout: Duration,
    pub retry: RetryPolicy,
    pub voice: String,
}

impl DispatchSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            generation_timeout: config.timeouts.generation,
            synthesis_timeout: config.timeouts.synthesis,
            spatial_timeout: config.timeouts.spatial,
            retry: RetryPolicy::single_retry(config.retry_backoff),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(GeneratedContent),
    /// The token fired before the content was complete. Partial results are dropped.
    Cancelled,
}

/// A dispatch in flight: the spawned task plus its cancellation token.
#[derive(Debug)]
pub struct DispatchHandle {
    candidate: ContentCandidate,
    token: CancellationToken,
    join: JoinHandle<DispatchOutcome>,
    cancel_reason: Option<CancelReason>,
}

impl DispatchHandle {
    pub fn candidate(&self) -> &ContentCandidate {
        &self.candidate
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cooperative cancel. The first reason wins.
    pub fn cancel(&mut self, reason: CancelReason) {
        if self.cancel_reason.is_none() {
            self.cancel_reason = Some(reason);
        }
        self.token.cancel();
    }

    /// Wait for the task without consuming the handle.
    pub async fn wait(&mut self) -> Result<DispatchOutcome, JoinError> {
        (&mut self.join).await
    }

    /// Hard stop for teardown, after `cancel` has been given a chance.
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn into_candidate(self) -> ContentCandidate {
        self.candidate
    }
}

/// Runs text, speech and spatial calls for one candidate. Cheap to clone;
/// every collaborator is shared.
#[derive(Clone)]
pub struct GenerationDispatcher {
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    spatial: Arc<dyn SpatialRenderer>,
    capabilities: Arc<[Arc<dyn ContentCapability>]>,
    settings: DispatchSettings,
}

impl GenerationDispatcher {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        spatial: Arc<dyn SpatialRenderer>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            text,
            speech,
            spatial,
            capabilities: default_capabilities().into(),
            settings,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Arc<dyn ContentCapability>>) -> Self {
        self.capabilities = capabilities.into();
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    fn capability_for(&self, candidate: &ContentCandidate) -> Option<&dyn ContentCapability> {
        self.capabilities
            .iter()
            .find(|c| c.serves(candidate.kind))
            .map(|c| c.as_ref())
    }

    /// Start generation as its own task. The trip loop keeps ticking.
    pub fn spawn(&self, candidate: ContentCandidate) -> DispatchHandle {
        let token = CancellationToken::new();
        let dispatcher = self.clone();
        let task_token = token.clone();
        let task_candidate = candidate.clone();
        let join = tokio::spawn(async move { dispatcher.generate(&task_candidate, &task_token).await });

        DispatchHandle {
            candidate,
            token,
            join,
            cancel_reason: None,
        }
    }

    /// Text, then speech on that text, then spatial packaging of that audio.
    /// Never fails: generation failure yields template text, audio failure yields
    /// silent text. Only cancellation stops it short.
    pub async fn generate(&self, candidate: &ContentCandidate, token: &CancellationToken) -> DispatchOutcome {
        let started = Instant::now();

        let (text, text_outcome, fallback_text) = match self.capability_for(candidate) {
            Some(capability) => {
                let ctx = GenerationContext { text: self.text.as_ref() };
                let ctx = &ctx;
                let limit = self.settings.generation_timeout;
                let attempt = retry("text-generation", self.settings.retry, move |_| {
                    with_timeout("text-generation", limit, capability.generate(candidate, ctx))
                });
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => return self.cancelled(candidate, "text"),
                    result = attempt => result,
                };
                match result {
                    Ok(text) => (text, CallOutcome::Succeeded, false),
                    Err(e) => {
                        warn!(candidate_id = %candidate.id, capability = capability.name(), "generation failed, using fallback: {}", e);
                        (capability.fallback(candidate), outcome_of(&e), true)
                    }
                }
            }
            None => {
                warn!(candidate_id = %candidate.id, kind = ?candidate.kind, "no capability serves this kind, using fallback");
                (realize_fallback(candidate), CallOutcome::Skipped, true)
            }
        };

        if token.is_cancelled() {
            return self.cancelled(candidate, "speech");
        }

        let speech_request = SpeechRequest {
            text: text.clone(),
            voice: self.settings.voice.clone(),
        };
        let speech = tokio::select! {
            biased;
            _ = token.cancelled() => return self.cancelled(candidate, "speech"),
            result = with_timeout("speech-synthesis", self.settings.synthesis_timeout, self.speech.synthesize(&speech_request)) => result,
        };

        let (audio, spatial, speech_outcome, spatial_outcome) = match speech {
            Ok(voice) => {
                if token.is_cancelled() {
                    return self.cancelled(candidate, "spatial");
                }
                let request = SpatialRequest {
                    audio: voice,
                    relative_bearing_deg: candidate.relative_bearing_deg,
                    distance_m: candidate.distance_m,
                };
                let rendered = tokio::select! {
                    biased;
                    _ = token.cancelled() => return self.cancelled(candidate, "spatial"),
                    result = with_timeout("spatial-audio", self.settings.spatial_timeout, self.spatial.render(&request)) => result,
                };
                match rendered {
                    Ok(out) => (Some(out.audio), Some(out.metadata), CallOutcome::Succeeded, CallOutcome::Succeeded),
                    Err(e) => {
                        warn!(candidate_id = %candidate.id, "spatial rendering failed, delivering text only: {}", e);
                        (None, None, CallOutcome::Succeeded, outcome_of(&e))
                    }
                }
            }
            Err(e) => {
                warn!(candidate_id = %candidate.id, "speech synthesis failed, delivering text only: {}", e);
                (None, None, outcome_of(&e), CallOutcome::Skipped)
            }
        };

        let content = assemble(
            candidate,
            text,
            audio,
            spatial,
            started.elapsed(),
            SubCallReport {
                text: text_outcome,
                speech: speech_outcome,
                spatial: spatial_outcome,
            },
            fallback_text,
        );
        info!(
            candidate_id = %candidate.id,
            fidelity = ?content.fidelity(),
            latency_ms = content.latency.as_millis() as u64,
            "generation complete"
        );
        DispatchOutcome::Completed(content)
    }

    fn cancelled(&self, candidate: &ContentCandidate, stage: &'static str) -> DispatchOutcome {
        debug!(candidate_id = %candidate.id, stage, "generation cancelled");
        DispatchOutcome::Cancelled
    }
}

fn outcome_of(error: &ServiceError) -> CallOutcome {
    if error.is_timeout() {
        CallOutcome::TimedOut
    } else {
        CallOutcome::Failed
    }
}

fn assemble(
    candidate: &ContentCandidate,
    text: String,
    audio: Option<AudioHandle>,
    spatial: Option<SpatialMetadata>,
    latency: Duration,
    calls: SubCallReport,
    fallback_text: bool,
) -> GeneratedContent {
    GeneratedContent {
        id: Uuid::new_v4(),
        candidate_id: Some(candidate.id),
        kind: candidate.kind,
        poi_id: candidate.poi_id().cloned(),
        text,
        audio,
        spatial,
        latency,
        calls,
        fallback_text,
    }
}
