//! Scripted collaborators for simulation and tests.
//!
//! Each mock pops one `Behavior` per call from its script and falls back to a
//! default once the script runs dry. Calls are counted so tests can assert on
//! retry behaviour.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::kernel::content::{AudioHandle, ContentKind, GeneratedContent, SpatialMetadata};
use crate::kernel::geo::BoundingBox;
use crate::kernel::playback::PriorityTier;
use crate::kernel::poi::Poi;
use crate::services::{
    PlaybackSink, PoiLookup, SpatialAudio, SpatialRenderer, SpatialRequest, SpeechRequest,
    SpeechSynthesizer, TextGenerator, TextRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Never resolves. Only a timeout or cancellation ends the call.
    Hang,
    /// Succeeds after the delay.
    Delay(Duration),
}

#[derive(Debug)]
struct Script {
    queue: Mutex<VecDeque<Behavior>>,
    default: Behavior,
    calls: AtomicUsize,
}

impl Script {
    fn new(default: Behavior) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(behaviors);
    }

    fn next(&self) -> Behavior {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(self.default)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn play(&self, service: &str) -> Result<(), ServiceError> {
        match self.next() {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(ServiceError::Unavailable(format!("{service} scripted failure"))),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

macro_rules! scripted {
    ($ty:ident) => {
        impl $ty {
            pub fn failing() -> Self {
                Self::with_default(Behavior::Fail)
            }

            pub fn hanging() -> Self {
                Self::with_default(Behavior::Hang)
            }

            /// Queue behaviours for the next calls, ahead of the default.
            pub fn script(self, behaviors: impl IntoIterator<Item = Behavior>) -> Self {
                self.script.push(behaviors);
                self
            }

            pub fn calls(&self) -> usize {
                self.script.calls()
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::with_default(Behavior::Succeed)
            }
        }
    };
}

#[derive(Debug)]
pub struct MockTextGenerator {
    script: Script,
}

impl MockTextGenerator {
    pub fn with_default(default: Behavior) -> Self {
        Self {
            script: Script::new(default),
        }
    }
}

scripted!(MockTextGenerator);

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, ServiceError> {
        self.script.play("text-generation").await?;
        let facts = request
            .prompt
            .lines()
            .find_map(|l| l.strip_prefix("Facts: "))
            .unwrap_or("the road ahead");
        Ok(format!("Here is something about {}.", facts.trim()))
    }
}

#[derive(Debug)]
pub struct MockSpeechSynthesizer {
    script: Script,
}

impl MockSpeechSynthesizer {
    pub fn with_default(default: Behavior) -> Self {
        Self {
            script: Script::new(default),
        }
    }
}

scripted!(MockSpeechSynthesizer);

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, ServiceError> {
        self.script.play("speech-synthesis").await?;
        let words = request.text.split_whitespace().count() as u64;
        Ok(AudioHandle {
            uri: format!("mock://speech/{}", Uuid::new_v4()),
            duration_ms: Some(words * 400),
        })
    }
}

#[derive(Debug)]
pub struct MockSpatialRenderer {
    script: Script,
}

impl MockSpatialRenderer {
    pub fn with_default(default: Behavior) -> Self {
        Self {
            script: Script::new(default),
        }
    }
}

scripted!(MockSpatialRenderer);

#[async_trait]
impl SpatialRenderer for MockSpatialRenderer {
    async fn render(&self, request: &SpatialRequest) -> Result<SpatialAudio, ServiceError> {
        self.script.play("spatial-audio").await?;
        Ok(SpatialAudio {
            audio: AudioHandle {
                uri: format!("{}#spatial", request.audio.uri),
                duration_ms: request.audio.duration_ms,
            },
            metadata: SpatialMetadata {
                azimuth_deg: request.relative_bearing_deg.unwrap_or(0.0),
                distance_m: request.distance_m,
            },
        })
    }
}

/// Returns its fixed POI set filtered to the requested area.
#[derive(Debug)]
pub struct MockPoiLookup {
    script: Script,
    pois: Mutex<Vec<Poi>>,
}

impl MockPoiLookup {
    pub fn with_default(default: Behavior) -> Self {
        Self {
            script: Script::new(default),
            pois: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pois(pois: Vec<Poi>) -> Self {
        let lookup = Self::default();
        lookup.set_pois(pois);
        lookup
    }

    pub fn set_pois(&self, pois: Vec<Poi>) {
        *self.pois.lock().unwrap_or_else(|e| e.into_inner()) = pois;
    }
}

scripted!(MockPoiLookup);

#[async_trait]
impl PoiLookup for MockPoiLookup {
    async fn lookup(&self, area: &BoundingBox) -> Result<Vec<Poi>, ServiceError> {
        self.script.play("poi-lookup").await?;
        let pois = self.pois.lock().unwrap_or_else(|e| e.into_inner());
        Ok(pois
            .iter()
            .filter(|p| area.contains(&p.location))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Play {
        content_id: Uuid,
        kind: ContentKind,
        tier: PriorityTier,
        text: String,
    },
    Stop,
    Pause,
    Resume,
}

/// Sink that records every command it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingPlaybackSink {
    commands: Mutex<Vec<PlaybackCommand>>,
}

impl RecordingPlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<PlaybackCommand> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Only the `Play` commands, as (kind, tier).
    pub fn played(&self) -> Vec<(ContentKind, PriorityTier)> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                PlaybackCommand::Play { kind, tier, .. } => Some((kind, tier)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, command: PlaybackCommand) {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
    }
}

#[async_trait]
impl PlaybackSink for RecordingPlaybackSink {
    async fn play(&self, content: &GeneratedContent, tier: PriorityTier) -> Result<(), ServiceError> {
        self.push(PlaybackCommand::Play {
            content_id: content.id,
            kind: content.kind,
            tier,
            text: content.text.clone(),
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.push(PlaybackCommand::Stop);
        Ok(())
    }

    async fn pause(&self) -> Result<(), ServiceError> {
        self.push(PlaybackCommand::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ServiceError> {
        self.push(PlaybackCommand::Resume);
        Ok(())
    }
}
