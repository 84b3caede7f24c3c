//! Remote and local collaborators of the engine.
//!
//! Every trait here is a bounded, fallible capability: the engine wraps each
//! call in a timeout and never lets a failure escape the trip loop.

pub mod audio;
pub mod llm;
pub mod mock;
pub mod poi;
pub mod retry;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::kernel::content::{AudioHandle, GeneratedContent, SpatialMetadata};
use crate::kernel::event::DeliveryLogEntry;
use crate::kernel::geo::BoundingBox;
use crate::kernel::playback::PriorityTier;
use crate::kernel::poi::Poi;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    pub prompt: String,
    pub max_words: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRequest {
    pub audio: AudioHandle,
    /// Azimuth relative to the vehicle heading, right positive. None renders centered.
    pub relative_bearing_deg: Option<f64>,
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialAudio {
    pub audio: AudioHandle,
    pub metadata: SpatialMetadata,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &TextRequest) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, ServiceError>;
}

#[async_trait]
pub trait SpatialRenderer: Send + Sync {
    async fn render(&self, request: &SpatialRequest) -> Result<SpatialAudio, ServiceError>;
}

/// Read-only POI/booking lookup by bounding area.
#[async_trait]
pub trait PoiLookup: Send + Sync {
    async fn lookup(&self, area: &BoundingBox) -> Result<Vec<Poi>, ServiceError>;
}

/// Audio-output collaborator.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, content: &GeneratedContent, tier: PriorityTier) -> Result<(), ServiceError>;
    async fn stop(&self) -> Result<(), ServiceError>;
    async fn pause(&self) -> Result<(), ServiceError>;
    async fn resume(&self) -> Result<(), ServiceError>;
}

/// Append-only store for delivery entries (analytics and pacing audit).
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn append(&self, entry: DeliveryLogEntry) -> Result<(), ServiceError>;
}
