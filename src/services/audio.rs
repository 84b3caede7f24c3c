use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::kernel::content::{AudioHandle, SpatialMetadata};
use crate::services::{SpatialAudio, SpatialRenderer, SpeechRequest, SpeechSynthesizer, SpatialRequest};

const DEFAULT_BASE_URL: &str = "http://localhost:8090";

/// Speech synthesis and spatial rendering behind one audio service.
///
/// `POST /synthesize {text, voice}` -> `{uri, duration_ms}`
/// `POST /spatialize {uri, azimuth_deg, distance_m}` -> `{uri, duration_ms, azimuth_deg, distance_m}`
#[derive(Clone)]
pub struct HttpAudioService {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SpatializeBody<'a> {
    uri: &'a str,
    azimuth_deg: f64,
    distance_m: Option<f64>,
}

#[derive(Deserialize)]
struct SpatializeResponse {
    uri: String,
    #[serde(default)]
    duration_ms: Option<u64>,
    azimuth_deg: f64,
    #[serde(default)]
    distance_m: Option<f64>,
}

impl HttpAudioService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reads `AUDIO_BASE_URL`.
    pub fn from_env(timeout: Duration) -> Self {
        let base_url = std::env::var("AUDIO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, timeout)
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service,
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpAudioService {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, ServiceError> {
        let handle: AudioHandle = self.post("speech-synthesis", "/synthesize", request).await?;
        if handle.uri.is_empty() {
            return Err(ServiceError::InvalidResponse("synthesis returned no audio".to_string()));
        }
        Ok(handle)
    }
}

#[async_trait]
impl SpatialRenderer for HttpAudioService {
    async fn render(&self, request: &SpatialRequest) -> Result<SpatialAudio, ServiceError> {
        let body = SpatializeBody {
            uri: &request.audio.uri,
            azimuth_deg: request.relative_bearing_deg.unwrap_or(0.0),
            distance_m: request.distance_m,
        };
        let resp: SpatializeResponse = self.post("spatial-audio", "/spatialize", &body).await?;
        Ok(SpatialAudio {
            audio: AudioHandle {
                uri: resp.uri,
                duration_ms: resp.duration_ms.or(request.audio.duration_ms),
            },
            metadata: SpatialMetadata {
                azimuth_deg: resp.azimuth_deg,
                distance_m: resp.distance_m,
            },
        })
    }
}
