use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::services::{TextGenerator, TextRequest};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Roughly 1.4 tokens per English word, rounded up.
fn token_budget(max_words: u32) -> usize {
    (max_words as usize * 7).div_ceil(5)
}

/// Text generation against a llama-server style `/completion` endpoint.
#[derive(Clone)]
pub struct LlmTextGenerator {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    stream: bool,
    n_predict: usize,
    temperature: f32,
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl LlmTextGenerator {
    /// `timeout` is the network-level ceiling; the engine applies its own per-call deadline on top.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reads `LLM_BASE_URL`, falling back to a local llama-server.
    pub fn from_env(timeout: Duration) -> Self {
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, timeout)
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, ServiceError> {
        let body = CompletionRequest {
            prompt: &request.prompt,
            stream: false,
            n_predict: token_budget(request.max_words),
            temperature: request.temperature,
            stop: vec!["User:".to_string(), "System:".to_string()],
        };

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: "text-generation",
                status: response.status().as_u16(),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let text = parsed.content.trim();
        if text.is_empty() {
            return Err(ServiceError::InvalidResponse("empty completion".to_string()));
        }
        Ok(text.to_string())
    }
}
