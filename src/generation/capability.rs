use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::kernel::content::{ContentCandidate, ContentKind};
use crate::outputs::realizer::{realize_fallback, realize_prompt};
use crate::services::{TextGenerator, TextRequest};

/// What a capability may call while generating.
pub struct GenerationContext<'a> {
    pub text: &'a dyn TextGenerator,
}

/// One implementation per content type. The dispatcher picks the first
/// capability that serves the candidate's kind.
#[async_trait]
pub trait ContentCapability: Send + Sync {
    fn name(&self) -> &'static str;

    fn serves(&self, kind: ContentKind) -> bool;

    fn request(&self, candidate: &ContentCandidate) -> TextRequest;

    async fn generate(&self, candidate: &ContentCandidate, ctx: &GenerationContext<'_>) -> Result<String, ServiceError> {
        let text = ctx.text.generate(&self.request(candidate)).await?;
        Ok(self.finish(candidate, text))
    }

    /// Post-process generated text.
    fn finish(&self, _candidate: &ContentCandidate, text: String) -> String {
        text
    }

    /// Template text used when generation fails after retry.
    fn fallback(&self, candidate: &ContentCandidate) -> String {
        realize_fallback(candidate)
    }
}

pub struct StoryCapability;

#[async_trait]
impl ContentCapability for StoryCapability {
    fn name(&self) -> &'static str {
        "story"
    }

    fn serves(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Story
    }

    fn request(&self, candidate: &ContentCandidate) -> TextRequest {
        TextRequest {
            prompt: realize_prompt(candidate, "Tell a short, vivid story about the place."),
            max_words: candidate.params.max_words,
            temperature: 0.7,
        }
    }
}

/// Trivia, facts and POI-less ambient filler.
pub struct TriviaCapability;

#[async_trait]
impl ContentCapability for TriviaCapability {
    fn name(&self) -> &'static str {
        "trivia"
    }

    fn serves(&self, kind: ContentKind) -> bool {
        matches!(kind, ContentKind::Trivia | ContentKind::Fact | ContentKind::Ambient)
    }

    fn request(&self, candidate: &ContentCandidate) -> TextRequest {
        let style = match candidate.kind {
            ContentKind::Ambient => "Share one light, general-interest thought on the topic.",
            _ => "Share one surprising, accurate fact.",
        };
        TextRequest {
            prompt: realize_prompt(candidate, style),
            max_words: candidate.params.max_words,
            temperature: 0.5,
        }
    }
}

pub struct BookingCapability;

#[async_trait]
impl ContentCapability for BookingCapability {
    fn name(&self) -> &'static str {
        "booking"
    }

    fn serves(&self, kind: ContentKind) -> bool {
        kind == ContentKind::BookingSuggestion
    }

    fn request(&self, candidate: &ContentCandidate) -> TextRequest {
        TextRequest {
            prompt: realize_prompt(candidate, "Suggest the stop briefly and neutrally. Do not pressure."),
            max_words: candidate.params.max_words,
            temperature: 0.4,
        }
    }

    fn finish(&self, candidate: &ContentCandidate, text: String) -> String {
        let bookable = candidate.poi.as_ref().is_some_and(|p| p.metadata.bookable);
        if bookable && !text.to_ascii_lowercase().contains("reserv") {
            format!("{} Reservations are available.", text)
        } else {
            text
        }
    }
}

pub fn default_capabilities() -> Vec<Arc<dyn ContentCapability>> {
    vec![
        Arc::new(StoryCapability),
        Arc::new(TriviaCapability),
        Arc::new(BookingCapability),
    ]
}
