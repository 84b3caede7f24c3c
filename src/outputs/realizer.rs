use crate::kernel::content::{ContentCandidate, ContentKind};

/// PURE FUNCTION: template text for a candidate whose generation failed.
/// Never empty, never touches the network.
pub fn realize_fallback(candidate: &ContentCandidate) -> String {
    let subject = candidate.params.subject.as_deref().unwrap_or("this stretch of road");
    let seed = candidate.params.prompt_seed.trim();

    match candidate.kind {
        ContentKind::Story => {
            if seed.is_empty() || seed == subject {
                format!("Coming up is {}, one of the notable sights along this route.", subject)
            } else {
                format!("Coming up is {}. {}", subject, sentence(seed))
            }
        }
        ContentKind::Trivia | ContentKind::Fact => {
            format!("A quick note about {}: {}", subject, sentence(seed))
        }
        ContentKind::BookingSuggestion => {
            format!("{} is nearby and takes reservations if you would like to stop.", subject)
        }
        ContentKind::Ambient => format!("Something to think about as you drive: {}.", seed.trim_end_matches('.')),
        ContentKind::Alert => sentence(seed),
    }
}

/// Prompt text handed to the generator for a candidate.
pub fn realize_prompt(candidate: &ContentCandidate, style: &str) -> String {
    let subject = candidate
        .params
        .subject
        .as_deref()
        .map(|s| format!("Subject: {}\n", s))
        .unwrap_or_default();
    let direction = candidate
        .relative_bearing_deg
        .map(|b| format!("It is on the {} of the vehicle.\n", side(b)))
        .unwrap_or_default();

    format!(
        "System: You are a travel companion narrating to passengers in a moving car. {} Use at most {} words. No lists.\n\
         User: {}{}Facts: {}\nAssistant:",
        style, candidate.params.max_words, subject, direction, candidate.params.prompt_seed
    )
}

fn side(relative_bearing: f64) -> &'static str {
    if relative_bearing.abs() <= 30.0 {
        "road ahead"
    } else if relative_bearing > 0.0 {
        "right"
    } else {
        "left"
    }
}

fn sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "...".to_string();
    }
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}
