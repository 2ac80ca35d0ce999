//! LLM candidate reranking (hybrid tier)
//!
//! Renders the NLU's top candidates into a classification prompt, asks the
//! completion gateway to pick one, and validates the raw answer against the
//! candidate set. Each attempt is bounded by a timeout; one retry, then the
//! caller falls back to the NLU result unchanged.

use super::debug::{CascadeDebug, CascadeTier};
use super::{is_none_intent, PromptStyle};
use crate::gateway::{ChatMessage, CompletionGateway, CompletionRequest};
use crate::request::normalize_name;
use std::time::Duration;

/// Ask the gateway to choose one candidate. `None` means every attempt
/// failed, timed out, or produced an answer outside the candidate set.
pub async fn choose_intent(
    gateway: &dyn CompletionGateway,
    utterance: &str,
    candidates: &[String],
    style: &PromptStyle,
    timeout: Duration,
    retries: u32,
    debug: &mut CascadeDebug,
) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let request = CompletionRequest::new(render_prompt(utterance, candidates, style))
        .with_temperature(0.0)
        .with_max_tokens(32)
        .with_timeout(timeout);

    for attempt in 0..=retries {
        let response = match tokio::time::timeout(timeout, gateway.complete(&request)).await {
            Err(_) => {
                debug.error(CascadeTier::LlmRerank, format!("timeout after {timeout:?}"));
                continue;
            }
            Ok(Err(err)) => {
                debug.error(CascadeTier::LlmRerank, err.to_string());
                continue;
            }
            Ok(Ok(response)) => response,
        };

        match validate_choice(&response.text, candidates) {
            Some(choice) => {
                debug.matched(CascadeTier::LlmRerank, &choice, 1.0);
                return Some(choice);
            }
            None if is_none_intent(response.text.trim()) => {
                debug.rejected(CascadeTier::LlmRerank, "model declined all candidates");
                return None;
            }
            None => {
                debug.rejected(
                    CascadeTier::LlmRerank,
                    format!("answer not in candidate set (attempt {})", attempt + 1),
                );
            }
        }
    }
    None
}

/// Build the classification prompt
fn render_prompt(utterance: &str, candidates: &[String], style: &PromptStyle) -> Vec<ChatMessage> {
    let listed = candidates.join("\n");
    match style {
        PromptStyle::Default => vec![
            ChatMessage::system(
                "You are an intent classifier for a conversational assistant. \
                 Reply with exactly one intent name from the list, or None if \
                 nothing fits. Reply with the name only.",
            ),
            ChatMessage::user(format!(
                "Intents:\n{listed}\n\nUser said: {utterance}\n\nIntent:"
            )),
        ],
        PromptStyle::Custom(template) => {
            let rendered = template
                .replace("{utterance}", utterance)
                .replace("{intents}", &listed);
            vec![ChatMessage::user(rendered)]
        }
    }
}

/// Accept the raw model answer only when it names a candidate
fn validate_choice(raw: &str, candidates: &[String]) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim();
    if cleaned.is_empty() || is_none_intent(cleaned) {
        return None;
    }

    let wanted = normalize_name(cleaned);
    candidates
        .iter()
        .find(|candidate| normalize_name(candidate) == wanted)
        .cloned()
}
