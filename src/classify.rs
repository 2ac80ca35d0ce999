//! Intent and entity classification
//!
//! Free text becomes a ranked intent+entities prediction through a cascade:
//! deterministic pattern matching first, the statistical NLU backend next,
//! and optionally an LLM rerank over the NLU's top candidates. Every tier
//! can fail; failure degrades to the next tier and is recorded in a
//! structured debug record rather than surfaced as an error.

pub mod cascade;
pub mod debug;
pub mod nlc;
pub mod nlu;
pub mod rerank;

pub use cascade::{Prediction, Predictor};
pub use debug::{AttemptOutcome, CascadeAttempt, CascadeDebug, CascadeTier};
pub use nlc::NlcMatcher;
pub use nlu::{HttpNluBackend, NluBackend, NluConfig, NluError, NluRequest, NluResponse, RankedIntent};

use crate::request::EntityValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A ranked classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub intent_name: String,
    pub confidence: f64,
    pub entities: Vec<EntityValue>,
    pub source: PredictionSource,
}

impl From<PredictionResult> for crate::request::IntentRequest {
    fn from(result: PredictionResult) -> Self {
        Self {
            name: result.intent_name,
            confidence: Some(result.confidence),
            entities: result.entities,
            origin_program: None,
        }
    }
}

/// Which cascade tier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Nlc,
    Nlu,
    Llm,
}

/// What the cascade is allowed to recognize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictScope {
    /// The whole version model
    Open,
    /// A single intent, restricted to the named entities (slot-filling)
    Intent { name: String, entities: Vec<String> },
}

/// Cascade behavior knobs
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub mode: CascadeMode,
    /// Per-version confidence gate for accepting the raw NLU result
    pub nlu_threshold: f64,
    /// How many non-NONE NLU candidates the rerank prompt sees
    pub top_k: usize,
    /// Bounded timeout per rerank attempt
    pub rerank_timeout: Duration,
    /// Extra rerank attempts after the first failure
    pub rerank_retries: u32,
    pub prompt_style: PromptStyle,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            mode: CascadeMode::PureNlu,
            nlu_threshold: 0.6,
            top_k: 5,
            rerank_timeout: Duration::from_secs(5),
            rerank_retries: 1,
            prompt_style: PromptStyle::Default,
        }
    }
}

impl CascadeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: match std::env::var("CASCADE_MODE").as_deref() {
                Ok("hybrid") => CascadeMode::Hybrid,
                Ok("nlu") => CascadeMode::PureNlu,
                _ => defaults.mode,
            },
            nlu_threshold: std::env::var("NLU_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.nlu_threshold),
            ..defaults
        }
    }
}

/// Cascade operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeMode {
    /// Stop at the NLU tier; the threshold gates acceptance
    PureNlu,
    /// Rerank the NLU's top candidates through the completion gateway
    Hybrid,
}

/// Rerank prompt selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStyle {
    /// Built-in classification prompt
    Default,
    /// Author-supplied template with `{utterance}` and `{intents}` holes
    Custom(String),
}

/// Conventional "nothing recognized" intent name
pub const NONE_INTENT: &str = "None";

/// True when a backend answered with the NONE intent (or nothing at all)
pub fn is_none_intent(name: &str) -> bool {
    let normalized = crate::request::normalize_name(name);
    normalized.is_empty() || normalized == "none"
}
