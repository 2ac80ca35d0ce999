//! Inbound turn signals
//!
//! Exactly one request is consumed per turn. A request arriving with the
//! turn puts the engine in resume phase; after the first handler dispatch it
//! is considered spent regardless of what the handler did with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound user signal for a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// The reply timeout fired without any user input
    NoInput,

    /// Free text that still needs classification
    Text { utterance: String },

    /// An already-classified intent (platform NLU or a prior cascade run)
    Intent(IntentRequest),

    /// A non-linguistic platform action (button tap, deep link, trace event)
    Action {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Request {
    pub fn text(utterance: impl Into<String>) -> Self {
        Request::Text {
            utterance: utterance.into(),
        }
    }

    pub fn intent(name: impl Into<String>) -> Self {
        Request::Intent(IntentRequest::new(name))
    }

    /// Borrow the intent payload, if this is an intent request
    pub fn as_intent(&self) -> Option<&IntentRequest> {
        match self {
            Request::Intent(intent) => Some(intent),
            _ => None,
        }
    }

    pub fn is_no_input(&self) -> bool {
        matches!(self, Request::NoInput)
    }
}

/// A recognized user goal plus whatever entities came with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub entities: Vec<EntityValue>,
    /// Program the recognition originated in, when known. Commands scoped to
    /// a program only fire for requests that originated there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_program: Option<String>,
}

impl IntentRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confidence: None,
            entities: Vec::new(),
            origin_program: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_entity(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.push(EntityValue {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Look up a captured entity by name
    pub fn entity(&self, name: &str) -> Option<&EntityValue> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// True when `other` names the same intent after normalization
    pub fn matches_name(&self, other: &str) -> bool {
        normalize_name(&self.name) == normalize_name(other)
    }
}

/// A single captured entity (slot) value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValue {
    pub name: String,
    pub value: Value,
}

impl EntityValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Normalize an intent or event name for comparison.
///
/// Authors and platforms disagree on casing and separators
/// (`BookFlight`, `book_flight`, `book flight`), so comparisons run over a
/// lowercase form with separator runs collapsed to a single underscore.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}
