//! Structured cascade debug record
//!
//! Every intermediate classification attempt, including the failed ones,
//! lands here. The record rides alongside the prediction and ends up in a
//! `Debug` trace event; it is never thrown at the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Cascade tier an attempt ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeTier {
    NlcClosed,
    NlcOpen,
    Nlu,
    LlmRerank,
    EntityExtraction,
}

impl CascadeTier {
    fn label(self) -> &'static str {
        match self {
            CascadeTier::NlcClosed => "nlc",
            CascadeTier::NlcOpen => "nlc(open)",
            CascadeTier::Nlu => "nlu",
            CascadeTier::LlmRerank => "llm",
            CascadeTier::EntityExtraction => "entities",
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Matched { intent: String, confidence: f64 },
    NoMatch,
    Rejected { reason: String },
    Error { message: String },
}

/// One recorded attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeAttempt {
    pub tier: CascadeTier,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// The per-prediction debug record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CascadeDebug {
    attempts: Vec<CascadeAttempt>,
}

impl CascadeDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tier: CascadeTier, outcome: AttemptOutcome) {
        self.attempts.push(CascadeAttempt {
            tier,
            at: Utc::now(),
            outcome,
        });
    }

    pub fn matched(&mut self, tier: CascadeTier, intent: &str, confidence: f64) {
        self.record(
            tier,
            AttemptOutcome::Matched {
                intent: intent.to_string(),
                confidence,
            },
        );
    }

    pub fn no_match(&mut self, tier: CascadeTier) {
        self.record(tier, AttemptOutcome::NoMatch);
    }

    pub fn rejected(&mut self, tier: CascadeTier, reason: impl Into<String>) {
        self.record(
            tier,
            AttemptOutcome::Rejected {
                reason: reason.into(),
            },
        );
    }

    pub fn error(&mut self, tier: CascadeTier, message: impl Into<String>) {
        self.record(
            tier,
            AttemptOutcome::Error {
                message: message.into(),
            },
        );
    }

    pub fn attempts(&self) -> &[CascadeAttempt] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Compact single-line summary for the `Debug` trace event
    pub fn summary(&self) -> String {
        let mut out = String::from("classification:");
        for attempt in &self.attempts {
            let _ = match &attempt.outcome {
                AttemptOutcome::Matched { intent, confidence } => write!(
                    out,
                    " {}={intent}({confidence:.2})",
                    attempt.tier.label()
                ),
                AttemptOutcome::NoMatch => write!(out, " {}=miss", attempt.tier.label()),
                AttemptOutcome::Rejected { reason } => {
                    write!(out, " {}=rejected[{reason}]", attempt.tier.label())
                }
                AttemptOutcome::Error { message } => {
                    write!(out, " {}=error[{message}]", attempt.tier.label())
                }
            };
        }
        out
    }
}
