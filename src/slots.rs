//! Cross-turn entity slot-filling
//!
//! When a chosen intent is missing required entities, a pending entity
//! request is parked in interaction-scoped storage and the user is asked
//! for what's missing, one turn at a time. A confidently-recognized,
//! unrelated intent may abandon the pending request when the capture scope
//! allows interruption.

use crate::classify::{PredictScope, Prediction, PredictionResult, Predictor};
use crate::program::{IntentModel, NodeId, VersionModel};
use crate::request::{normalize_name, IntentRequest, Request};
use crate::state::{SessionStorage, StorageScope, TypedKey};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pending requests, keyed by scope key. Map semantics keep the invariant
/// of at most one live request per scope.
const PENDING_ENTITIES: TypedKey<HashMap<String, PendingEntityRequest>> =
    TypedKey::new("pending_entities", StorageScope::Interaction);

/// Reach of a pending entity request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum SlotScope {
    /// Owned by a single node; resolved or abandoned there
    Local { node_id: NodeId },
    /// Stack-wide (command-initiated intents)
    Global,
}

impl SlotScope {
    pub fn local(node_id: impl Into<NodeId>) -> Self {
        SlotScope::Local {
            node_id: node_id.into(),
        }
    }

    fn key(&self) -> String {
        match self {
            SlotScope::Local { node_id } => format!("local:{node_id}"),
            SlotScope::Global => "global".to_string(),
        }
    }
}

/// A partially-filled intent awaiting its remaining required entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntityRequest {
    pub intent: IntentRequest,
    /// Required entity names still missing
    pub remaining: Vec<String>,
}

/// Slot-filling knobs
#[derive(Debug, Clone)]
pub struct SlotFillConfig {
    /// Confidence an unrelated intent needs to abandon a pending request.
    /// Deliberately a separate knob from the cascade's NLU threshold.
    pub interrupt_threshold: f64,
}

impl Default for SlotFillConfig {
    fn default() -> Self {
        Self {
            interrupt_threshold: 0.75,
        }
    }
}

/// What a slot-filling step decided
#[derive(Debug, Clone, PartialEq)]
pub enum SlotFillOutcome {
    /// Ask the user for a missing entity and halt
    Prompted { prompt: String },
    /// All required entities present; the fulfilled intent is ready
    Fulfilled { intent: IntentRequest },
    /// An unrelated intent took over; re-dispatch this request
    Interrupted { request: Request },
}

/// Multi-turn slot-filling driver
#[derive(Debug, Clone, Default)]
pub struct SlotFiller {
    config: SlotFillConfig,
}

impl SlotFiller {
    pub fn new(config: SlotFillConfig) -> Self {
        Self { config }
    }

    /// The live pending request for `scope`, if any
    pub fn pending(storage: &SessionStorage, scope: &SlotScope) -> Option<PendingEntityRequest> {
        storage
            .get(PENDING_ENTITIES)
            .and_then(|mut map| map.remove(&scope.key()))
    }

    /// Drop the pending request for `scope`
    pub fn abandon(storage: &mut SessionStorage, scope: &SlotScope) {
        let mut map = storage.get(PENDING_ENTITIES).unwrap_or_default();
        if map.remove(&scope.key()).is_some() {
            storage.put(PENDING_ENTITIES, &map);
        }
    }

    /// Start slot-filling for an intent. Returns `Fulfilled` immediately
    /// when nothing is missing; otherwise persists the pending request and
    /// asks for the first missing entity.
    pub fn begin(
        &self,
        intent: IntentRequest,
        scope: &SlotScope,
        model: &VersionModel,
        storage: &mut SessionStorage,
    ) -> SlotFillOutcome {
        let Some(intent_model) = model.intent(&intent.name) else {
            return SlotFillOutcome::Fulfilled { intent };
        };

        let remaining: Vec<String> = intent_model
            .missing_entities(&intent.entities)
            .into_iter()
            .map(str::to_string)
            .collect();
        if remaining.is_empty() {
            return SlotFillOutcome::Fulfilled { intent };
        }

        let prompt = elicitation_prompt(intent_model, &remaining[0]);
        let pending = PendingEntityRequest { intent, remaining };
        persist(storage, scope, &pending);
        SlotFillOutcome::Prompted { prompt }
    }

    /// Continue slot-filling with a fresh utterance. `None` when no pending
    /// request exists for `scope`.
    pub async fn resume(
        &self,
        utterance: &str,
        scope: &SlotScope,
        predictor: &Predictor,
        storage: &mut SessionStorage,
        allow_interrupt: bool,
    ) -> Option<SlotFillOutcome> {
        let mut pending = Self::pending(storage, scope)?;
        let model = predictor.model().clone();

        if allow_interrupt {
            if let Some(request) = self.detect_interruption(utterance, &pending, predictor).await {
                Self::abandon(storage, scope);
                return Some(SlotFillOutcome::Interrupted { request });
            }
        }

        let predict_scope = PredictScope::Intent {
            name: pending.intent.name.clone(),
            entities: pending.remaining.clone(),
        };
        let Prediction { result, .. } = predictor.predict(utterance, &predict_scope).await;
        if let Some(PredictionResult { entities, .. }) = result {
            for entity in entities {
                if pending.intent.entities.iter().all(|e| e.name != entity.name) {
                    pending.intent.entities.push(entity);
                }
            }
            pending
                .remaining
                .retain(|name| pending.intent.entities.iter().all(|e| &e.name != name));
        }

        if pending.remaining.is_empty() {
            Self::abandon(storage, scope);
            return Some(SlotFillOutcome::Fulfilled {
                intent: pending.intent,
            });
        }

        let prompt = model
            .intent(&pending.intent.name)
            .map_or_else(
                || default_prompt(&pending.remaining[0]),
                |intent_model| elicitation_prompt(intent_model, &pending.remaining[0]),
            );
        persist(storage, scope, &pending);
        Some(SlotFillOutcome::Prompted { prompt })
    }

    /// Open-scope check for an unrelated intent confident enough to steal
    /// the turn from the pending request
    async fn detect_interruption(
        &self,
        utterance: &str,
        pending: &PendingEntityRequest,
        predictor: &Predictor,
    ) -> Option<Request> {
        let Prediction { result, .. } = predictor.predict(utterance, &PredictScope::Open).await;
        let result = result?;
        if normalize_name(&result.intent_name) == normalize_name(&pending.intent.name) {
            return None;
        }
        if result.confidence < self.config.interrupt_threshold {
            return None;
        }
        Some(Request::Intent(result.into()))
    }
}

fn persist(storage: &mut SessionStorage, scope: &SlotScope, pending: &PendingEntityRequest) {
    let mut map = storage.get(PENDING_ENTITIES).unwrap_or_default();
    map.insert(scope.key(), pending.clone());
    storage.put(PENDING_ENTITIES, &map);
}

/// Sample an elicitation prompt for one missing entity
fn elicitation_prompt(intent: &IntentModel, entity: &str) -> String {
    intent
        .entity_prompts
        .get(entity)
        .and_then(|prompts| prompts.choose(&mut rand::thread_rng()))
        .cloned()
        .unwrap_or_else(|| default_prompt(entity))
}

fn default_prompt(entity: &str) -> String {
    format!("What is the {entity}?")
}
