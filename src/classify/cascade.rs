//! The NLC -> NLU -> LLM cascade
//!
//! Orchestrates the tiers. The contract is strict: `predict` never returns
//! an error. Tier failures degrade downward, a missing gateway turns hybrid
//! mode into pure NLU, and everything that happened is in the debug record.

use super::debug::{CascadeDebug, CascadeTier};
use super::nlc::NlcMatcher;
use super::nlu::{NluBackend, NluRequest, NluResponse};
use super::{
    is_none_intent, rerank, CascadeConfig, CascadeMode, PredictScope, PredictionResult,
    PredictionSource,
};
use crate::gateway::CompletionGateway;
use crate::program::VersionModel;
use crate::request::normalize_name;
use std::sync::Arc;

/// Prediction plus the record of how it was reached
#[derive(Debug, Clone)]
pub struct Prediction {
    pub result: Option<PredictionResult>,
    pub debug: CascadeDebug,
}

impl Prediction {
    fn none(debug: CascadeDebug) -> Self {
        Self {
            result: None,
            debug,
        }
    }
}

/// The classification cascade for one version model
pub struct Predictor {
    model: Arc<VersionModel>,
    nlc_closed: NlcMatcher,
    nlc_open: NlcMatcher,
    nlu: Arc<dyn NluBackend>,
    gateway: Option<Arc<dyn CompletionGateway>>,
    config: CascadeConfig,
}

impl Predictor {
    pub fn new(model: Arc<VersionModel>, nlu: Arc<dyn NluBackend>, config: CascadeConfig) -> Self {
        let nlc_closed = NlcMatcher::compile(&model, false);
        let nlc_open = NlcMatcher::compile(&model, true);
        Self {
            model,
            nlc_closed,
            nlc_open,
            nlu,
            gateway: None,
            config,
        }
    }

    /// Attach the completion gateway that powers hybrid mode
    pub fn with_gateway(mut self, gateway: Arc<dyn CompletionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn model(&self) -> &Arc<VersionModel> {
        &self.model
    }

    /// Classify one utterance within `scope`. Never errors; a `None` result
    /// is the NONE intent.
    pub async fn predict(&self, utterance: &str, scope: &PredictScope) -> Prediction {
        let mut debug = CascadeDebug::new();

        // Tier 1: closed pattern match. Deterministic hit wins outright.
        if let Some(result) = self.nlc_closed.matches(utterance, scope) {
            debug.matched(CascadeTier::NlcClosed, &result.intent_name, result.confidence);
            return Prediction {
                result: Some(result),
                debug,
            };
        }
        debug.no_match(CascadeTier::NlcClosed);

        // Tier 2: the statistical backend.
        let nlu_response = match self.nlu.predict(&self.nlu_request(utterance, scope)).await {
            Ok(response) => {
                if is_none_intent(&response.predicted_intent) && response.ranked_intents.is_empty() {
                    debug.no_match(CascadeTier::Nlu);
                    return self.open_slot_fallback(utterance, scope, debug);
                }
                debug.matched(CascadeTier::Nlu, &response.predicted_intent, response.confidence);
                response
            }
            Err(err) => {
                tracing::debug!(error = %err, "NLU backend unavailable, degrading");
                debug.error(CascadeTier::Nlu, err.to_string());
                return self.open_slot_fallback(utterance, scope, debug);
            }
        };

        match self.config.mode {
            CascadeMode::PureNlu => self.accept_nlu(utterance, scope, nlu_response, debug),
            CascadeMode::Hybrid => self.rerank(utterance, scope, nlu_response, debug).await,
        }
    }

    /// Pure-NLU acceptance, gated by the configured threshold
    fn accept_nlu(
        &self,
        utterance: &str,
        scope: &PredictScope,
        response: NluResponse,
        mut debug: CascadeDebug,
    ) -> Prediction {
        if is_none_intent(&response.predicted_intent)
            || response.confidence < self.config.nlu_threshold
        {
            debug.rejected(
                CascadeTier::Nlu,
                format!(
                    "confidence {:.2} below threshold {:.2}",
                    response.confidence, self.config.nlu_threshold
                ),
            );
            return self.open_slot_fallback(utterance, scope, debug);
        }

        Prediction {
            result: Some(PredictionResult {
                intent_name: response.predicted_intent,
                confidence: response.confidence,
                entities: response.entities,
                source: PredictionSource::Nlu,
            }),
            debug,
        }
    }

    /// Hybrid rerank over the NLU's top candidates
    async fn rerank(
        &self,
        utterance: &str,
        scope: &PredictScope,
        response: NluResponse,
        mut debug: CascadeDebug,
    ) -> Prediction {
        let Some(gateway) = &self.gateway else {
            // No gateway wired: hybrid degrades to pure NLU behavior.
            return self.accept_nlu(utterance, scope, response, debug);
        };

        let candidates = self.rerank_candidates(&response);
        let choice = rerank::choose_intent(
            gateway.as_ref(),
            utterance,
            &candidates,
            &self.config.prompt_style,
            self.config.rerank_timeout,
            self.config.rerank_retries,
            &mut debug,
        )
        .await;

        let Some(chosen) = choice else {
            // Invalid, empty, or erroring output: NLU result unchanged.
            return self.finish_nlu_unchanged(response, debug);
        };

        if normalize_name(&chosen) == normalize_name(&response.predicted_intent) {
            return self.finish_nlu_unchanged(response, debug);
        }

        // Adopted a different candidate. Entities extracted for the old
        // intent don't apply; re-extract scoped to the chosen intent alone.
        let confidence = response
            .ranked_intents
            .iter()
            .find(|ranked| normalize_name(&ranked.name) == normalize_name(&chosen))
            .map_or(response.confidence, |ranked| ranked.confidence);

        let mut result = PredictionResult {
            intent_name: chosen,
            confidence,
            entities: Vec::new(),
            source: PredictionSource::Llm,
        };
        self.extract_missing_entities(utterance, &mut result, &mut debug)
            .await;

        Prediction {
            result: Some(result),
            debug,
        }
    }

    fn finish_nlu_unchanged(&self, response: NluResponse, debug: CascadeDebug) -> Prediction {
        if is_none_intent(&response.predicted_intent) {
            return Prediction::none(debug);
        }
        Prediction {
            result: Some(PredictionResult {
                intent_name: response.predicted_intent,
                confidence: response.confidence,
                entities: response.entities,
                source: PredictionSource::Nlu,
            }),
            debug,
        }
    }

    /// One scoped NLU pass to pick up required entities the original
    /// prediction didn't extract
    async fn extract_missing_entities(
        &self,
        utterance: &str,
        result: &mut PredictionResult,
        debug: &mut CascadeDebug,
    ) {
        let Some(intent) = self.model.intent(&result.intent_name) else {
            return;
        };
        let missing: Vec<String> = intent
            .missing_entities(&result.entities)
            .into_iter()
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            return;
        }

        let scope = PredictScope::Intent {
            name: result.intent_name.clone(),
            entities: missing,
        };
        match self.nlu.predict(&self.nlu_request(utterance, &scope)).await {
            Ok(scoped) => {
                debug.matched(
                    CascadeTier::EntityExtraction,
                    &result.intent_name,
                    scoped.confidence,
                );
                for entity in scoped.entities {
                    if result.entities.iter().all(|e| e.name != entity.name) {
                        result.entities.push(entity);
                    }
                }
            }
            Err(err) => debug.error(CascadeTier::EntityExtraction, err.to_string()),
        }
    }

    /// Last resort: open-slot pattern matching, then NONE
    fn open_slot_fallback(
        &self,
        utterance: &str,
        scope: &PredictScope,
        mut debug: CascadeDebug,
    ) -> Prediction {
        if let Some(result) = self.nlc_open.matches(utterance, scope) {
            debug.matched(CascadeTier::NlcOpen, &result.intent_name, result.confidence);
            return Prediction {
                result: Some(result),
                debug,
            };
        }
        debug.no_match(CascadeTier::NlcOpen);
        Prediction::none(debug)
    }

    fn nlu_request(&self, utterance: &str, scope: &PredictScope) -> NluRequest {
        let (candidate_intents, candidate_entities) = match scope {
            PredictScope::Open => (
                self.model.intent_names(),
                self.model.entities.iter().map(|e| e.name.clone()).collect(),
            ),
            PredictScope::Intent { name, entities } => (vec![name.clone()], entities.clone()),
        };
        NluRequest {
            utterance: utterance.to_string(),
            candidate_intents,
            candidate_entities,
            filtered_intents: None,
            filtered_entities: None,
            locale: self.model.locale.clone(),
            platform: self.model.platform,
        }
    }

    fn rerank_candidates(&self, response: &NluResponse) -> Vec<String> {
        let mut candidates: Vec<String> = response
            .ranked_intents
            .iter()
            .filter(|ranked| !is_none_intent(&ranked.name))
            .take(self.config.top_k)
            .map(|ranked| ranked.name.clone())
            .collect();
        if candidates.is_empty() && !is_none_intent(&response.predicted_intent) {
            candidates.push(response.predicted_intent.clone());
        }
        candidates
    }
}
