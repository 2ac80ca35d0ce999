//! Input capture handler
//!
//! Blocking capture of either the raw utterance into a variable, or the
//! required entities of an intent via multi-turn slot-filling. Whether a
//! confidently-recognized unrelated intent may steal the turn is authored
//! per node (`allow_interrupt`).

use super::platform::PlatformPolicy;
use super::{arm_no_reply, emit_message};
use crate::classify::PredictScope;
use crate::program::{CaptureNode, Node, NodeId, NodePayload};
use crate::request::{IntentRequest, Request};
use crate::runtime::engine::{Phase, TurnContext};
use crate::runtime::escalation::{self, EscalationKind, EscalationOutcome};
use crate::runtime::{commands, Handler, HandlerError};
use crate::slots::{SlotFillOutcome, SlotScope};
use crate::trace::TraceEvent;
use async_trait::async_trait;

pub struct CaptureHandler<P: PlatformPolicy> {
    policy: P,
}

impl<P: PlatformPolicy> CaptureHandler<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl<P: PlatformPolicy> Handler for CaptureHandler<P> {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Capture(_))
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Capture(capture) = &node.payload else {
            return Err(HandlerError::wrong_node_type(node));
        };

        match ctx.phase() {
            Phase::Entry => {
                arm_no_reply(ctx, capture.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            Phase::Resume => {
                let Some(request) = ctx.request().cloned() else {
                    return Ok(Some(node.id.clone()));
                };
                match request {
                    Request::NoInput => self.escalate_no_reply(node, capture, ctx),
                    Request::Text { utterance } => {
                        self.resume_text(&utterance, node, capture, ctx).await
                    }
                    Request::Intent(intent) => {
                        self.resume_intent(intent, node, capture, ctx).await
                    }
                    request @ Request::Action { .. } => {
                        self.try_command(&request, node, ctx).await
                    }
                }
            }
        }
    }
}

impl<P: PlatformPolicy> CaptureHandler<P> {
    async fn resume_text(
        &self,
        utterance: &str,
        node: &Node,
        capture: &CaptureNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        // Raw capture swallows the utterance whole.
        if let Some(variable) = &capture.variable {
            ctx.variables.set(variable.clone(), utterance);
            ctx.end_interaction();
            return Ok(capture.next.clone());
        }

        let Some(intent_name) = &capture.intent else {
            // Nothing authored to capture into; pass through.
            ctx.end_interaction();
            return Ok(capture.next.clone());
        };

        let services = ctx.services();
        let scope = SlotScope::local(node.id.clone());

        if let Some(outcome) = services
            .slot_filler
            .resume(
                utterance,
                &scope,
                &services.predictor,
                &mut ctx.storage,
                capture.allow_interrupt,
            )
            .await
        {
            return self.after_slot_fill(outcome, node, capture, ctx).await;
        }

        // First turn at this capture: extract what the utterance already
        // carries, scoped to the capture intent alone.
        let required = services
            .model
            .intent(intent_name)
            .map(|model| model.required_entities.clone())
            .unwrap_or_default();
        let predict_scope = PredictScope::Intent {
            name: intent_name.clone(),
            entities: required,
        };
        let prediction = services.predictor.predict(utterance, &predict_scope).await;
        if !prediction.debug.is_empty() {
            ctx.emit(TraceEvent::debug(prediction.debug.summary()));
        }

        let intent_request = prediction
            .result
            .map_or_else(|| IntentRequest::new(intent_name.clone()), Into::into);
        self.begin_slot_fill(intent_request, node, capture, ctx).await
    }

    async fn resume_intent(
        &self,
        intent: IntentRequest,
        node: &Node,
        capture: &CaptureNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        match &capture.intent {
            Some(wanted) if intent.matches_name(wanted) => {
                self.begin_slot_fill(intent, node, capture, ctx).await
            }
            _ => self.try_command(&Request::Intent(intent), node, ctx).await,
        }
    }

    async fn begin_slot_fill(
        &self,
        intent: IntentRequest,
        node: &Node,
        capture: &CaptureNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let services = ctx.services();
        let scope = SlotScope::local(node.id.clone());
        let outcome = services
            .slot_filler
            .begin(intent, &scope, &services.model, &mut ctx.storage);
        self.after_slot_fill(outcome, node, capture, ctx).await
    }

    async fn after_slot_fill(
        &self,
        outcome: SlotFillOutcome,
        node: &Node,
        capture: &CaptureNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        match outcome {
            SlotFillOutcome::Prompted { prompt } => {
                emit_message(ctx, prompt);
                arm_no_reply(ctx, capture.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            SlotFillOutcome::Fulfilled { intent } => {
                for entity in &intent.entities {
                    ctx.variables
                        .set(entity.name.clone(), self.policy.map_entity_value(entity));
                }
                ctx.end_interaction();
                Ok(capture.next.clone())
            }
            SlotFillOutcome::Interrupted { request } => {
                self.try_command(&request, node, ctx).await
            }
        }
    }

    /// Commands are the only escape hatch from a capture
    async fn try_command(
        &self,
        request: &Request,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        if let Some(hit) = commands::find(request, &ctx.stack, &self.policy) {
            ctx.end_interaction();
            let next = commands::apply(hit, request, ctx).await?;
            return Ok(Some(next));
        }
        // Nothing claimed it; keep waiting for usable input.
        Ok(Some(node.id.clone()))
    }

    fn escalate_no_reply(
        &self,
        node: &Node,
        capture: &CaptureNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let services = ctx.services();
        let policy = capture.no_reply.as_ref().map(|nr| &nr.policy);
        match escalation::consume(
            EscalationKind::NoReply,
            policy,
            &services.model,
            &mut ctx.storage,
        ) {
            EscalationOutcome::Reprompt { prompt } => {
                emit_message(ctx, prompt);
                arm_no_reply(ctx, capture.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            EscalationOutcome::GiveUp { target } => {
                ctx.end_interaction();
                Ok(Some(target))
            }
            EscalationOutcome::Exhausted { prompt } => {
                emit_message(ctx, prompt);
                ctx.end_interaction();
                Ok(Some(node.id.clone()))
            }
        }
    }
}
