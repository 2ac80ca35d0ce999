//! Choice interaction handler
//!
//! The blocking question node. On entry it surfaces the choices and halts;
//! on resume it classifies the inbound request, routes a matching choice
//! (slot-filling required entities first), falls through to stack-wide
//! commands, and escalates no-match / no-reply otherwise.

use super::platform::PlatformPolicy;
use super::{arm_no_reply, emit_message};
use crate::classify::PredictScope;
use crate::program::{ChoiceNode, Node, NodeId, NodePayload};
use crate::request::{IntentRequest, Request};
use crate::runtime::engine::{Phase, TurnContext};
use crate::runtime::escalation::{self, EscalationKind, EscalationOutcome};
use crate::runtime::{commands, Handler, HandlerError};
use crate::slots::{SlotFillOutcome, SlotScope};
use crate::trace::TraceEvent;
use async_trait::async_trait;

/// Generic over the platform policy instead of duplicated per channel
pub struct InteractionHandler<P: PlatformPolicy> {
    policy: P,
}

impl<P: PlatformPolicy> InteractionHandler<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl<P: PlatformPolicy> Handler for InteractionHandler<P> {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Choice(_))
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Choice(choice) = &node.payload else {
            return Err(HandlerError::wrong_node_type(node));
        };

        match ctx.phase() {
            Phase::Entry => {
                let buttons = self.policy.choice_buttons(choice);
                if !buttons.is_empty() {
                    ctx.emit(TraceEvent::Choice { buttons });
                }
                arm_no_reply(ctx, choice.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            Phase::Resume => {
                let Some(request) = ctx.request().cloned() else {
                    return Ok(Some(node.id.clone()));
                };
                match request {
                    Request::NoInput => {
                        self.escalate(EscalationKind::NoReply, node, choice, ctx)
                    }
                    Request::Text { utterance } => {
                        self.resume_text(&utterance, node, choice, ctx).await
                    }
                    Request::Intent(intent) => self.route_intent(intent, node, choice, ctx).await,
                    request @ Request::Action { .. } => {
                        self.route_command(&request, node, choice, ctx).await
                    }
                }
            }
        }
    }
}

impl<P: PlatformPolicy> InteractionHandler<P> {
    async fn resume_text(
        &self,
        utterance: &str,
        node: &Node,
        choice: &ChoiceNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let services = ctx.services();
        let scope = SlotScope::local(node.id.clone());

        // A live pending entity request for this node gets the turn first.
        if let Some(outcome) = services
            .slot_filler
            .resume(utterance, &scope, &services.predictor, &mut ctx.storage, true)
            .await
        {
            return self.after_slot_fill(outcome, node, choice, ctx).await;
        }

        let prediction = services.predictor.predict(utterance, &PredictScope::Open).await;
        if !prediction.debug.is_empty() {
            ctx.emit(TraceEvent::debug(prediction.debug.summary()));
        }
        match prediction.result {
            Some(result) => self.route_intent(result.into(), node, choice, ctx).await,
            None => self.escalate(EscalationKind::NoMatch, node, choice, ctx),
        }
    }

    /// Route a recognized intent: local choice first, then commands
    async fn route_intent(
        &self,
        intent: IntentRequest,
        node: &Node,
        choice: &ChoiceNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let Some(matched) = choice.choice_for(&intent.name) else {
            return self
                .route_command(&Request::Intent(intent), node, choice, ctx)
                .await;
        };
        let next = matched.next.clone();
        let label = matched
            .label
            .clone()
            .unwrap_or_else(|| matched.intent.clone());

        let services = ctx.services();
        let scope = SlotScope::local(node.id.clone());
        match services
            .slot_filler
            .begin(intent, &scope, &services.model, &mut ctx.storage)
        {
            SlotFillOutcome::Prompted { prompt } => {
                emit_message(ctx, prompt);
                arm_no_reply(ctx, choice.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            SlotFillOutcome::Fulfilled { intent } => {
                self.merge_entities(&intent, ctx);
                ctx.end_interaction();
                ctx.emit(TraceEvent::path(label));
                Ok(next)
            }
            // begin() never interrupts; resume() does.
            SlotFillOutcome::Interrupted { request } => {
                self.route_command(&request, node, choice, ctx).await
            }
        }
    }

    /// Fall through to the stack-wide armed commands
    async fn route_command(
        &self,
        request: &Request,
        node: &Node,
        choice: &ChoiceNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        if let Some(hit) = commands::find(request, &ctx.stack, &self.policy) {
            ctx.end_interaction();
            let next = commands::apply(hit, request, ctx).await?;
            return Ok(Some(next));
        }
        self.escalate(EscalationKind::NoMatch, node, choice, ctx)
    }

    async fn after_slot_fill(
        &self,
        outcome: SlotFillOutcome,
        node: &Node,
        choice: &ChoiceNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        match outcome {
            SlotFillOutcome::Prompted { prompt } => {
                emit_message(ctx, prompt);
                arm_no_reply(ctx, choice.no_reply.as_ref());
                Ok(Some(node.id.clone()))
            }
            SlotFillOutcome::Fulfilled { intent } => {
                self.route_intent(intent, node, choice, ctx).await
            }
            SlotFillOutcome::Interrupted { request } => match request {
                Request::Intent(intent) => self.route_intent(intent, node, choice, ctx).await,
                other => self.route_command(&other, node, choice, ctx).await,
            },
        }
    }

    fn escalate(
        &self,
        kind: EscalationKind,
        node: &Node,
        choice: &ChoiceNode,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let policy = match kind {
            EscalationKind::NoMatch => choice.no_match.as_ref(),
            EscalationKind::NoReply => choice.no_reply.as_ref().map(|nr| &nr.policy),
        };
        let services = ctx.services();
        match escalation::consume(kind, policy, &services.model, &mut ctx.storage) {
            EscalationOutcome::Reprompt { prompt } => {
                emit_message(ctx, prompt);
                arm_no_reply(ctx, choice.no_reply.as_ref());
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

    fn merge_entities(&self, intent: &IntentRequest, ctx: &mut TurnContext<'_>) {
        for entity in &intent.entities {
            ctx.variables
                .set(entity.name.clone(), self.policy.map_entity_value(entity));
        }
    }
}
