//! Speak and text output nodes

use crate::program::{Node, NodeId, NodePayload};
use crate::runtime::engine::TurnContext;
use crate::runtime::{Handler, HandlerError};
use crate::trace::TraceEvent;
use async_trait::async_trait;
use rand::seq::SliceRandom;

/// Emits one prompt per visit and moves on
pub struct SpeakHandler;

#[async_trait]
impl Handler for SpeakHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(
            node.payload,
            NodePayload::Speak { .. } | NodePayload::Text { .. }
        )
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        match &node.payload {
            NodePayload::Speak {
                prompts,
                randomize,
                voice,
                next,
            } => {
                if let Some(message) = pick(prompts, *randomize) {
                    ctx.emit(TraceEvent::Speak {
                        message,
                        voice: voice.clone(),
                    });
                }
                Ok(next.clone())
            }
            NodePayload::Text {
                messages,
                randomize,
                next,
            } => {
                if let Some(message) = pick(messages, *randomize) {
                    ctx.emit(TraceEvent::Text { message });
                }
                Ok(next.clone())
            }
            _ => Err(HandlerError::wrong_node_type(node)),
        }
    }
}

fn pick(options: &[String], randomize: bool) -> Option<String> {
    if randomize {
        options.choose(&mut rand::thread_rng()).cloned()
    } else {
        options.first().cloned()
    }
}
