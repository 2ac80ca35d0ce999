//! Sub-flow entry and cursor jumps

use crate::program::{Node, NodeId, NodePayload};
use crate::runtime::engine::TurnContext;
use crate::runtime::{Handler, HandlerError};
use crate::state::Frame;
use crate::trace::TraceEvent;
use async_trait::async_trait;

/// Enters a sub-flow, parking the return cursor on the current frame
pub struct FlowHandler;

#[async_trait]
impl Handler for FlowHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Flow { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Flow { program_id, next } = &node.payload else {
            return Err(HandlerError::wrong_node_type(node));
        };

        // The caller resumes at `next` once the sub-flow's frame pops.
        if let Some(top) = ctx.stack.top_mut() {
            top.node_id = next.clone();
        }

        let frame = ctx.new_frame(program_id).await?;
        let entry = frame
            .node_id
            .clone()
            .ok_or_else(|| HandlerError::Internal("fresh frame without entry node".into()))?;
        ctx.push_frame(frame);
        Ok(Some(entry))
    }
}

/// Moves the cursor, possibly across programs
pub struct GoToHandler;

#[async_trait]
impl Handler for GoToHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::GoTo { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::GoTo {
            node_id,
            program_id,
        } = &node.payload
        else {
            return Err(HandlerError::wrong_node_type(node));
        };

        let current_program = ctx
            .stack
            .top()
            .map(|frame| frame.program_id.clone())
            .unwrap_or_default();

        match program_id {
            Some(target) if *target != current_program => {
                // Destructive jump: the current frame is replaced wholesale.
                let commands = ctx.services().provider.program_commands(target).await?;
                ctx.pop_frame();
                let frame = Frame::new(target.clone(), node_id.clone()).with_commands(commands);
                ctx.push_frame(frame);
                ctx.emit(TraceEvent::GoTo {
                    node_id: node_id.clone(),
                    program_id: Some(target.clone()),
                });
            }
            _ => {
                ctx.emit(TraceEvent::GoTo {
                    node_id: node_id.clone(),
                    program_id: None,
                });
            }
        }
        Ok(Some(node_id.clone()))
    }
}
