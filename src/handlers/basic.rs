//! Start and end nodes

use crate::program::{Node, NodeId, NodePayload};
use crate::runtime::engine::TurnContext;
use crate::runtime::{Handler, HandlerError};
use async_trait::async_trait;

/// Program entry point: pass straight through
pub struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Start { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        _ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Start { next } = &node.payload else {
            return Err(HandlerError::wrong_node_type(node));
        };
        Ok(next.clone())
    }
}

/// End of the whole conversation: drain the stack so the engine emits the
/// end-of-conversation trace
pub struct EndHandler;

#[async_trait]
impl Handler for EndHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::End)
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        if !matches!(node.payload, NodePayload::End) {
            return Err(HandlerError::wrong_node_type(node));
        }
        while ctx.pop_frame().is_some() {}
        Ok(None)
    }
}
