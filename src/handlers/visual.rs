//! Visual payload nodes

use crate::program::{Node, NodeId, NodePayload};
use crate::runtime::engine::TurnContext;
use crate::runtime::{Handler, HandlerError};
use crate::trace::TraceEvent;
use async_trait::async_trait;

pub struct VisualHandler;

#[async_trait]
impl Handler for VisualHandler {
    fn can_handle(&self, node: &Node) -> bool {
        matches!(node.payload, NodePayload::Visual { .. })
    }

    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let NodePayload::Visual {
            image,
            device,
            next,
        } = &node.payload
        else {
            return Err(HandlerError::wrong_node_type(node));
        };
        ctx.emit(TraceEvent::Visual {
            image: image.clone(),
            device: device.clone(),
        });
        Ok(next.clone())
    }
}
