//! Handler dispatch
//!
//! One capability interface for every node type. Dispatch is a flat ordered
//! scan over the registered handlers; the first `can_handle` wins. A node
//! no handler claims is an authoring/data corruption problem and aborts the
//! turn.

use super::engine::TurnContext;
use crate::program::{Node, NodeId, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A node handler
#[async_trait]
pub trait Handler: Send + Sync {
    /// Whether this handler claims the node
    fn can_handle(&self, node: &Node) -> bool;

    /// React to the node. Returning the node's own id halts the turn there
    /// (await the next request); `None` marks the frame's program finished.
    async fn handle(
        &self,
        node: &Node,
        ctx: &mut TurnContext<'_>,
    ) -> Result<Option<NodeId>, HandlerError>;
}

/// Failures inside a handler; all fatal to the turn
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("handler cannot process node {node_id} of type {node_type}")]
    WrongNodeType {
        node_id: NodeId,
        node_type: &'static str,
    },
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn wrong_node_type(node: &Node) -> Self {
        HandlerError::WrongNodeType {
            node_id: node.id.clone(),
            node_type: node.type_name(),
        }
    }
}

/// Ordered handler collection
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self { handlers }
    }

    /// First registered handler claiming the node
    pub fn find(&self, node: &Node) -> Option<&Arc<dyn Handler>> {
        self.handlers.iter().find(|handler| handler.can_handle(node))
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
