//! Program provider seam
//!
//! The engine resolves nodes and models through this trait; the data store
//! behind it (database, bundle file, test fixture) is the caller's business.

use super::command::Command;
use super::model::VersionModel;
use super::node::Node;
use super::{NodeId, ProgramId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Read-only source of authored programs
#[async_trait]
pub trait ProgramProvider: Send + Sync {
    /// Resolve one node
    async fn get_node(&self, program_id: &str, node_id: &str) -> Result<Node, ProviderError>;

    /// Entry node of a program, for frame pushes
    async fn entry_node(&self, program_id: &str) -> Result<NodeId, ProviderError>;

    /// Commands a program arms on its frame. Defaults to none.
    async fn program_commands(&self, program_id: &str) -> Result<Vec<Command>, ProviderError> {
        let _ = program_id;
        Ok(Vec::new())
    }

    /// Language model of a published version
    async fn get_model(&self, version_id: &str) -> Result<VersionModel, ProviderError>;
}

/// Failures surfaced by a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown program {0}")]
    UnknownProgram(ProgramId),
    #[error("unknown node {node_id} in program {program_id}")]
    UnknownNode {
        program_id: ProgramId,
        node_id: NodeId,
    },
    #[error("unknown version {0}")]
    UnknownVersion(String),
    #[error("provider backend error: {0}")]
    Backend(String),
}

#[async_trait]
impl<T: ProgramProvider + ?Sized> ProgramProvider for Arc<T> {
    async fn get_node(&self, program_id: &str, node_id: &str) -> Result<Node, ProviderError> {
        (**self).get_node(program_id, node_id).await
    }

    async fn entry_node(&self, program_id: &str) -> Result<NodeId, ProviderError> {
        (**self).entry_node(program_id).await
    }

    async fn program_commands(&self, program_id: &str) -> Result<Vec<Command>, ProviderError> {
        (**self).program_commands(program_id).await
    }

    async fn get_model(&self, version_id: &str) -> Result<VersionModel, ProviderError> {
        (**self).get_model(version_id).await
    }
}
