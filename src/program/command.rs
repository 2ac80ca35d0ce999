//! Commands: stack-wide interruptions
//!
//! A command is an (event, action) rule armed for as long as its owning
//! frame stays on the stack. Resolution order is innermost frame first, then
//! declaration order within the frame; the first hit wins.

use super::{NodeId, ProgramId};
use serde::{Deserialize, Serialize};

/// An armed interruption rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub event: CommandEvent,
    pub action: CommandAction,
}

impl Command {
    pub fn new(event: CommandEvent, action: CommandAction) -> Self {
        Self { event, action }
    }
}

/// What fires a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandEvent {
    /// An intent request with a matching (normalized) name
    Intent {
        name: String,
        #[serde(default)]
        entity_mappings: Vec<EntityMapping>,
        /// When set, only requests originating in this program match
        #[serde(skip_serializing_if = "Option::is_none")]
        program_scope: Option<ProgramId>,
    },
    /// A named platform trace event (arrives as an action request)
    Trace { name: String },
}

/// Copy a captured entity into a variable when the command fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub entity: String,
    pub variable: String,
}

/// What a fired command does to the stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    /// Push a new frame for the target program at its entry node
    Push { program_id: ProgramId },
    /// Destroy every frame above the owner and move its cursor; a different
    /// `program_id` replaces the owning frame entirely
    Jump {
        node_id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        program_id: Option<ProgramId>,
    },
}
