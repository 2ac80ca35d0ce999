//! Conversation state
//!
//! The serializable snapshot the caller persists verbatim between turns.
//! The engine receives it by value, works on a mutable draft for the
//! duration of one turn, and seals a fresh snapshot at turn end; it never
//! holds a reference across turns.

pub mod frame;
pub mod storage;
pub mod variables;

pub use frame::{Frame, FrameStack};
pub use storage::{SessionStorage, StorageScope, TypedKey};
pub use variables::VariableStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The durable conversation snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub stack: FrameStack,
    #[serde(default)]
    pub variables: VariableStore,
    #[serde(default)]
    pub storage: SessionStorage,
}

impl ConversationState {
    /// Fresh state positioned at a program's node
    pub fn at(program_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            stack: FrameStack::new(Frame::new(program_id, node_id)),
            variables: VariableStore::new(),
            storage: SessionStorage::new(),
        }
    }

    /// Reject malformed input before any execution happens.
    ///
    /// A state with an empty stack is only legal *after* a conversation has
    /// ended; feeding it back into the engine is a caller bug and surfaces
    /// as an error rather than silent mis-execution.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.stack.is_empty() {
            return Err(StateError::EmptyStack);
        }
        for (index, frame) in self.stack.frames().iter().enumerate() {
            if frame.program_id.is_empty() {
                return Err(StateError::BlankProgramId { frame: index });
            }
        }
        Ok(())
    }
}

/// Corrupt input state, surfaced to the caller
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("conversation state has an empty frame stack")]
    EmptyStack,
    #[error("frame {frame} has a blank program id")]
    BlankProgramId { frame: usize },
}
