//! Authored program material
//!
//! Everything under this module is read-only to the engine: nodes, commands,
//! and the language model are supplied per version by a [`ProgramProvider`]
//! and never mutated during a turn.

pub mod command;
pub mod model;
pub mod node;
pub mod provider;

pub use command::{Command, CommandAction, CommandEvent, EntityMapping};
pub use model::{
    EntityKind, EntityModel, EntityVariant, GlobalPrompts, IntentModel, Platform, VersionModel,
};
pub use node::{
    Assignment, CaptureNode, ChoiceNode, Condition, ConditionBranch, EscalationPolicy,
    IntentChoice, Node, NodePayload, NoReplyPolicy, ValueSource,
};
pub use provider::{ProgramProvider, ProviderError};

/// Identifier of a node within a program
pub type NodeId = String;

/// Identifier of a program (one flow graph)
pub type ProgramId = String;
