//! Turn runtime
//!
//! The node-dispatch loop that ties the state model, classification,
//! escalation, and command resolution together: one call to
//! [`TurnEngine::run`] consumes one inbound request and produces the next
//! [`ConversationState`](crate::state::ConversationState) plus the turn's
//! trace.

pub mod commands;
pub mod engine;
pub mod escalation;
pub mod handler;
pub mod lifecycle;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod proptests;

pub use commands::CommandHit;
pub use engine::{
    EngineConfig, EngineError, Phase, TurnContext, TurnEngine, TurnResult, TurnServices,
};
pub use escalation::{EscalationKind, EscalationOutcome};
pub use handler::{Handler, HandlerError};
pub use lifecycle::{NoopObserver, TurnObserver};
