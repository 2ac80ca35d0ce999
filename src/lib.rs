//! Meander - turn-by-turn execution engine for conversational flow graphs
//!
//! Given a persisted [`ConversationState`] and one inbound [`Request`], the
//! [`TurnEngine`] walks the authored graph, classifies free text through
//! the NLC/NLU/LLM cascade when a node needs it, and returns the updated
//! state plus an ordered [`Trace`] of observable effects. State is passed
//! by value and never aliased across turns; everything external (program
//! store, NLU backend, completion gateway) is injected explicitly.

pub mod classify;
pub mod gateway;
pub mod handlers;
pub mod program;
pub mod request;
pub mod runtime;
pub mod slots;
pub mod state;
pub mod trace;

pub use classify::{CascadeConfig, CascadeMode, PredictScope, Prediction, Predictor};
pub use gateway::{CompletionGateway, GatewayConfig, HttpGateway};
pub use program::{Node, NodePayload, ProgramProvider, VersionModel};
pub use request::{IntentRequest, Request};
pub use runtime::{
    EngineConfig, EngineError, Handler, NoopObserver, TurnEngine, TurnObserver, TurnResult,
};
pub use slots::{SlotFillConfig, SlotFiller};
pub use state::{ConversationState, Frame, StateError};
pub use trace::{Trace, TraceEvent};
