//! Turn lifecycle observers
//!
//! A fixed, typed set of callbacks passed explicitly into the engine.
//! Every method is a no-op by default; implement only what you watch.

use super::handler::HandlerError;
use crate::state::Frame;
use crate::trace::Trace;

/// Observer of one turn's lifecycle
pub trait TurnObserver: Send + Sync {
    /// A frame was pushed (sub-flow entered)
    fn on_frame_enter(&self, frame: &Frame) {
        let _ = frame;
    }

    /// A frame was popped (sub-flow finished or destroyed by a jump)
    fn on_frame_exit(&self, frame: &Frame) {
        let _ = frame;
    }

    /// A handler failed; the turn is about to end with a debug trace
    fn on_handler_error(&self, node_id: &str, error: &HandlerError) {
        let _ = (node_id, error);
    }

    /// The turn finished; the trace is complete
    fn on_turn_end(&self, trace: &Trace) {
        let _ = trace;
    }
}

/// The default observer: watches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}
