//! Node handlers
//!
//! One handler per node capability, registered in dispatch order. The
//! interaction and capture handlers are generic over a small platform
//! policy instead of being duplicated per channel.

pub mod basic;
pub mod capture;
pub mod flow;
pub mod interaction;
pub mod logic;
pub mod platform;
pub mod speak;
pub mod visual;

pub use basic::{EndHandler, StartHandler};
pub use capture::CaptureHandler;
pub use flow::{FlowHandler, GoToHandler};
pub use interaction::InteractionHandler;
pub use logic::{ConditionHandler, SetVariablesHandler};
pub use platform::{ChatPolicy, PlatformPolicy, VoicePolicy};
pub use speak::SpeakHandler;
pub use visual::VisualHandler;

use crate::program::Platform;
use crate::runtime::engine::TurnContext;
use crate::runtime::Handler;
use crate::trace::TraceEvent;
use std::sync::Arc;

/// The standard handler set for chat surfaces
pub fn default_handlers() -> Vec<Arc<dyn Handler>> {
    handlers_for(ChatPolicy)
}

/// The standard handler set parameterized by platform policy
pub fn handlers_for<P: PlatformPolicy + Clone + 'static>(policy: P) -> Vec<Arc<dyn Handler>> {
    let handlers: Vec<Arc<dyn Handler>> = vec![
        Arc::new(StartHandler),
        Arc::new(SpeakHandler),
        Arc::new(VisualHandler),
        Arc::new(InteractionHandler::new(policy.clone())),
        Arc::new(CaptureHandler::new(policy)),
        Arc::new(FlowHandler),
        Arc::new(GoToHandler),
        Arc::new(SetVariablesHandler),
        Arc::new(ConditionHandler),
        Arc::new(EndHandler),
    ];
    handlers
}

/// Emit a user-facing message the way the version's platform expects
pub(crate) fn emit_message(ctx: &mut TurnContext<'_>, message: impl Into<String>) {
    let message = message.into();
    match ctx.services().model.platform {
        Platform::Voice => ctx.emit(TraceEvent::Speak {
            message,
            voice: None,
        }),
        Platform::Chat => ctx.emit(TraceEvent::text(message)),
    }
}

/// Re-arm the reply timeout when a blocking node has a no-reply policy
pub(crate) fn arm_no_reply(ctx: &mut TurnContext<'_>, policy: Option<&crate::program::NoReplyPolicy>) {
    if let Some(no_reply) = policy {
        ctx.emit(TraceEvent::NoReply {
            timeout_secs: no_reply.timeout_secs,
        });
    }
}
