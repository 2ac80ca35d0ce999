//! Command resolution
//!
//! When a request matches no local transition, the armed commands across
//! the whole stack get a say: innermost frame first, declaration order
//! within a frame, first hit wins. Applying a command runs its entity
//! mappings into variables and then mutates the stack (push or jump),
//! returning the node the engine resumes at.

use super::engine::TurnContext;
use super::handler::HandlerError;
use crate::handlers::platform::PlatformPolicy;
use crate::program::{Command, CommandAction, CommandEvent, NodeId};
use crate::request::Request;
use crate::state::{Frame, FrameStack};
use crate::trace::TraceEvent;

/// Location of a matched command on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHit {
    pub frame_index: usize,
    pub command_index: usize,
}

/// Search the stack for a command matching `request`
pub fn find(
    request: &Request,
    stack: &FrameStack,
    policy: &dyn PlatformPolicy,
) -> Option<CommandHit> {
    for (frame_index, frame) in stack.iter_innermost() {
        for (command_index, command) in frame.commands.iter().enumerate() {
            if event_matches(&command.event, request, policy) {
                return Some(CommandHit {
                    frame_index,
                    command_index,
                });
            }
        }
    }
    None
}

fn event_matches(event: &CommandEvent, request: &Request, policy: &dyn PlatformPolicy) -> bool {
    // Program scoping is structural; name matching is the platform's call.
    if let CommandEvent::Intent {
        program_scope: Some(scope),
        ..
    } = event
    {
        let origin = request
            .as_intent()
            .and_then(|intent| intent.origin_program.as_ref());
        if origin != Some(scope) {
            return false;
        }
    }
    policy.event_matches(event, request)
}

/// Apply a previously found command and return the resume node
pub async fn apply(
    hit: CommandHit,
    request: &Request,
    ctx: &mut TurnContext<'_>,
) -> Result<NodeId, HandlerError> {
    let command = command_at(&ctx.stack, hit)
        .cloned()
        .ok_or_else(|| HandlerError::Internal("command vanished between find and apply".into()))?;

    run_entity_mappings(&command, request, ctx);

    match command.action {
        CommandAction::Push { program_id } => {
            let frame = ctx.new_frame(&program_id).await?;
            let entry = frame
                .node_id
                .clone()
                .ok_or_else(|| HandlerError::Internal("fresh frame without entry node".into()))?;
            ctx.push_frame(frame);
            Ok(entry)
        }
        CommandAction::Jump {
            node_id,
            program_id,
        } => {
            // Destroy every frame above the command's owner.
            while ctx.stack.depth() > hit.frame_index + 1 {
                ctx.pop_frame();
            }

            let owner_program = ctx
                .stack
                .top()
                .map(|frame| frame.program_id.clone())
                .unwrap_or_default();

            match program_id {
                Some(target_program) if target_program != owner_program => {
                    // Cross-program jump replaces the owning frame.
                    let commands = ctx
                        .services()
                        .provider
                        .program_commands(&target_program)
                        .await?;
                    let replacement =
                        Frame::new(target_program.clone(), node_id.clone()).with_commands(commands);
                    ctx.emit(TraceEvent::flow_exit(owner_program));
                    ctx.emit(TraceEvent::flow_enter(target_program.clone()));
                    ctx.stack.replace(hit.frame_index, replacement);
                    ctx.emit(TraceEvent::GoTo {
                        node_id: node_id.clone(),
                        program_id: Some(target_program),
                    });
                }
                _ => {
                    if let Some(frame) = ctx.stack.frame_mut(hit.frame_index) {
                        frame.node_id = Some(node_id.clone());
                    }
                    ctx.emit(TraceEvent::GoTo {
                        node_id: node_id.clone(),
                        program_id: None,
                    });
                }
            }
            Ok(node_id)
        }
    }
}

fn command_at(stack: &FrameStack, hit: CommandHit) -> Option<&Command> {
    stack
        .frames()
        .get(hit.frame_index)
        .and_then(|frame| frame.commands.get(hit.command_index))
}

/// Copy mapped entities from the firing request into variables
fn run_entity_mappings(command: &Command, request: &Request, ctx: &mut TurnContext<'_>) {
    let CommandEvent::Intent {
        entity_mappings, ..
    } = &command.event
    else {
        return;
    };
    let Some(intent) = request.as_intent() else {
        return;
    };
    for mapping in entity_mappings {
        if let Some(entity) = intent.entity(&mapping.entity) {
            ctx.variables
                .set(mapping.variable.clone(), entity.value.clone());
        }
    }
}
