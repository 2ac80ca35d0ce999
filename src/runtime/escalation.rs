//! No-match / no-reply escalation
//!
//! Two independent but structurally identical state machines. Each is a
//! counter over an ordered prompt list: while prompts remain, consume one
//! and re-prompt; once exhausted, clear the counter and either jump to the
//! authored give-up target or fall back once to the project-wide prompt.
//! Counters reset exactly on fresh (entry-phase) node visits.

use crate::program::{EscalationPolicy, NodeId, VersionModel};
use crate::state::{SessionStorage, StorageScope, TypedKey};
use rand::seq::SliceRandom;

const NO_MATCH_COUNT: TypedKey<u32> = TypedKey::new("no_match_count", StorageScope::Interaction);
const NO_REPLY_COUNT: TypedKey<u32> = TypedKey::new("no_reply_count", StorageScope::Interaction);

/// Which machine is escalating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationKind {
    NoMatch,
    NoReply,
}

impl EscalationKind {
    fn counter(self) -> TypedKey<u32> {
        match self {
            EscalationKind::NoMatch => NO_MATCH_COUNT,
            EscalationKind::NoReply => NO_REPLY_COUNT,
        }
    }

    fn global_prompt(self, model: &VersionModel) -> String {
        match self {
            EscalationKind::NoMatch => model.global_prompts.no_match_prompt().to_string(),
            EscalationKind::NoReply => model.global_prompts.no_reply_prompt().to_string(),
        }
    }
}

/// What the caller should do next
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    /// Say this prompt and halt on the current node
    Reprompt { prompt: String },
    /// Prompts exhausted: jump to the give-up target
    GiveUp { target: NodeId },
    /// Prompts exhausted, no target authored: say the project-wide prompt
    /// once and end the interaction
    Exhausted { prompt: String },
}

/// Consume one escalation step
pub fn consume(
    kind: EscalationKind,
    policy: Option<&EscalationPolicy>,
    model: &VersionModel,
    storage: &mut SessionStorage,
) -> EscalationOutcome {
    let prompts = policy.map(|p| p.prompts.as_slice()).unwrap_or_default();
    let counter = storage.get(kind.counter()).unwrap_or(0);

    if let Some(prompt) = select_prompt(prompts, counter, policy.is_some_and(|p| p.randomize)) {
        storage.put(kind.counter(), &(counter + 1));
        return EscalationOutcome::Reprompt { prompt };
    }

    storage.remove(kind.counter());
    match policy.and_then(|p| p.give_up.clone()) {
        Some(target) => EscalationOutcome::GiveUp { target },
        None => EscalationOutcome::Exhausted {
            prompt: kind.global_prompt(model),
        },
    }
}

fn select_prompt(prompts: &[String], counter: u32, randomize: bool) -> Option<String> {
    if (counter as usize) >= prompts.len() {
        return None;
    }
    if randomize {
        prompts.choose(&mut rand::thread_rng()).cloned()
    } else {
        prompts.get(counter as usize).cloned()
    }
}

/// Clear both counters; invoked by the engine on every fresh node entry
pub fn reset(storage: &mut SessionStorage) {
    storage.remove(NO_MATCH_COUNT);
    storage.remove(NO_REPLY_COUNT);
}
