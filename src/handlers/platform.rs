//! Platform policy
//!
//! The small per-channel surface the generic handlers are parameterized
//! by: how choices render, how entity values land in variables, and how
//! command events match requests. One generic handler plus two policies
//! replaces per-platform handler copies.

use crate::program::{ChoiceNode, CommandEvent};
use crate::request::{normalize_name, EntityValue, Request};
use crate::trace::ChoiceButton;
use serde_json::{json, Value};

/// Per-channel behavior of the generic handlers
pub trait PlatformPolicy: Send + Sync {
    /// Buttons surfaced for a choice node (the prompt source)
    fn choice_buttons(&self, node: &ChoiceNode) -> Vec<ChoiceButton>;

    /// How a captured entity value lands in the variable store (the slot
    /// mapper)
    fn map_entity_value(&self, entity: &EntityValue) -> Value;

    /// Whether a command event matches this request (the command matcher)
    fn event_matches(&self, event: &CommandEvent, request: &Request) -> bool;
}

fn name_match(event: &CommandEvent, request: &Request) -> bool {
    match (event, request) {
        (CommandEvent::Intent { name, .. }, Request::Intent(intent)) => {
            normalize_name(name) == normalize_name(&intent.name)
        }
        (CommandEvent::Trace { name }, Request::Action { name: action, .. }) => {
            normalize_name(name) == normalize_name(action)
        }
        _ => false,
    }
}

/// Chat surfaces: rendered buttons, structured values
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatPolicy;

impl PlatformPolicy for ChatPolicy {
    fn choice_buttons(&self, node: &ChoiceNode) -> Vec<ChoiceButton> {
        node.choices
            .iter()
            .map(|choice| ChoiceButton {
                label: choice.label.clone().unwrap_or_else(|| choice.intent.clone()),
                request: json!({ "type": "intent", "name": choice.intent }),
            })
            .collect()
    }

    fn map_entity_value(&self, entity: &EntityValue) -> Value {
        entity.value.clone()
    }

    fn event_matches(&self, event: &CommandEvent, request: &Request) -> bool {
        name_match(event, request)
    }
}

/// Voice surfaces: no visual buttons, spoken values are strings
#[derive(Debug, Clone, Copy, Default)]
pub struct VoicePolicy;

impl PlatformPolicy for VoicePolicy {
    fn choice_buttons(&self, _node: &ChoiceNode) -> Vec<ChoiceButton> {
        Vec::new()
    }

    fn map_entity_value(&self, entity: &EntityValue) -> Value {
        match &entity.value {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    fn event_matches(&self, event: &CommandEvent, request: &Request) -> bool {
        name_match(event, request)
    }
}
