//! Node types
//!
//! A node is one authored step of a flow graph. The engine never mutates
//! nodes; it resolves them by id through the program provider and dispatches
//! on the payload variant.

use super::{NodeId, ProgramId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable authored node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, payload: NodePayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Stable name of the payload variant, for logs and error messages
    pub fn type_name(&self) -> &'static str {
        match &self.payload {
            NodePayload::Start { .. } => "start",
            NodePayload::Speak { .. } => "speak",
            NodePayload::Text { .. } => "text",
            NodePayload::Visual { .. } => "visual",
            NodePayload::Choice(_) => "choice",
            NodePayload::Capture(_) => "capture",
            NodePayload::Flow { .. } => "flow",
            NodePayload::SetVariables { .. } => "set_variables",
            NodePayload::Condition { .. } => "condition",
            NodePayload::GoTo { .. } => "go_to",
            NodePayload::End => "end",
        }
    }
}

/// Typed payload per authored node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    /// Entry point of a program
    Start {
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// Spoken output; one prompt is selected per visit
    Speak {
        prompts: Vec<String>,
        #[serde(default)]
        randomize: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// Plain text output for chat surfaces
    Text {
        messages: Vec<String>,
        #[serde(default)]
        randomize: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// Visual payload (image card)
    Visual {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        device: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// Blocking question with intent-routed choices
    Choice(ChoiceNode),

    /// Blocking input capture (raw utterance or intent entities)
    Capture(CaptureNode),

    /// Enter a sub-flow, resuming at `next` once it finishes
    Flow {
        program_id: ProgramId,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// Write variables and continue
    SetVariables {
        assignments: Vec<Assignment>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<NodeId>,
    },

    /// First-match branch over variable conditions
    Condition {
        branches: Vec<ConditionBranch>,
        #[serde(skip_serializing_if = "Option::is_none")]
        otherwise: Option<NodeId>,
    },

    /// Jump to a node, optionally in another program
    GoTo {
        node_id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        program_id: Option<ProgramId>,
    },

    /// End the whole conversation
    End,
}

/// A blocking multiple-choice interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceNode {
    pub choices: Vec<IntentChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_match: Option<EscalationPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_reply: Option<NoReplyPolicy>,
}

impl ChoiceNode {
    /// Find the choice matching a (normalized) intent name
    pub fn choice_for(&self, intent_name: &str) -> Option<&IntentChoice> {
        let wanted = crate::request::normalize_name(intent_name);
        self.choices
            .iter()
            .find(|c| crate::request::normalize_name(&c.intent) == wanted)
    }
}

/// One intent-routed branch of a choice node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentChoice {
    pub intent: String,
    /// Button label; falls back to the intent name when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

/// A blocking capture of user input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureNode {
    /// Store the entire raw utterance into this variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Or fill the required entities of this intent (slot-filling)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Whether an unrelated, confidently-recognized global intent may
    /// abandon an in-progress capture
    #[serde(default)]
    pub allow_interrupt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_reply: Option<NoReplyPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

/// Ordered re-prompt list with an optional give-up jump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub randomize: bool,
    /// Node to jump to once the prompts are exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub give_up: Option<NodeId>,
}

/// No-reply escalation plus the timeout it re-arms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoReplyPolicy {
    #[serde(flatten)]
    pub policy: EscalationPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u32>,
}

/// One variable assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub variable: String,
    pub value: ValueSource,
}

/// Where an assigned value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ValueSource {
    Literal { value: Value },
    Variable { name: String },
}

/// One branch of a condition node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBranch {
    pub condition: Condition,
    /// Port label recorded in the `Path` trace when taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

/// A variable predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Eq { variable: String, value: Value },
    Ne { variable: String, value: Value },
    Gt { variable: String, value: f64 },
    Lt { variable: String, value: f64 },
    Contains { variable: String, value: String },
    IsSet { variable: String },
}
