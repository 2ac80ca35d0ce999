//! Observable turn output
//!
//! Every turn produces an ordered, append-only sequence of trace events.
//! The rendering layer turns these into speech, UI, or logs; the core only
//! appends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observable effect of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Spoken output (voice platforms)
    Speak {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
    },

    /// Plain text output (chat platforms)
    Text { message: String },

    /// An image or other visual payload
    Visual {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        device: Option<String>,
    },

    /// Buttons/chips presented alongside a question
    Choice { buttons: Vec<ChoiceButton> },

    /// A named transition port was taken
    Path { label: String },

    /// A node was entered fresh
    Block { node_id: String },

    /// A sub-flow was entered or exited
    Flow { program_id: String, action: FlowAction },

    /// The cursor jumped somewhere outside normal port flow
    GoTo {
        node_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        program_id: Option<String>,
    },

    /// Diagnostic information for authors; never rendered to end users
    Debug { message: String },

    /// Re-arm the client-side reply timeout
    NoReply {
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u32>,
    },

    /// The conversation is over
    End,
}

/// Direction of a `Flow` trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Enter,
    Exit,
}

/// One selectable choice surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceButton {
    pub label: String,
    /// Request to feed back into the engine when tapped
    pub request: Value,
}

impl TraceEvent {
    pub fn speak(message: impl Into<String>) -> Self {
        TraceEvent::Speak {
            message: message.into(),
            voice: None,
        }
    }

    pub fn text(message: impl Into<String>) -> Self {
        TraceEvent::Text {
            message: message.into(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        TraceEvent::Debug {
            message: message.into(),
        }
    }

    pub fn path(label: impl Into<String>) -> Self {
        TraceEvent::Path {
            label: label.into(),
        }
    }

    pub fn flow_enter(program_id: impl Into<String>) -> Self {
        TraceEvent::Flow {
            program_id: program_id.into(),
            action: FlowAction::Enter,
        }
    }

    pub fn flow_exit(program_id: impl Into<String>) -> Self {
        TraceEvent::Flow {
            program_id: program_id.into(),
            action: FlowAction::Exit,
        }
    }
}

/// Append-only accumulator for a turn's trace events
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the trace already carries a terminal `End` event
    pub fn is_ended(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, TraceEvent::End))
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl IntoIterator for Trace {
    type Item = TraceEvent;
    type IntoIter = std::vec::IntoIter<TraceEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_preserves_order() {
        let mut trace = Trace::new();
        trace.push(TraceEvent::speak("hello"));
        trace.push(TraceEvent::path("yes"));
        trace.push(TraceEvent::End);

        assert_eq!(trace.len(), 3);
        assert!(matches!(trace.events()[0], TraceEvent::Speak { .. }));
        assert!(matches!(trace.events()[2], TraceEvent::End));
        assert!(trace.is_ended());
    }

    #[test]
    fn test_trace_event_tags() {
        let json = serde_json::to_value(TraceEvent::flow_enter("p2")).unwrap();
        assert_eq!(json["type"], "flow");
        assert_eq!(json["action"], "enter");

        let json = serde_json::to_value(TraceEvent::NoReply {
            timeout_secs: Some(10),
        })
        .unwrap();
        assert_eq!(json["type"], "no_reply");
        assert_eq!(json["timeout_secs"], 10);
    }

    #[test]
    fn test_trace_serializes_as_bare_array() {
        let mut trace = Trace::new();
        trace.push(TraceEvent::text("hi"));
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.is_array());
    }
}
