//! The turn engine
//!
//! `run` consumes one inbound request against a conversation state and
//! walks the graph until a node blocks, the stack empties, or a fatal
//! condition trips. Fatal conditions (unclaimed node, iteration bound,
//! handler failure) are caught once here and converted into a terminal
//! debug trace; the call itself only errors on corrupt input state.

use super::escalation;
use super::handler::{Handler, HandlerError, HandlerRegistry};
use super::lifecycle::{NoopObserver, TurnObserver};
use crate::classify::{CascadeConfig, Predictor};
use crate::gateway::CompletionGateway;
use crate::program::{ProgramProvider, ProviderError, VersionModel};
use crate::request::Request;
use crate::slots::{SlotFillConfig, SlotFiller};
use crate::state::{ConversationState, Frame, FrameStack, SessionStorage, StateError, VariableStore};
use crate::trace::{Trace, TraceEvent};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Where in the turn a node is being visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fresh entry: the node has not seen this turn's request
    Entry,
    /// Resumed: the node blocked last turn and the inbound request is for it
    Resume,
}

/// Engine construction knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Version whose model scopes classification
    pub version_id: String,
    /// Node-visit bound guarding against authored cycles
    pub max_iterations: usize,
    pub cascade: CascadeConfig,
    pub slot_fill: SlotFillConfig,
}

impl EngineConfig {
    pub fn new(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            max_iterations: 256,
            cascade: CascadeConfig::default(),
            slot_fill: SlotFillConfig::default(),
        }
    }
}

/// Output of one turn
#[derive(Debug)]
pub struct TurnResult {
    pub state: ConversationState,
    pub trace: Trace,
}

/// Caller-surfaced failures; everything else degrades into the trace
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Shared read-only services handlers reach through the context
pub struct TurnServices {
    pub provider: Arc<dyn ProgramProvider>,
    pub model: Arc<VersionModel>,
    pub predictor: Predictor,
    pub slot_filler: SlotFiller,
}

/// The per-turn mutable draft. Handlers work on this; the engine seals it
/// into an immutable [`ConversationState`] when the turn ends.
pub struct TurnContext<'t> {
    pub stack: FrameStack,
    pub variables: VariableStore,
    pub storage: SessionStorage,
    pub trace: Trace,
    phase: Phase,
    request: Option<Request>,
    turn_id: Uuid,
    services: Arc<TurnServices>,
    observer: &'t dyn TurnObserver,
}

impl TurnContext<'_> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The turn's inbound request, while it is still live
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn services(&self) -> Arc<TurnServices> {
        self.services.clone()
    }

    pub fn emit(&mut self, event: TraceEvent) {
        self.trace.push(event);
    }

    /// Push a sub-flow frame, firing the flow trace and observer hook
    pub fn push_frame(&mut self, frame: Frame) {
        self.trace.push(TraceEvent::flow_enter(frame.program_id.clone()));
        self.observer.on_frame_enter(&frame);
        self.stack.push(frame);
    }

    /// Pop the active frame, firing the flow trace and observer hook
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.stack.pop()?;
        self.trace.push(TraceEvent::flow_exit(frame.program_id.clone()));
        self.observer.on_frame_exit(&frame);
        Some(frame)
    }

    /// Build a frame for `program_id` positioned at its entry node, with
    /// the program's commands armed
    pub async fn new_frame(&self, program_id: &str) -> Result<Frame, HandlerError> {
        let entry = self.services.provider.entry_node(program_id).await?;
        let commands = self.services.provider.program_commands(program_id).await?;
        Ok(Frame::new(program_id, entry).with_commands(commands))
    }

    /// The interaction resolved; interaction-scoped storage is done
    pub fn end_interaction(&mut self) {
        self.storage.end_interaction();
    }
}

/// The turn-execution engine
pub struct TurnEngine {
    provider: Arc<dyn ProgramProvider>,
    nlu: Arc<dyn crate::classify::NluBackend>,
    gateway: Option<Arc<dyn CompletionGateway>>,
    handlers: HandlerRegistry,
    config: EngineConfig,
}

impl TurnEngine {
    pub fn new(
        provider: Arc<dyn ProgramProvider>,
        nlu: Arc<dyn crate::classify::NluBackend>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            nlu,
            gateway: None,
            handlers: HandlerRegistry::new(crate::handlers::default_handlers()),
            config,
        }
    }

    /// Attach the completion gateway that powers hybrid classification
    pub fn with_gateway(mut self, gateway: Arc<dyn CompletionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Replace the default handler set (order is dispatch priority)
    pub fn with_handlers(mut self, handlers: Vec<Arc<dyn Handler>>) -> Self {
        self.handlers = HandlerRegistry::new(handlers);
        self
    }

    /// Run one turn without observation
    pub async fn run(
        &self,
        state: ConversationState,
        request: Option<Request>,
    ) -> Result<TurnResult, EngineError> {
        self.run_with_observer(state, request, &NoopObserver).await
    }

    /// Run one turn, reporting lifecycle events to `observer`
    pub async fn run_with_observer(
        &self,
        state: ConversationState,
        request: Option<Request>,
        observer: &dyn TurnObserver,
    ) -> Result<TurnResult, EngineError> {
        state.validate()?;

        let model = Arc::new(self.provider.get_model(&self.config.version_id).await?);
        let mut predictor = Predictor::new(model.clone(), self.nlu.clone(), self.config.cascade.clone());
        if let Some(gateway) = &self.gateway {
            predictor = predictor.with_gateway(gateway.clone());
        }
        let services = Arc::new(TurnServices {
            provider: self.provider.clone(),
            model,
            predictor,
            slot_filler: SlotFiller::new(self.config.slot_fill.clone()),
        });

        let ConversationState {
            stack,
            variables,
            mut storage,
        } = state;
        storage.begin_turn();

        let phase = if request.is_some() {
            Phase::Resume
        } else {
            Phase::Entry
        };
        let turn_id = Uuid::new_v4();
        tracing::info!(turn_id = %turn_id, phase = ?phase, "Starting turn");

        let mut ctx = TurnContext {
            stack,
            variables,
            storage,
            trace: Trace::new(),
            phase,
            request,
            turn_id,
            services,
            observer,
        };

        self.drive(&mut ctx).await;

        observer.on_turn_end(&ctx.trace);
        tracing::info!(
            turn_id = %turn_id,
            depth = ctx.stack.depth(),
            events = ctx.trace.len(),
            "Turn finished"
        );

        Ok(TurnResult {
            state: ConversationState {
                stack: ctx.stack,
                variables: ctx.variables,
                storage: ctx.storage,
            },
            trace: ctx.trace,
        })
    }

    /// The node-dispatch loop. Fatal conditions end the turn with a debug
    /// trace and leave the stack where it was.
    async fn drive(&self, ctx: &mut TurnContext<'_>) {
        let mut iterations = 0usize;
        let mut first_dispatch = true;

        loop {
            iterations += 1;
            if iterations > self.config.max_iterations {
                tracing::error!(
                    turn_id = %ctx.turn_id,
                    limit = self.config.max_iterations,
                    "Node visit limit exceeded"
                );
                ctx.emit(TraceEvent::debug(format!(
                    "turn aborted: node visit limit of {} exceeded",
                    self.config.max_iterations
                )));
                return;
            }

            // Pop finished frames until one has a cursor.
            let Some(top) = ctx.stack.top() else {
                ctx.emit(TraceEvent::End);
                return;
            };
            let Some(node_id) = top.node_id.clone() else {
                ctx.pop_frame();
                continue;
            };
            let program_id = top.program_id.clone();

            let node = match ctx
                .services
                .provider
                .get_node(&program_id, &node_id)
                .await
            {
                Ok(node) => node,
                Err(err) => {
                    ctx.emit(TraceEvent::debug(format!("turn aborted: {err}")));
                    return;
                }
            };

            let Some(handler) = self.handlers.find(&node) else {
                ctx.emit(TraceEvent::debug(format!(
                    "turn aborted: no handler for node {} of type {}",
                    node.id,
                    node.type_name()
                )));
                return;
            };
            let handler = handler.clone();

            if ctx.phase == Phase::Entry {
                escalation::reset(&mut ctx.storage);
                ctx.emit(TraceEvent::Block {
                    node_id: node.id.clone(),
                });
            }
            tracing::debug!(
                turn_id = %ctx.turn_id,
                node_id = %node.id,
                node_type = node.type_name(),
                phase = ?ctx.phase,
                "Dispatching node"
            );

            let outcome = handler.handle(&node, ctx).await;

            if first_dispatch {
                // The inbound request is spent no matter what the handler did.
                first_dispatch = false;
                ctx.phase = Phase::Entry;
                ctx.request = None;
            }

            match outcome {
                Err(err) => {
                    tracing::error!(turn_id = %ctx.turn_id, node_id = %node.id, error = %err, "Handler failed");
                    ctx.observer.on_handler_error(&node.id, &err);
                    ctx.emit(TraceEvent::debug(format!(
                        "turn aborted: handler error at node {}: {err}",
                        node.id
                    )));
                    return;
                }
                Ok(None) => {
                    if let Some(top) = ctx.stack.top_mut() {
                        top.node_id = None;
                    }
                }
                Ok(Some(next)) if next == node.id => {
                    // The node wants to await the next external input.
                    if let Some(top) = ctx.stack.top_mut() {
                        top.node_id = Some(next);
                    }
                    return;
                }
                Ok(Some(next)) => {
                    if let Some(top) = ctx.stack.top_mut() {
                        top.node_id = Some(next);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        CaptureNode, ChoiceNode, Command, CommandAction, CommandEvent, EscalationPolicy,
        IntentChoice, Node, NodePayload,
    };
    use crate::runtime::testing::{fixture_model, MockNluBackend, MockProvider};
    use crate::trace::TraceEvent;

    fn speak(id: &str, message: &str, next: Option<&str>) -> Node {
        Node::new(
            id,
            NodePayload::Speak {
                prompts: vec![message.into()],
                randomize: false,
                voice: None,
                next: next.map(Into::into),
            },
        )
    }

    fn choice(id: &str, routes: &[(&str, &str)], no_match: Option<EscalationPolicy>) -> Node {
        Node::new(
            id,
            NodePayload::Choice(ChoiceNode {
                choices: routes
                    .iter()
                    .map(|(intent, next)| IntentChoice {
                        intent: (*intent).to_string(),
                        label: None,
                        next: Some((*next).to_string()),
                    })
                    .collect(),
                no_match,
                no_reply: None,
            }),
        )
    }

    fn engine_with(provider: MockProvider) -> (TurnEngine, Arc<MockNluBackend>) {
        crate::runtime::testing::init_test_logging();
        let nlu = Arc::new(MockNluBackend::new());
        let engine = TurnEngine::new(
            Arc::new(provider),
            nlu.clone(),
            EngineConfig::new("v1"),
        );
        (engine, nlu)
    }

    fn main_program() -> Vec<Node> {
        vec![
            speak("s1", "welcome", Some("c1")),
            choice("c1", &[("yes", "s2"), ("no", "e1")], None),
            speak("s2", "great", None),
            Node::new("e1", NodePayload::End),
        ]
    }

    #[tokio::test]
    async fn test_no_request_at_blocking_node_halts_in_place() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let state = ConversationState::at("main", "c1");
        let result = engine.run(state, None).await.unwrap();

        assert_eq!(result.state.stack.depth(), 1);
        assert_eq!(
            result.state.stack.top().unwrap().node_id.as_deref(),
            Some("c1")
        );
        assert!(!result.trace.is_ended());
    }

    #[tokio::test]
    async fn test_entry_walk_until_blocking_node() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let result = engine
            .run(ConversationState::at("main", "s1"), None)
            .await
            .unwrap();

        let events = result.trace.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, TraceEvent::Speak { message, .. } if message == "welcome")));
        assert!(events
            .iter()
            .any(|e| matches!(e, TraceEvent::Choice { .. })));
        assert_eq!(
            result.state.stack.top().unwrap().node_id.as_deref(),
            Some("c1")
        );
    }

    #[tokio::test]
    async fn test_matched_choice_takes_path_and_runs_to_end() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let state = ConversationState::at("main", "c1");
        let result = engine
            .run(state, Some(Request::intent("yes")))
            .await
            .unwrap();

        let events = result.trace.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, TraceEvent::Path { label } if label == "yes")));
        assert!(result.trace.is_ended());
        assert!(result.state.stack.is_empty());
    }

    #[tokio::test]
    async fn test_end_node_ends_conversation() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let state = ConversationState::at("main", "c1");
        let result = engine.run(state, Some(Request::intent("no"))).await.unwrap();

        assert!(result.trace.is_ended());
        assert!(result.state.stack.is_empty());
    }

    #[tokio::test]
    async fn test_command_found_in_outer_frame_after_inner_misses() {
        // F0 arms a jump command; F1 (top) has no commands and no matching
        // choice. The search must fall through to F0 and the jump must pop
        // F1 off the stack.
        let provider = MockProvider::new(fixture_model())
            .with_program(
                "p0",
                vec![
                    choice("n1", &[], None),
                    choice("n2", &[("yes", "n1")], None),
                ],
            )
            .with_program("p1", vec![choice("c_inner", &[], None)])
            .with_commands(
                "p0",
                vec![Command::new(
                    CommandEvent::Intent {
                        name: "help".into(),
                        entity_mappings: vec![],
                        program_scope: None,
                    },
                    CommandAction::Jump {
                        node_id: "n2".into(),
                        program_id: None,
                    },
                )],
            );
        let (engine, _) = engine_with(provider);

        let mut state = ConversationState::at("p0", "n1");
        // Arm p0's commands on its frame, then push the inner frame.
        state.stack.top_mut().unwrap().commands = vec![Command::new(
            CommandEvent::Intent {
                name: "help".into(),
                entity_mappings: vec![],
                program_scope: None,
            },
            CommandAction::Jump {
                node_id: "n2".into(),
                program_id: None,
            },
        )];
        state.stack.push(crate::state::Frame::new("p1", "c_inner"));

        let result = engine
            .run(state, Some(Request::intent("help")))
            .await
            .unwrap();

        assert_eq!(result.state.stack.depth(), 1);
        let top = result.state.stack.top().unwrap();
        assert_eq!(top.program_id, "p0");
        assert_eq!(top.node_id.as_deref(), Some("n2"));
    }

    #[tokio::test]
    async fn test_flow_push_pop_round_trip() {
        let provider = MockProvider::new(fixture_model())
            .with_program(
                "main",
                vec![
                    Node::new(
                        "f1",
                        NodePayload::Flow {
                            program_id: "sub".into(),
                            next: Some("after".into()),
                        },
                    ),
                    choice("after", &[], None),
                ],
            )
            .with_program("sub", vec![speak("x1", "inside", None)]);
        let (engine, _) = engine_with(provider);

        let result = engine
            .run(ConversationState::at("main", "f1"), None)
            .await
            .unwrap();

        let events = result.trace.events();
        assert!(events.iter().any(|e| matches!(
            e,
            TraceEvent::Flow { program_id, action: crate::trace::FlowAction::Enter } if program_id == "sub"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            TraceEvent::Flow { program_id, action: crate::trace::FlowAction::Exit } if program_id == "sub"
        )));
        // Popped back to the outer frame, parked exactly where flow said.
        assert_eq!(result.state.stack.depth(), 1);
        let top = result.state.stack.top().unwrap();
        assert_eq!(top.program_id, "main");
        assert_eq!(top.node_id.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_no_match_escalation_order_and_give_up() {
        let policy = EscalationPolicy {
            prompts: vec!["p one".into(), "p two".into(), "p three".into()],
            randomize: false,
            give_up: Some("rescue".into()),
        };
        let provider = MockProvider::new(fixture_model()).with_program(
            "main",
            vec![
                choice("c1", &[("yes", "s2")], Some(policy)),
                speak("s2", "great", None),
                choice("rescue", &[], None),
            ],
        );
        let (engine, _) = engine_with(provider);

        let mut state = ConversationState::at("main", "c1");
        for expected in ["p one", "p two", "p three"] {
            let result = engine
                .run(state, Some(Request::text("gibberish")))
                .await
                .unwrap();
            state = result.state;
            assert!(
                result.trace.events().iter().any(
                    |e| matches!(e, TraceEvent::Text { message } if message == expected)
                ),
                "expected prompt {expected}"
            );
            assert_eq!(state.stack.top().unwrap().node_id.as_deref(), Some("c1"));
        }

        // Fourth unmatched turn follows the give-up target.
        let result = engine
            .run(state, Some(Request::text("gibberish")))
            .await
            .unwrap();
        assert_eq!(
            result.state.stack.top().unwrap().node_id.as_deref(),
            Some("rescue")
        );
    }

    #[tokio::test]
    async fn test_fresh_entry_resets_no_match_counter() {
        let policy = EscalationPolicy {
            prompts: vec!["p one".into(), "p two".into()],
            randomize: false,
            give_up: None,
        };
        let provider = MockProvider::new(fixture_model()).with_program(
            "main",
            vec![
                speak("s1", "welcome", Some("c1")),
                choice("c1", &[("yes", "s1")], Some(policy)),
            ],
        );
        let (engine, _) = engine_with(provider);

        // Two misses move the counter to 2.
        let mut state = ConversationState::at("main", "c1");
        for _ in 0..2 {
            state = engine
                .run(state, Some(Request::text("gibberish")))
                .await
                .unwrap()
                .state;
        }

        // A fresh entry pass through c1 resets; the next miss prompts from
        // the start of the list again.
        state.stack.top_mut().unwrap().node_id = Some("s1".into());
        state = engine.run(state, None).await.unwrap().state;
        let result = engine
            .run(state, Some(Request::text("gibberish")))
            .await
            .unwrap();
        assert!(result
            .trace
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Text { message } if message == "p one")));
    }

    #[tokio::test]
    async fn test_slot_filling_converges_over_two_turns() {
        let provider = MockProvider::new(fixture_model()).with_program(
            "main",
            vec![
                Node::new(
                    "cap",
                    NodePayload::Capture(CaptureNode {
                        variable: None,
                        intent: Some("book_flight".into()),
                        allow_interrupt: false,
                        no_reply: None,
                        next: Some("done".into()),
                    }),
                ),
                speak("done", "booked", None),
            ],
        );
        let (engine, _) = engine_with(provider);

        // Turn 1: the utterance carries only the city.
        let state = ConversationState::at("main", "cap");
        let result = engine
            .run(state, Some(Request::text("fly to paris")))
            .await
            .unwrap();
        assert!(result
            .trace
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Text { message } if message == "What is the date?")));
        assert_eq!(
            result.state.stack.top().unwrap().node_id.as_deref(),
            Some("cap")
        );

        // Turn 2: supply the date; the pending request resolves and the
        // normal transition fires.
        let result = engine
            .run(result.state, Some(Request::text("tomorrow")))
            .await
            .unwrap();
        assert_eq!(
            result.state.variables.get("city"),
            Some(&serde_json::Value::from("Paris"))
        );
        assert_eq!(
            result.state.variables.get("date"),
            Some(&serde_json::Value::from("tomorrow"))
        );
        assert!(result
            .trace
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Speak { message, .. } if message == "booked")));
        assert!(result.trace.is_ended());
    }

    #[tokio::test]
    async fn test_no_handler_is_fatal_with_debug_trace() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let nlu = Arc::new(MockNluBackend::new());
        let engine = TurnEngine::new(Arc::new(provider), nlu, EngineConfig::new("v1"))
            .with_handlers(vec![]);

        let state = ConversationState::at("main", "s1");
        let result = engine.run(state, None).await.unwrap();

        assert!(result.trace.events().iter().any(
            |e| matches!(e, TraceEvent::Debug { message } if message.contains("no handler"))
        ));
        // The stack did not advance.
        assert_eq!(
            result.state.stack.top().unwrap().node_id.as_deref(),
            Some("s1")
        );
    }

    #[tokio::test]
    async fn test_iteration_bound_trips_on_authored_cycle() {
        let provider = MockProvider::new(fixture_model()).with_program(
            "main",
            vec![
                Node::new(
                    "a",
                    NodePayload::GoTo {
                        node_id: "b".into(),
                        program_id: None,
                    },
                ),
                Node::new(
                    "b",
                    NodePayload::GoTo {
                        node_id: "a".into(),
                        program_id: None,
                    },
                ),
            ],
        );
        let nlu = Arc::new(MockNluBackend::new());
        let mut config = EngineConfig::new("v1");
        config.max_iterations = 10;
        let engine = TurnEngine::new(Arc::new(provider), nlu, config);

        let result = engine
            .run(ConversationState::at("main", "a"), None)
            .await
            .unwrap();
        assert!(result.trace.events().iter().any(
            |e| matches!(e, TraceEvent::Debug { message } if message.contains("visit limit"))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_state_is_rejected() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let state = ConversationState {
            stack: FrameStack::default(),
            variables: VariableStore::new(),
            storage: SessionStorage::new(),
        };
        let err = engine.run(state, None).await.unwrap_err();
        assert!(matches!(err, EngineError::State(StateError::EmptyStack)));
    }

    #[tokio::test]
    async fn test_unmatched_text_degrades_to_no_match_without_nlu() {
        // No queued NLU response: the backend errors, the cascade degrades,
        // and the node escalates instead of the turn failing.
        let policy = EscalationPolicy {
            prompts: vec!["try again".into()],
            randomize: false,
            give_up: None,
        };
        let provider = MockProvider::new(fixture_model()).with_program(
            "main",
            vec![choice("c1", &[("yes", "c1")], Some(policy))],
        );
        let (engine, _) = engine_with(provider);

        let result = engine
            .run(
                ConversationState::at("main", "c1"),
                Some(Request::text("qwertyuiop")),
            )
            .await
            .unwrap();
        assert!(result
            .trace
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Text { message } if message == "try again")));
    }

    #[tokio::test]
    async fn test_text_matching_choice_via_nlc() {
        let provider = MockProvider::new(fixture_model()).with_program("main", main_program());
        let (engine, _) = engine_with(provider);

        let result = engine
            .run(
                ConversationState::at("main", "c1"),
                Some(Request::text("yeah")),
            )
            .await
            .unwrap();
        assert!(result
            .trace
            .events()
            .iter()
            .any(|e| matches!(e, TraceEvent::Path { label } if label == "yes")));
    }

    #[tokio::test]
    async fn test_command_entity_mappings_land_in_variables() {
        use crate::program::EntityMapping;
        let provider = MockProvider::new(fixture_model())
            .with_program("main", main_program())
            .with_program("help_flow", vec![choice("h1", &[], None)]);
        let (engine, _) = engine_with(provider);

        let mut state = ConversationState::at("main", "c1");
        state.stack.top_mut().unwrap().commands = vec![Command::new(
            CommandEvent::Intent {
                name: "help".into(),
                entity_mappings: vec![EntityMapping {
                    entity: "topic".into(),
                    variable: "help_topic".into(),
                }],
                program_scope: None,
            },
            CommandAction::Push {
                program_id: "help_flow".into(),
            },
        )];

        let request = crate::request::IntentRequest::new("help").with_entity("topic", "billing");
        let result = engine
            .run(state, Some(Request::Intent(request)))
            .await
            .unwrap();

        assert_eq!(
            result.state.variables.get("help_topic"),
            Some(&serde_json::Value::from("billing"))
        );
        assert_eq!(result.state.stack.depth(), 2);
    }

    #[tokio::test]
    async fn test_push_command_enters_subflow() {
        let provider = MockProvider::new(fixture_model())
            .with_program("main", main_program())
            .with_program("help_flow", vec![choice("h1", &[], None)]);
        let (engine, _) = engine_with(provider);

        let mut state = ConversationState::at("main", "c1");
        state.stack.top_mut().unwrap().commands = vec![Command::new(
            CommandEvent::Intent {
                name: "help".into(),
                entity_mappings: vec![],
                program_scope: None,
            },
            CommandAction::Push {
                program_id: "help_flow".into(),
            },
        )];

        let result = engine
            .run(state, Some(Request::intent("help")))
            .await
            .unwrap();
        assert_eq!(result.state.stack.depth(), 2);
        let top = result.state.stack.top().unwrap();
        assert_eq!(top.program_id, "help_flow");
        assert_eq!(top.node_id.as_deref(), Some("h1"));
    }
}
