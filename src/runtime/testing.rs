//! Mock implementations for testing
//!
//! These mocks enable turn-level testing without real I/O: an in-memory
//! program provider, a queued-response NLU backend, and a queued-response
//! completion gateway.

use crate::classify::{NluBackend, NluError, NluRequest, NluResponse};
use crate::gateway::{
    CompletionGateway, CompletionRequest, CompletionResponse, CompletionStream, GatewayError,
    TokenUsage,
};
use crate::program::{
    Command, EntityKind, EntityModel, EntityVariant, GlobalPrompts, IntentModel, Node, NodeId,
    Platform, ProgramProvider, ProviderError, VersionModel,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Install a logging subscriber for a test run. Safe to call repeatedly;
/// respects `RUST_LOG`.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Mock Program Provider
// ============================================================================

struct MockProgram {
    entry: NodeId,
    nodes: HashMap<NodeId, Node>,
    commands: Vec<Command>,
}

/// In-memory program provider
pub struct MockProvider {
    programs: HashMap<String, MockProgram>,
    model: VersionModel,
}

impl MockProvider {
    pub fn new(model: VersionModel) -> Self {
        Self {
            programs: HashMap::new(),
            model,
        }
    }

    /// Register a program; the first node is its entry
    pub fn with_program(mut self, program_id: impl Into<String>, nodes: Vec<Node>) -> Self {
        let entry = nodes
            .first()
            .map(|node| node.id.clone())
            .unwrap_or_default();
        self.programs.insert(
            program_id.into(),
            MockProgram {
                entry,
                nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
                commands: Vec::new(),
            },
        );
        self
    }

    pub fn with_commands(mut self, program_id: &str, commands: Vec<Command>) -> Self {
        if let Some(program) = self.programs.get_mut(program_id) {
            program.commands = commands;
        }
        self
    }
}

#[async_trait]
impl ProgramProvider for MockProvider {
    async fn get_node(&self, program_id: &str, node_id: &str) -> Result<Node, ProviderError> {
        let program = self
            .programs
            .get(program_id)
            .ok_or_else(|| ProviderError::UnknownProgram(program_id.to_string()))?;
        program
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownNode {
                program_id: program_id.to_string(),
                node_id: node_id.to_string(),
            })
    }

    async fn entry_node(&self, program_id: &str) -> Result<NodeId, ProviderError> {
        self.programs
            .get(program_id)
            .map(|program| program.entry.clone())
            .ok_or_else(|| ProviderError::UnknownProgram(program_id.to_string()))
    }

    async fn program_commands(&self, program_id: &str) -> Result<Vec<Command>, ProviderError> {
        Ok(self
            .programs
            .get(program_id)
            .map(|program| program.commands.clone())
            .unwrap_or_default())
    }

    async fn get_model(&self, _version_id: &str) -> Result<VersionModel, ProviderError> {
        Ok(self.model.clone())
    }
}

// ============================================================================
// Mock NLU Backend
// ============================================================================

/// NLU backend that returns queued responses
pub struct MockNluBackend {
    responses: Mutex<VecDeque<Result<NluResponse, NluError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<NluRequest>>,
}

impl MockNluBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: NluResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: NluError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_intent(&self, name: &str, confidence: f64) {
        self.queue_response(NluResponse {
            predicted_intent: name.to_string(),
            confidence,
            entities: vec![],
            ranked_intents: vec![],
        });
    }

    pub fn recorded_requests(&self) -> Vec<NluRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockNluBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NluBackend for MockNluBackend {
    async fn predict(&self, request: &NluRequest) -> Result<NluResponse, NluError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NluError::Transport("no mock response queued".into())))
    }
}

// ============================================================================
// Mock Completion Gateway
// ============================================================================

/// Gateway that returns queued completions
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<CompletionResponse, GatewayError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(CompletionResponse {
            text: text.to_string(),
            usage: TokenUsage::default(),
        }));
    }

    pub fn queue_error(&self, error: GatewayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionGateway for MockGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::network("no mock response queued")))
    }

    async fn stream(&self, _request: &CompletionRequest) -> Result<CompletionStream, GatewayError> {
        Err(GatewayError::unknown("streaming not mocked"))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Model fixtures
// ============================================================================

/// A small chat model: two routable intents plus one slot-filling intent
pub fn fixture_model() -> VersionModel {
    VersionModel {
        intents: vec![
            IntentModel {
                name: "yes".into(),
                utterances: vec!["yes".into(), "sure".into(), "yeah".into()],
                required_entities: vec![],
                entity_prompts: HashMap::new(),
            },
            IntentModel {
                name: "no".into(),
                utterances: vec!["no".into(), "nope".into()],
                required_entities: vec![],
                entity_prompts: HashMap::new(),
            },
            IntentModel {
                name: "book_flight".into(),
                utterances: vec!["fly to {city}".into()],
                required_entities: vec!["city".into(), "date".into()],
                entity_prompts: HashMap::new(),
            },
            IntentModel {
                name: "help".into(),
                utterances: vec!["help".into(), "help me".into()],
                required_entities: vec![],
                entity_prompts: HashMap::new(),
            },
        ],
        entities: vec![
            EntityModel {
                name: "city".into(),
                kind: EntityKind::Custom {
                    values: vec![
                        EntityVariant {
                            value: "Paris".into(),
                            synonyms: vec![],
                        },
                        EntityVariant {
                            value: "Tokyo".into(),
                            synonyms: vec![],
                        },
                    ],
                },
            },
            EntityModel {
                name: "date".into(),
                kind: EntityKind::Freeform,
            },
        ],
        locale: "en-US".into(),
        platform: Platform::Chat,
        global_prompts: GlobalPrompts::default(),
    }
}
