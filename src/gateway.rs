//! LLM completion gateway
//!
//! Client side of the completion service the hybrid classification tier
//! talks to. Moderation and quota rejections are ordinary classification
//! failures here, never fatal to a turn.

pub mod error;
pub mod http;
pub mod stream;
pub mod types;

pub use error::{GatewayError, GatewayErrorKind};
pub use http::HttpGateway;
pub use stream::{CompletionChunk, CompletionStream};
pub use types::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, TokenUsage};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Client for the completion service
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Single-shot completion
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError>;

    /// Incremental completion; the caller pulls chunks explicitly
    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GatewayError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionGateway + ?Sized> CompletionGateway for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        (**self).complete(request).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GatewayError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    /// Chat-completions endpoint base URL
    pub base_url: String,
    pub model: String,
    /// Per-call timeout applied when the request doesn't carry its own
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("COMPLETION_API_KEY").ok(),
            base_url: std::env::var("COMPLETION_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("COMPLETION_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("COMPLETION_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}
