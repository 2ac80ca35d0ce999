//! Statistical NLU backend client
//!
//! The external intent+entity classifier service. Calls are bounded by a
//! per-call timeout; any failure here degrades the cascade instead of
//! propagating.

use crate::program::Platform;
use crate::request::EntityValue;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One classification request to the backend
#[derive(Debug, Clone, Serialize)]
pub struct NluRequest {
    pub utterance: String,
    pub candidate_intents: Vec<String>,
    pub candidate_entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_intents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_entities: Option<Vec<String>>,
    pub locale: String,
    pub platform: Platform,
}

/// The backend's ranked answer
#[derive(Debug, Clone, Deserialize)]
pub struct NluResponse {
    pub predicted_intent: String,
    pub confidence: f64,
    #[serde(default)]
    pub entities: Vec<EntityValue>,
    #[serde(default)]
    pub ranked_intents: Vec<RankedIntent>,
}

/// One candidate in the backend's ranking
#[derive(Debug, Clone, Deserialize)]
pub struct RankedIntent {
    pub name: String,
    pub confidence: f64,
}

/// Backend failures; all of them degrade the cascade
#[derive(Debug, Error)]
pub enum NluError {
    #[error("NLU request timed out after {0:?}")]
    Timeout(Duration),
    #[error("NLU backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("NLU transport error: {0}")]
    Transport(String),
    #[error("NLU response could not be decoded: {0}")]
    Decode(String),
}

/// Client seam for the statistical backend
#[async_trait]
pub trait NluBackend: Send + Sync {
    async fn predict(&self, request: &NluRequest) -> Result<NluResponse, NluError>;
}

#[async_trait]
impl<T: NluBackend + ?Sized> NluBackend for Arc<T> {
    async fn predict(&self, request: &NluRequest) -> Result<NluResponse, NluError> {
        (**self).predict(request).await
    }
}

/// Backend connection settings
#[derive(Debug, Clone)]
pub struct NluConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl NluConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("NLU_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("NLU_API_KEY").ok(),
            timeout: std::env::var("NLU_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}

/// Reqwest-backed NLU client
pub struct HttpNluBackend {
    client: Client,
    config: NluConfig,
}

impl HttpNluBackend {
    pub fn new(config: NluConfig) -> Result<Self, NluError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NluError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NluBackend for HttpNluBackend {
    async fn predict(&self, request: &NluRequest) -> Result<NluResponse, NluError> {
        let url = format!("{}/v1/predict", self.config.base_url.trim_end_matches('/'));

        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NluError::Timeout(self.config.timeout)
            } else {
                NluError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NluError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<NluResponse>()
            .await
            .map_err(|e| NluError::Decode(e.to_string()))
    }
}
