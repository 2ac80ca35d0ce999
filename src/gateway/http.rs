//! Chat-completions HTTP client
//!
//! Speaks the OpenAI-compatible chat wire format so one client covers the
//! hosted gateways we deploy against. Requests are translated into wire
//! types, responses normalized back, and failures classified for the
//! cascade's retry/degrade decisions.

use super::error::GatewayError;
use super::stream::CompletionStream;
use super::types::{CompletionRequest, CompletionResponse, TokenUsage};
use super::{CompletionGateway, GatewayConfig};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reqwest-backed completion gateway
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn translate_request(&self, request: &CompletionRequest, stream: bool) -> WireRequest {
        WireRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GatewayError> {
        let wire = self.translate_request(request, stream);
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        let mut builder = self.client.post(self.endpoint()).timeout(timeout).json(&wire);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                GatewayError::network(format!("Connection failed: {e}"))
            } else {
                GatewayError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionGateway for HttpGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, GatewayError> {
        let response = self.send(request, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read response: {e}")))?;

        let wire: WireResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::unknown(format!("Failed to parse response: {e}")))?;

        let text = wire
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            usage: wire.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, GatewayError> {
        let response = self.send(request, true).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| GatewayError::network(format!("Stream read failed: {e}")))
            })
            .boxed();
        Ok(CompletionStream::new(bytes))
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

/// Map an HTTP failure onto a gateway error kind.
///
/// Moderation and quota rejections get their own kinds so the cascade can
/// absorb them as classification failures instead of retrying.
fn classify_error(status: reqwest::StatusCode, body: &str) -> GatewayError {
    let lowered = body.to_ascii_lowercase();
    match status.as_u16() {
        401 | 403 => GatewayError::auth(format!("Authentication failed: {body}")),
        402 => GatewayError::quota(format!("Quota exceeded: {body}")),
        429 if lowered.contains("quota") => GatewayError::quota(format!("Quota exceeded: {body}")),
        429 => {
            let mut err = GatewayError::rate_limit(format!("Rate limited: {body}"));
            if let Some(retry_after) = parse_retry_after(body) {
                err = err.with_retry_after(retry_after);
            }
            err
        }
        400 if lowered.contains("content_policy") || lowered.contains("moderation") => {
            GatewayError::moderation(format!("Content rejected: {body}"))
        }
        400 => GatewayError::invalid_request(format!("Invalid request: {body}")),
        500..=599 => GatewayError::server_error(format!("Server error: {body}")),
        _ => GatewayError::unknown(format!("HTTP {status}: {body}")),
    }
}

fn parse_retry_after(body: &str) -> Option<Duration> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed
        .get("error")
        .and_then(|e| e.get("retry_after"))
        .and_then(serde_json::Value::as_f64)
        .map(Duration::from_secs_f64)
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
