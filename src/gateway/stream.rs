//! Pull-based completion streaming
//!
//! An explicit chunk iterator over the gateway's SSE wire format. The
//! consumer pulls with [`CompletionStream::next_chunk`] in a plain loop and
//! may cancel at any await point through the stream's cancellation token;
//! cumulative token accounting is kept on the stream itself.

use super::error::GatewayError;
use super::types::TokenUsage;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, GatewayError>> + Send>>;

/// One incremental piece of completion text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionChunk {
    pub delta: String,
}

/// Incremental completion with explicit pull and cancellation
pub struct CompletionStream {
    bytes: ByteStream,
    buffer: String,
    decoded: VecDeque<CompletionChunk>,
    cancel: CancellationToken,
    /// Server-reported usage, when the gateway sends it
    reported_usage: Option<TokenUsage>,
    /// Fallback accounting when the server never reports usage
    delta_count: u64,
    done: bool,
}

impl CompletionStream {
    pub(crate) fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            buffer: String::new(),
            decoded: VecDeque::new(),
            cancel: CancellationToken::new(),
            reported_usage: None,
            delta_count: 0,
            done: false,
        }
    }

    /// Token that aborts the stream when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cumulative token usage so far. Server-reported figures win; until
    /// they arrive, completion tokens are approximated by the chunk count.
    pub fn usage(&self) -> TokenUsage {
        self.reported_usage.unwrap_or(TokenUsage {
            prompt_tokens: 0,
            completion_tokens: self.delta_count,
        })
    }

    /// Pull the next chunk. `Ok(None)` means the stream is finished or was
    /// cancelled; pulling again after that stays `Ok(None)`.
    pub async fn next_chunk(&mut self) -> Result<Option<CompletionChunk>, GatewayError> {
        loop {
            if let Some(chunk) = self.decoded.pop_front() {
                return Ok(Some(chunk));
            }
            if self.done {
                return Ok(None);
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.done = true;
                    return Ok(None);
                }
                next = self.bytes.next() => match next {
                    None => {
                        self.done = true;
                    }
                    Some(Err(err)) => {
                        self.done = true;
                        return Err(err);
                    }
                    Some(Ok(bytes)) => self.feed(&bytes),
                }
            }
        }
    }

    /// Drain the rest of the stream, returning the concatenated text
    pub async fn collect_text(&mut self) -> Result<String, GatewayError> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await? {
            text.push_str(&chunk.delta);
        }
        Ok(text)
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                continue;
            }

            let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
                tracing::debug!(line = %data, "Skipping undecodable stream event");
                continue;
            };
            if let Some(usage) = event.usage {
                self.reported_usage = Some(TokenUsage {
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                });
            }
            for choice in event.choices {
                if let Some(delta) = choice.delta.content {
                    if !delta.is_empty() {
                        self.delta_count += 1;
                        self.decoded.push_back(CompletionChunk { delta });
                    }
                }
            }
        }
    }
}

// Wire format of one SSE event

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(frames: Vec<&str>) -> CompletionStream {
        let items: Vec<Result<Vec<u8>, GatewayError>> = frames
            .into_iter()
            .map(|frame| Ok(frame.as_bytes().to_vec()))
            .collect();
        CompletionStream::new(Box::pin(futures::stream::iter(items)))
    }

    #[tokio::test]
    async fn test_decodes_sse_deltas_in_order() {
        let mut stream = stream_of(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        ]);

        assert_eq!(stream.next_chunk().await.unwrap().unwrap().delta, "hel");
        assert_eq!(stream.next_chunk().await.unwrap().unwrap().delta, "lo");
        assert!(stream.next_chunk().await.unwrap().is_none());
        // Pulling past the end stays finished
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_frames_are_reassembled() {
        let mut stream = stream_of(vec![
            "data: {\"choices\":[{\"delta\"",
            ":{\"content\":\"split\"}}]}\n",
            "data: [DONE]\n",
        ]);
        assert_eq!(stream.next_chunk().await.unwrap().unwrap().delta, "split");
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usage_reporting_prefers_server_figures() {
        let mut stream = stream_of(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":4}}\n",
            "data: [DONE]\n",
        ]);
        let text = stream.collect_text().await.unwrap();
        assert_eq!(text, "a");
        assert_eq!(stream.usage().prompt_tokens, 12);
        assert_eq!(stream.usage().completion_tokens, 4);
    }

    #[tokio::test]
    async fn test_chunk_count_fallback_accounting() {
        let mut stream = stream_of(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
            "data: [DONE]\n",
        ]);
        stream.collect_text().await.unwrap();
        assert_eq!(stream.usage().completion_tokens, 2);
    }

    #[tokio::test]
    async fn test_cancellation_finishes_stream() {
        let mut stream = stream_of(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        ]);
        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.delta, "a");

        stream.cancel_token().cancel();
        // Cancellation wins over frames not yet decoded.
        assert!(stream.next_chunk().await.unwrap().is_none());
        assert!(stream.next_chunk().await.unwrap().is_none());
    }
}
