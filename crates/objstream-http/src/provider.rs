//! Model provider abstraction and an OpenAI-compatible implementation.
//!
//! A provider turns a [`ModelRequest`] into an ordered stream of text
//! fragments. When the request carries an [`OutputConstraint`] the fragments
//! concatenate to a JSON document of the constraint's schema.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use objstream::Schema;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

/// Ordered text fragments produced by a model.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// Failures raised while talking to a model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named environment variable held no key.
    #[error("no API key found in ${0}")]
    MissingApiKey(String),
    /// The HTTP request itself failed.
    #[error("request to provider failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The response stream broke mid-way.
    #[error("provider stream failed: {0}")]
    Stream(String),
    /// A non-streaming response carried no text.
    #[error("provider response had no content")]
    EmptyResponse,
}

/// A schema the model output must follow.
#[derive(Debug, Clone)]
pub struct OutputConstraint {
    /// Name reported to the provider.
    pub name: String,
    /// Optional description reported alongside the name.
    pub description: Option<String>,
    /// Shape the output is checked against.
    pub schema: Arc<Schema>,
}

/// One call to a model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model to run.
    pub model: String,
    /// System message placed before the prompt.
    pub system: Option<String>,
    /// User message.
    pub prompt: String,
    /// Image sent alongside the prompt, as a `data:` URL.
    pub image_url: Option<String>,
    /// Requests JSON output in this shape.
    pub output: Option<OutputConstraint>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Completion length limit.
    pub max_tokens: Option<u32>,
}

/// Source of model completions.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Start a completion and return its fragments as they arrive.
    async fn stream_text(&self, request: ModelRequest) -> Result<TextStream, ProviderError>;

    /// Run a completion to the end and return the whole text.
    async fn generate_text(&self, request: ModelRequest) -> Result<String, ProviderError> {
        let mut stream = self.stream_text(request).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Provider for OpenAI and any endpoint that follows the chat completions
/// API format.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    /// Creates a provider that talks to `base_url` with `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// # Errors
    ///
    /// [`ProviderError::MissingApiKey`] when the configured variable is unset.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(&config.base_url, api_key))
    }

    fn request_body(request: &ModelRequest, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        let content = match &request.image_url {
            Some(url) => json!([
                {"type": "text", "text": request.prompt},
                {"type": "image_url", "image_url": {"url": url}},
            ]),
            None => json!(request.prompt),
        };
        messages.push(json!({"role": "user", "content": content}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(output) = &request.output {
            let mut json_schema = json!({
                "name": output.name,
                "schema": output.schema.to_json_schema(),
            });
            if let Some(description) = &output.description {
                json_schema["description"] = json!(description);
            }
            body["response_format"] = json!({"type": "json_schema", "json_schema": json_schema});
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn stream_text(&self, request: ModelRequest) -> Result<TextStream, ProviderError> {
        debug!(model = %request.model, "opening completion stream");
        let response = self.send(&Self::request_body(&request, true)).await?;

        let mut bytes = response.bytes_stream();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let events = match chunk {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::Stream(err.to_string()))).await;
                        return;
                    }
                };
                for event in events {
                    if !forward(&tx, event).await {
                        return;
                    }
                }
            }
            for event in decoder.finish() {
                if !forward(&tx, event).await {
                    return;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn generate_text(&self, request: ModelRequest) -> Result<String, ProviderError> {
        let response = self.send(&Self::request_body(&request, false)).await?;
        let body: Value = response.json().await?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ProviderError::EmptyResponse)
    }
}

/// Send one decoded event downstream. Returns `false` once the stream is over.
async fn forward(tx: &mpsc::Sender<Result<String, ProviderError>>, event: SseEvent) -> bool {
    match event {
        SseEvent::Text(text) => tx.send(Ok(text)).await.is_ok(),
        SseEvent::Done => false,
        SseEvent::Error(message) => {
            let _ = tx.send(Err(ProviderError::Stream(message))).await;
            false
        }
    }
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    if status.as_u16() == 401 {
        debug!(body = %body, "authentication failed (401)");
    }
    ProviderError::Status {
        status: status.as_u16(),
        message,
    }
}

/// A decoded server-sent event of a chat completions stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A content fragment.
    Text(String),
    /// The `[DONE]` sentinel.
    Done,
    /// An `error` object sent in place of a completion chunk.
    Error(String),
}

/// Reassembles `data:` lines of a server-sent event stream from network
/// chunks that may split lines anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Consume a network chunk and return the events of every line it
    /// completed.
    pub fn push(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(event) = parse_sse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.pending);
        parse_sse_line(&line).into_iter().collect()
    }
}

fn parse_sse_line(line: &[u8]) -> Option<SseEvent> {
    let line = std::str::from_utf8(line).ok()?.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let payload: Value = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "skipping undecodable stream event");
            return None;
        }
    };
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Some(SseEvent::Error(message));
    }
    payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(|content| SseEvent::Text(content.to_string()))
}
