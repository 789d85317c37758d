//! Server side of a structured stream: one provider call per request, its
//! fragments forwarded in order as the response body.

use std::{convert::Infallible, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::StreamExt;
use objstream::{Schema, StreamError, Value, finalize};
use tokio::{sync::mpsc, time::Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{
    config::{ProviderConfig, ServerConfig},
    provider::{ModelProvider, ModelRequest, OutputConstraint, ProviderError},
};

/// Body of a streamed response: model fragments, unchanged and in order.
pub type ByteStream = ReceiverStream<Result<Bytes, Infallible>>;

/// Rejection message for a missing or blank prompt.
pub const PROMPT_REQUIRED: &str = "Prompt is required";
/// Rejection message for an image endpoint called without an image.
pub const NO_IMAGE: &str = "No image URL provided";
/// Rejection message for an image that is not a base64 `data:` URL.
pub const INVALID_IMAGE: &str = "Invalid image URL format";

/// What a route asks of the model.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Name used in logs and error messages.
    pub name: &'static str,
    /// System prompt sent with every request.
    pub system: Option<&'static str>,
    /// User message; `{prompt}` is replaced by the submitted prompt.
    pub template: &'static str,
    /// Schema the completion must satisfy, if any.
    pub output: Option<OutputConstraint>,
    /// The endpoint takes an image instead of a prompt and runs on the
    /// vision model.
    pub image: bool,
    /// Overrides the configured completion length.
    pub max_tokens: Option<u32>,
}

impl Endpoint {
    /// An endpoint producing free text from the prompt as given.
    #[must_use]
    pub fn text(name: &'static str, system: Option<&'static str>) -> Self {
        Self {
            name,
            system,
            template: "{prompt}",
            output: None,
            image: false,
            max_tokens: None,
        }
    }

    /// Fills the template with the submitted prompt.
    #[must_use]
    pub fn render(&self, prompt: &str) -> String {
        self.template.replacen("{prompt}", prompt, 1)
    }

    /// Schema of the structured output, if the endpoint has one.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.output.as_ref().map(|output| &output.schema)
    }
}

/// What the caller submitted for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Input<'a> {
    /// Text submitted by the caller.
    pub prompt: &'a str,
    /// Model to use instead of the configured one.
    pub model: Option<&'a str>,
    /// Image for endpoints that take one, as a base64 `data:` URL.
    pub image_url: Option<&'a str>,
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(prompt: &'a str) -> Self {
        Self {
            prompt,
            ..Self::default()
        }
    }
}

/// Runs endpoint requests against a model provider.
#[derive(Clone)]
pub struct StreamProducer {
    provider: Arc<dyn ModelProvider>,
    settings: ProviderConfig,
    request_timeout: Duration,
    channel_capacity: usize,
}

impl std::fmt::Debug for StreamProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProducer")
            .field("model", &self.settings.model)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl StreamProducer {
    /// Creates a producer using the provider and timeouts from `config`.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: &ServerConfig) -> Self {
        Self {
            provider,
            settings: config.provider.clone(),
            request_timeout: config.request_timeout(),
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    /// Check `input` against `endpoint` and build the provider request.
    fn request(&self, endpoint: &Endpoint, input: Input<'_>) -> Result<ModelRequest, StreamError> {
        let image_url = if endpoint.image {
            Some(image_data_url(input.image_url)?)
        } else {
            if input.prompt.trim().is_empty() {
                return Err(StreamError::InvalidInput(PROMPT_REQUIRED.to_string()));
            }
            None
        };

        let model = match input.model {
            Some(model) if !self.settings.supports_model(model) => {
                return Err(StreamError::InvalidInput(format!("Unsupported model: {model}")));
            }
            Some(model) => model,
            None if endpoint.image => self.settings.vision_model.as_str(),
            None => self.settings.model.as_str(),
        };

        Ok(ModelRequest {
            model: model.to_string(),
            system: endpoint.system.map(str::to_string),
            prompt: endpoint.render(input.prompt),
            image_url,
            output: endpoint.output.clone(),
            temperature: Some(self.settings.temperature),
            max_tokens: Some(endpoint.max_tokens.unwrap_or(self.settings.max_tokens)),
        })
    }

    /// Open a provider stream for `input` and return its fragments as a
    /// response body.
    ///
    /// The body ends early if the provider fails mid-stream or the request
    /// outlives its time limit; the client sees a truncated document.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidInput`] for an empty prompt, a missing or
    /// malformed image, or an unsupported model, before the provider is
    /// called. [`StreamError::TransportFailure`] when the provider stream
    /// cannot be opened.
    pub async fn open(
        &self,
        input: impl Into<Input<'_>>,
        endpoint: &Endpoint,
    ) -> Result<ByteStream, StreamError> {
        let request = self.request(endpoint, input.into())?;
        let deadline = Instant::now() + self.request_timeout;
        let mut upstream = tokio::time::timeout_at(deadline, self.provider.stream_text(request))
            .await
            .map_err(|_| timed_out(self.request_timeout))?
            .map_err(transport)?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let name = endpoint.name;
        tokio::spawn(async move {
            let forward = async {
                while let Some(fragment) = upstream.next().await {
                    match fragment {
                        Ok(text) => {
                            debug!(endpoint = name, len = text.len(), "forwarding fragment");
                            if tx.send(Ok(Bytes::from(text))).await.is_err() {
                                debug!(endpoint = name, "client went away");
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(endpoint = name, error = %err, "provider stream failed");
                            return;
                        }
                    }
                }
                debug!(endpoint = name, "provider stream finished");
            };
            if tokio::time::timeout_at(deadline, forward).await.is_err() {
                warn!(endpoint = name, "request timed out, ending response");
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Run the model to completion and validate its output.
    ///
    /// # Errors
    ///
    /// As [`StreamProducer::open`], plus [`StreamError::ValidationFailure`]
    /// when the output does not satisfy the endpoint's schema.
    pub async fn generate_object(
        &self,
        input: impl Into<Input<'_>>,
        endpoint: &Endpoint,
    ) -> Result<Value, StreamError> {
        let schema = endpoint.schema().cloned().ok_or_else(|| {
            StreamError::InvalidInput(format!("endpoint {} has no output schema", endpoint.name))
        })?;
        let text = self.generate_text(input, endpoint).await?;
        Ok(finalize(&schema, strip_code_fence(&text).as_bytes())?)
    }

    /// Run the model to completion and return its text.
    ///
    /// # Errors
    ///
    /// As [`StreamProducer::open`].
    pub async fn generate_text(
        &self,
        input: impl Into<Input<'_>>,
        endpoint: &Endpoint,
    ) -> Result<String, StreamError> {
        let request = self.request(endpoint, input.into())?;
        tokio::time::timeout(self.request_timeout, self.provider.generate_text(request))
            .await
            .map_err(|_| timed_out(self.request_timeout))?
            .map_err(transport)
    }
}

/// Normalize a submitted image to a JPEG `data:` URL of its base64 payload.
fn image_data_url(raw: Option<&str>) -> Result<String, StreamError> {
    let raw = raw
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| StreamError::InvalidInput(NO_IMAGE.to_string()))?;
    match raw.split(',').nth(1) {
        Some(data) if !data.is_empty() => Ok(format!("data:image/jpeg;base64,{data}")),
        _ => Err(StreamError::InvalidInput(INVALID_IMAGE.to_string())),
    }
}

/// Remove a markdown code fence wrapped around a JSON answer.
fn strip_code_fence(text: &str) -> &str {
    let text = text
        .strip_prefix("```json\n")
        .or_else(|| text.strip_prefix("```\n"))
        .unwrap_or(text);
    text.strip_suffix("\n```").unwrap_or(text).trim()
}

fn transport(err: ProviderError) -> StreamError {
    StreamError::TransportFailure(err.to_string())
}

fn timed_out(limit: Duration) -> StreamError {
    StreamError::TransportFailure(format!("timed out after {}ms", limit.as_millis()))
}
