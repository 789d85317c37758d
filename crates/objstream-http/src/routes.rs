//! HTTP routes and their request bodies.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    config::ServerConfig,
    error::ApiError,
    producer::{ByteStream, Endpoint, Input, NO_IMAGE, PROMPT_REQUIRED, StreamProducer},
    provider::ModelProvider,
    schemas::Endpoints,
};

/// Shared state of every route.
#[derive(Debug, Clone)]
pub struct AppState {
    producer: StreamProducer,
    endpoints: Arc<Endpoints>,
}

impl AppState {
    /// Creates state serving the built-in endpoints.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: &ServerConfig) -> Self {
        Self {
            producer: StreamProducer::new(provider, config),
            endpoints: Arc::new(Endpoints::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    model: Option<String>,
}

impl PromptRequest {
    fn input(&self) -> Input<'_> {
        Input {
            prompt: &self.prompt,
            model: self.model.as_deref().filter(|model| !model.is_empty()),
            image_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageRequest {
    #[serde(default, rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

type Payload = Result<Json<PromptRequest>, JsonRejection>;

/// Builds the application router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/classifier", post(classifier))
        .route("/api/streaming-structured", post(streaming_structured))
        .route("/api/structured-output", post(structured_output))
        .route("/api/generate", post(generate))
        .route("/api/summarize", post(summarize))
        .route("/api/image-analysis", post(image_analysis))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn prompt(payload: Payload) -> Result<PromptRequest, ApiError> {
    payload
        .map(|Json(request)| request)
        .map_err(|_| ApiError::BadRequest(PROMPT_REQUIRED.to_string()))
}

fn text_stream(body: ByteStream) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn stream(state: &AppState, endpoint: &Endpoint, payload: Payload) -> Result<Response, ApiError> {
    let request = prompt(payload)?;
    info!(
        endpoint = endpoint.name,
        prompt_len = request.prompt.len(),
        model = request.model.as_deref(),
        "streaming"
    );
    let body = state.producer.open(request.input(), endpoint).await?;
    Ok(text_stream(body))
}

async fn classifier(State(state): State<AppState>, payload: Payload) -> Result<Response, ApiError> {
    stream(&state, &state.endpoints.classifier, payload).await
}

async fn streaming_structured(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Response, ApiError> {
    stream(&state, &state.endpoints.streaming_structured, payload).await
}

async fn summarize(State(state): State<AppState>, payload: Payload) -> Result<Response, ApiError> {
    stream(&state, &state.endpoints.summarize, payload).await
}

async fn structured_output(
    State(state): State<AppState>,
    payload: Payload,
) -> Result<Json<Value>, ApiError> {
    let request = prompt(payload)?;
    let endpoint = &state.endpoints.structured_output;
    info!(endpoint = endpoint.name, prompt_len = request.prompt.len(), "generating object");
    let value = state.producer.generate_object(request.input(), endpoint).await?;
    Ok(Json(value))
}

async fn generate(State(state): State<AppState>, payload: Payload) -> Result<Json<Value>, ApiError> {
    let request = prompt(payload)?;
    let endpoint = &state.endpoints.generate;
    info!(endpoint = endpoint.name, prompt_len = request.prompt.len(), "generating text");
    let text = state.producer.generate_text(request.input(), endpoint).await?;
    Ok(Json(json!({ "text": text })))
}

async fn image_analysis(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Ok(Json(request)) = payload else {
        return Err(ApiError::BadRequest(NO_IMAGE.to_string()));
    };
    let endpoint = &state.endpoints.image_analysis;
    info!(
        endpoint = endpoint.name,
        image_len = request.image_url.as_deref().map_or(0, str::len),
        "analyzing image"
    );
    let input = Input {
        prompt: "",
        model: request.model.as_deref().filter(|model| !model.is_empty()),
        image_url: request.image_url.as_deref(),
    };
    let value = state.producer.generate_object(input, endpoint).await?;
    Ok(Json(value))
}
