//! Serving and consuming streamed structured model output over HTTP.
//!
//! The server side asks a model provider for a document of an endpoint's
//! schema and forwards the model's fragments as a chunked `text/plain` body.
//! The client side, [`ObjectStream`], parses that body incrementally with
//! [`objstream::IncrementalObjectParser`].

pub mod client;
pub mod config;
pub mod error;
pub mod producer;
pub mod provider;
pub mod routes;
pub mod schemas;

pub use client::ObjectStream;
pub use config::{ProviderConfig, ServerConfig};
pub use error::ApiError;
pub use producer::{Endpoint, Input, StreamProducer};
pub use provider::{ModelProvider, ModelRequest, OpenAiProvider, OutputConstraint, ProviderError};
pub use routes::{AppState, router};
