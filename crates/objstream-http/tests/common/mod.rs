#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use objstream_http::{
    AppState, ModelProvider, ModelRequest, ProviderError, ServerConfig, provider::TextStream,
};

/// What the scripted provider does on each call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit these fragments, then end.
    Fragments(Vec<&'static str>),
    /// Emit these fragments, then fail.
    FailAfter(Vec<&'static str>),
    /// Emit these fragments, then never end.
    Stall(Vec<&'static str>),
    /// Refuse to open the stream.
    Refuse,
}

#[derive(Debug)]
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn fragments(items: &[&'static str]) -> impl futures::Stream<Item = Result<String, ProviderError>> + use<> {
    stream::iter(
        items
            .iter()
            .map(|s| Ok((*s).to_string()))
            .collect::<Vec<_>>(),
    )
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn stream_text(&self, request: ModelRequest) -> Result<TextStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::Fragments(items) => Ok(fragments(items).boxed()),
            Script::FailAfter(items) => Ok(fragments(items)
                .chain(stream::once(async {
                    Err(ProviderError::Stream("connection reset".into()))
                }))
                .boxed()),
            Script::Stall(items) => Ok(fragments(items).chain(stream::pending()).boxed()),
            Script::Refuse => Err(ProviderError::Status {
                status: 503,
                message: "unavailable".into(),
            }),
        }
    }
}

pub fn config(timeout_ms: u64) -> ServerConfig {
    ServerConfig {
        request_timeout_ms: timeout_ms,
        ..ServerConfig::default()
    }
}

pub fn state(provider: &Arc<ScriptedProvider>) -> AppState {
    AppState::new(provider.clone(), &config(2_000))
}
