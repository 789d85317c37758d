//! Consumer side of a structured stream.
//!
//! [`ObjectStream`] posts a prompt to a streaming endpoint and feeds the
//! response body, chunk by chunk, to an [`IncrementalObjectParser`]. Every
//! change is published as a [`Snapshot`] on a `watch` channel, so a UI can
//! render the latest partial value without seeing every intermediate one.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use objstream::{IncrementalObjectParser, Schema, Snapshot, StreamError, StreamState, Value};
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

/// Bound on one submission unless [`ObjectStream::with_timeout`] sets
/// another; matches the server's default request limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A handle on the current structured stream of one endpoint.
#[derive(Debug)]
pub struct ObjectStream {
    client: Client,
    url: String,
    schema: Arc<Schema>,
    timeout: Duration,
    current: Option<watch::Receiver<Snapshot>>,
}

impl ObjectStream {
    /// A handle posting prompts to `url` and parsing responses against
    /// `schema`.
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            client,
            url: url.into(),
            schema,
            timeout: DEFAULT_TIMEOUT,
            current: None,
        }
    }

    /// Bound the total duration of each submission.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bound applied to each submission.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new stream for `prompt`.
    ///
    /// Must be called within a Tokio runtime. A previous stream, if any, is
    /// no longer observed through this handle; its task stops once nobody
    /// holds its receiver.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidInput`] for an empty prompt; no request is made.
    pub fn submit(&mut self, prompt: &str) -> Result<watch::Receiver<Snapshot>, StreamError> {
        if prompt.trim().is_empty() {
            return Err(StreamError::InvalidInput("prompt is required".to_string()));
        }

        let (tx, rx) = watch::channel(Snapshot::default());
        let request = self.client.post(&self.url).json(&json!({ "prompt": prompt }));
        let parser = IncrementalObjectParser::new(Arc::clone(&self.schema));
        tokio::spawn(drive(request, parser, tx, self.timeout));

        self.current = Some(rx.clone());
        Ok(rx)
    }

    /// The latest snapshot of the current stream.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    /// Latest partial object, if any field has arrived.
    #[must_use]
    pub fn partial(&self) -> Option<Value> {
        self.snapshot().partial
    }

    /// Current lifecycle state of the stream.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.snapshot().state
    }

    /// Wait until the current stream settles and return its last snapshot.
    pub async fn settled(&mut self) -> Snapshot {
        let Some(rx) = self.current.as_mut() else {
            return Snapshot::default();
        };
        if let Ok(snapshot) = rx.wait_for(|snapshot| snapshot.state.is_settled()).await {
            return snapshot.clone();
        }
        // The task ended without settling: it was detached.
        rx.borrow().clone()
    }
}

enum Interrupted {
    /// Every receiver was dropped.
    Detached,
    Failed(StreamError),
}

impl From<reqwest::Error> for Interrupted {
    fn from(err: reqwest::Error) -> Self {
        Interrupted::Failed(StreamError::TransportFailure(err.to_string()))
    }
}

async fn drive(
    request: RequestBuilder,
    mut parser: IncrementalObjectParser,
    tx: watch::Sender<Snapshot>,
    timeout: Duration,
) {
    let transfer = feed(request, &mut parser, &tx);
    let outcome = tokio::time::timeout(timeout, transfer)
        .await
        .unwrap_or_else(|_| {
            Err(Interrupted::Failed(StreamError::TransportFailure(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))))
        });

    match outcome {
        Ok(()) => {
            if let Err(err) = parser.on_complete() {
                debug!(error = %err, "stream settled with an error");
            }
        }
        Err(Interrupted::Detached) => {
            debug!("stream no longer observed");
            return;
        }
        Err(Interrupted::Failed(err)) => parser.on_error(err),
    }
    let _ = tx.send(parser.snapshot());
}

async fn feed(
    request: RequestBuilder,
    parser: &mut IncrementalObjectParser,
    tx: &watch::Sender<Snapshot>,
) -> Result<(), Interrupted> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error")?.as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(Interrupted::Failed(StreamError::TransportFailure(format!(
            "server responded with {status}: {message}"
        ))));
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let state = parser.state();
        let changed = parser.on_chunk(&chunk).is_some() || parser.state() != state;
        if changed && tx.send(parser.snapshot()).is_err() {
            return Err(Interrupted::Detached);
        }
        if tx.is_closed() {
            return Err(Interrupted::Detached);
        }
    }
    Ok(())
}
