use alloc::sync::Arc;

use bstr::{BString, ByteSlice};
use serde_json::Value;

use crate::{
    coerce::coerce,
    error::{PartialParseFailure, StreamError},
    repair::parse_partial,
    schema::Schema,
    validate::finalize,
};

/// Lifecycle of one structured stream.
///
/// `Idle` until the first chunk, `Streaming` while chunks arrive, then
/// exactly one of the settled states.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    /// No chunk has arrived yet.
    #[default]
    Idle,
    /// At least one chunk arrived and the stream is still open.
    Streaming,
    /// The final value passed validation.
    SettledSuccess,
    /// The transport failed or the final value was rejected.
    SettledError,
}

impl StreamState {
    /// Whether the stream reached a terminal state.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, StreamState::SettledSuccess | StreamState::SettledError)
    }
}

/// Everything a consumer needs to render a stream: the current partial
/// value, the state, and the terminal value or error once settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Lifecycle state of the stream.
    pub state: StreamState,
    /// Best partial value so far, kept after the stream settles.
    pub partial: Option<Value>,
    /// Set once the stream settled successfully.
    pub value: Option<Value>,
    /// Set once the stream settled with an error.
    pub error: Option<StreamError>,
}

/// Turns an ordered sequence of text fragments into a growing partial value
/// of a schema's shape.
///
/// Each chunk is appended to an internal byte buffer and the whole buffer is
/// parsed again, leniently. Work per chunk is linear in the buffer length,
/// quadratic over the stream; model outputs are small enough for this.
///
/// An instance belongs to exactly one stream. Once settled it ignores
/// further input; start a new stream with a new instance.
#[derive(Debug)]
pub struct IncrementalObjectParser {
    schema: Arc<Schema>,
    buffer: BString,
    partial: Option<Value>,
    state: StreamState,
    value: Option<Value>,
    error: Option<StreamError>,
}

impl IncrementalObjectParser {
    /// An idle parser for one stream of `schema`.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            buffer: BString::default(),
            partial: None,
            state: StreamState::Idle,
            value: None,
            error: None,
        }
    }

    /// Schema the stream is parsed against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The best partial value derived so far, `None` until the buffer first
    /// yields one.
    #[must_use]
    pub fn partial(&self) -> Option<&Value> {
        self.partial.as_ref()
    }

    /// The validated final value, once settled successfully.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The terminal error, once settled with one.
    #[must_use]
    pub fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Raw bytes received so far.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Owned copy of the consumer-facing state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            partial: self.partial.clone(),
            value: self.value.clone(),
            error: self.error.clone(),
        }
    }

    /// Append a chunk and re-derive the partial value.
    ///
    /// Returns the new partial value if this chunk changed it. When the
    /// buffer yields nothing better the previous partial value is kept.
    /// Chunks arriving after the stream settled are ignored.
    pub fn on_chunk(&mut self, chunk: impl AsRef<[u8]>) -> Option<&Value> {
        if self.state.is_settled() {
            return None;
        }
        self.state = StreamState::Streaming;
        self.buffer.extend_from_slice(chunk.as_ref());

        match self.lenient_parse() {
            Ok(value) if self.partial.as_ref() != Some(&value) => {
                self.partial = Some(value);
                self.partial.as_ref()
            }
            Ok(_) | Err(_) => None,
        }
    }

    /// The stream closed: strictly parse and validate the buffer.
    ///
    /// Settles the parser. Calling it again returns the same outcome.
    ///
    /// # Errors
    ///
    /// [`StreamError::ValidationFailure`] when the buffer does not satisfy
    /// the schema or ends before the document does; the stored error if the
    /// stream already failed.
    pub fn on_complete(&mut self) -> Result<Value, StreamError> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        match finalize(&self.schema, &self.buffer) {
            Ok(value) => {
                self.state = StreamState::SettledSuccess;
                self.value = Some(value.clone());
                Ok(value)
            }
            Err(error) => {
                let error = StreamError::from(error);
                self.settle_error(error.clone());
                Err(error)
            }
        }
    }

    /// The transport failed. Ignored once settled.
    pub fn on_error(&mut self, error: StreamError) {
        if !self.state.is_settled() {
            self.settle_error(error);
        }
    }

    fn settle_error(&mut self, error: StreamError) {
        self.state = StreamState::SettledError;
        self.error = Some(error);
    }

    fn lenient_parse(&self) -> Result<Value, PartialParseFailure> {
        // A chunk may end inside a multi-byte sequence; only look at the
        // longest valid prefix.
        let text = match self.buffer.to_str() {
            Ok(text) => text,
            Err(err) => self.buffer[..err.valid_up_to()]
                .to_str()
                .map_err(|_| PartialParseFailure::Unrecoverable)?,
        };

        let (Some(parsed), _) = parse_partial(text) else {
            return Err(PartialParseFailure::Unrecoverable);
        };
        if matches!(*self.schema, Schema::Object(_)) && !parsed.is_object() {
            return Err(PartialParseFailure::RootMismatch);
        }
        Ok(coerce(&self.schema, &parsed))
    }
}
