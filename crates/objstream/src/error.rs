use alloc::string::String;

use thiserror::Error;

use crate::path::Path;

/// Terminal failure of a structured stream.
///
/// `InvalidInput` is raised before any stream opens. The other two kinds are
/// reported once, when the stream settles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// The request was rejected before a stream opened.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The producer could not be reached or read from.
    #[error("transport failure: {0}")]
    TransportFailure(String),
    /// The finished buffer did not satisfy the schema.
    #[error("validation failure: {0}")]
    ValidationFailure(#[from] ValidationError),
}

impl StreamError {
    /// Short machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::InvalidInput(_) => "invalid_input",
            StreamError::TransportFailure(_) => "transport_failure",
            StreamError::ValidationFailure(_) => "validation_failure",
        }
    }
}

/// The first schema constraint a final value failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The buffer is not JSON.
    #[error("malformed JSON: {0}")]
    MalformedJson(String),
    /// The document ended before it was complete.
    #[error("truncated document: {0}")]
    Truncated(String),
    /// A required field is absent.
    #[error("missing required field `{path}`")]
    MissingField { path: Path },
    /// A value has the wrong JSON type.
    #[error("expected {expected} at `{path}`")]
    TypeMismatch { path: Path, expected: &'static str },
    /// A string is not a member of its enum.
    #[error("value {value} at `{path}` is not one of the allowed values")]
    NotInEnum { path: Path, value: String },
    /// A number falls outside its bounds.
    #[error("value {value} at `{path}` is outside [{minimum}, {maximum}]")]
    OutOfRange {
        path: Path,
        value: f64,
        minimum: f64,
        maximum: f64,
    },
}

impl ValidationError {
    /// Location of the failing value, if the failure is tied to one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ValidationError::MalformedJson(_) | ValidationError::Truncated(_) => None,
            ValidationError::MissingField { path }
            | ValidationError::TypeMismatch { path, .. }
            | ValidationError::NotInEnum { path, .. }
            | ValidationError::OutOfRange { path, .. } => Some(path),
        }
    }
}

/// No better partial value is available for the current buffer.
///
/// Never surfaced: the parser keeps its previous partial value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PartialParseFailure {
    #[error("buffer holds no complete value yet")]
    Unrecoverable,
    #[error("buffer root does not match the schema")]
    RootMismatch,
}
