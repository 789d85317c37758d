//! Incremental parsing of structured model output.
//!
//! A language model asked for a JSON document matching a [`Schema`] emits it
//! token by token. [`IncrementalObjectParser`] consumes those fragments in
//! order, keeps a best-effort partial value of the schema's shape after every
//! chunk, and validates the finished document once the stream closes.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use objstream::{Field, IncrementalObjectParser, Schema, StreamState};
//!
//! let schema = Arc::new(Schema::object([
//!     Field::new("sentiment", Schema::enumeration(["positive", "negative", "neutral"])),
//!     Field::new("topics", Schema::array(Schema::String)),
//! ]));
//!
//! let mut parser = IncrementalObjectParser::new(schema);
//! parser.on_chunk(br#"{"sentiment":"positive","topics":["a"#);
//! assert_eq!(parser.partial(), Some(&serde_json::json!({"sentiment": "positive", "topics": []})));
//!
//! parser.on_chunk(br#"i"]}"#);
//! let value = parser.on_complete().unwrap();
//! assert_eq!(value["topics"][0], "ai");
//! assert_eq!(parser.state(), StreamState::SettledSuccess);
//! ```

#![no_std]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod coerce;
mod error;
mod object_parser;
mod path;
mod repair;
mod schema;
mod validate;

pub mod chunk_utils;

#[cfg(test)]
mod tests;

pub use coerce::coerce;
pub use error::{StreamError, ValidationError};
pub use object_parser::{IncrementalObjectParser, Snapshot, StreamState};
pub use path::{Path, PathComponent, PathComponentFrom};
pub use repair::{ParseState, parse_partial, repair};
pub use schema::{Field, ObjectSchema, Schema};
pub use validate::{finalize, validate};

pub use serde_json::{Map, Value};

#[doc(hidden)]
pub use alloc::vec;

/// Macro to build a [`Path`] from a heterogeneous list of keys and indices.
///
/// ```rust
/// # use objstream::{path, PathComponent};
/// let p = path!["subcategories", 0, "confidence"];
/// assert_eq!(p.to_string(), "subcategories[0].confidence");
/// assert_eq!(p.0[1], PathComponent::Index(0));
/// ```
#[macro_export]
macro_rules! path {
    ( $( $elem:expr ),* $(,)? ) => {{
        use $crate::PathComponentFrom;
        $crate::Path($crate::vec![$($crate::PathComponent::from_path_component($elem)),*])
    }};
}
