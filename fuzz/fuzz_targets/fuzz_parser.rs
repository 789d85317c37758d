#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use objstream::{Field, IncrementalObjectParser, Schema, StreamState};

fn schema() -> Arc<Schema> {
    Arc::new(Schema::object([
        Field::new(
            "sentiment",
            Schema::enumeration(["positive", "negative", "neutral"]),
        ),
        Field::new("score", Schema::bounded(0.0, 1.0)),
        Field::new(
            "items",
            Schema::array(Schema::object([Field::new("name", Schema::String)])),
        ),
    ]))
}

// Arbitrary bytes in arbitrary chunks: the parser never panics, always
// settles exactly once, and only succeeds on a strictly valid buffer.
fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };
    let width = usize::from(split) % 16 + 1;

    let mut parser = IncrementalObjectParser::new(schema());
    for chunk in data.chunks(width) {
        parser.on_chunk(chunk);
        if let Some(partial) = parser.partial() {
            assert!(partial.is_object());
        }
    }
    let outcome = parser.on_complete();
    assert!(parser.state().is_settled());
    assert_eq!(outcome.is_ok(), parser.state() == StreamState::SettledSuccess);
    if outcome.is_ok() {
        assert!(serde_json::from_slice::<serde_json::Value>(parser.buffer()).is_ok());
    }
});
