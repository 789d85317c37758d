//! Renders a text classification while it streams in.
//!
//! A model asked for a `TextClassification` document emits it a few bytes at
//! a time. The example feeds a canned response to an
//! [`IncrementalObjectParser`] in small, irregular chunks and prints the
//! partial value every time it changes, then validates the finished document.
//!
//! The category is known after the first few chunks, long before the
//! explanation has finished arriving, so a user interface can show it early.
//!
//! Run with
//!
//! ```bash
//! cargo run -p objstream --example classify_stream
//! ```

#![allow(clippy::needless_raw_string_hashes)]

use std::sync::Arc;

use objstream::{Field, IncrementalObjectParser, Schema, StreamError};

fn main() {
    let schema = Arc::new(
        Schema::object([
            Field::new("category", Schema::String).describe("The main category of the text"),
            Field::new("confidence", Schema::bounded(0.0, 1.0))
                .describe("Confidence score between 0 and 1"),
            Field::new(
                "subcategories",
                Schema::array(Schema::object([
                    Field::new("name", Schema::String),
                    Field::new("confidence", Schema::bounded(0.0, 1.0)),
                ])),
            ),
            Field::new("explanation", Schema::String)
                .describe("Brief explanation of the classification"),
        ])
        .describe("A text classification result"),
    );

    // In real life this would come from the network.
    let simulated_stream: [&str; 8] = [
        r#"{"category":"sci"#,
        r#"ence","confidence":0"#,
        r#".91,"subcategories":[{"name":"#,
        r#""astronomy","confidence":0.8},"#,
        r#"{"name":"physics","confidence":0.4"#,
        r#"}],"explanation":"The text describes "#,
        r#"a telescope observing a distant galaxy."#,
        r#""}"#,
    ];

    let mut parser = IncrementalObjectParser::new(schema);
    let mut announced = false;
    for chunk in simulated_stream {
        let Some(partial) = parser.on_chunk(chunk) else {
            continue;
        };
        println!("partial: {partial}");

        if !announced {
            if let Some(category) = partial.get("category") {
                println!("  -> category known early: {category}");
                announced = true;
            }
        }
    }

    match parser.on_complete() {
        Ok(value) => println!("final: {value:#}"),
        Err(err) => {
            eprintln!("stream failed: {err}");
            if let Some(location) = err_path(&err) {
                eprintln!("  at {location}");
            }
        }
    }
}

fn err_path(err: &StreamError) -> Option<String> {
    match err {
        StreamError::ValidationFailure(inner) => inner.path().map(ToString::to_string),
        _ => None,
    }
}
