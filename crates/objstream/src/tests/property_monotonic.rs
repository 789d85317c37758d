use alloc::{
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};

use quickcheck::{Arbitrary, Gen, QuickCheck};
use serde_json::{Value, json};

use super::arbitrary::ArbitraryJson;
use crate::{Field, IncrementalObjectParser, Schema, StreamState, parse_partial};

/// `new` keeps every field and element `old` had. Scalars may only change
/// when they are numbers still receiving digits.
fn extends(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => old
            .iter()
            .all(|(key, value)| new.get(key).is_some_and(|next| extends(value, next))),
        (Value::Array(old), Value::Array(new)) => {
            old.len() <= new.len() && old.iter().zip(new).all(|(o, n)| extends(o, n))
        }
        (Value::Number(_), Value::Number(_)) => true,
        _ => old == new,
    }
}

fn monotone(partials: &[Option<Value>]) -> bool {
    let seen: Vec<&Value> = partials.iter().flatten().collect();
    // Once a partial value exists it never goes away.
    let first = partials.iter().position(Option::is_some);
    first.is_none_or(|first| partials[first..].iter().all(Option::is_some))
        && seen.windows(2).all(|pair| extends(pair[0], pair[1]))
}

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 2_000 } else { 300 };
    #[cfg(miri)]
    let tests = 5;
    tests
}

/// Property: the recovered value of a growing prefix never loses fields or
/// elements.
#[test]
fn growing_prefixes_never_lose_fields() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: ArbitraryJson) -> bool {
        let src = value.0.to_string();
        let partials: Vec<Option<Value>> = (0..=src.len())
            .filter(|&end| src.is_char_boundary(end))
            .map(|end| parse_partial(&src[..end]).0)
            .collect();
        monotone(&partials)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(ArbitraryJson) -> bool);
}

#[derive(Debug, Clone)]
struct Analysis(Value);

impl Arbitrary for Analysis {
    fn arbitrary(g: &mut Gen) -> Self {
        let sentiment = g
            .choose(&["positive", "negative", "neutral"])
            .copied()
            .unwrap_or("neutral");
        let topics: Vec<String> = Vec::arbitrary(g);
        Self(json!({"sentiment": sentiment, "topics": topics}))
    }
}

/// Property: however the document is split into chunks, the parser's
/// partial values only grow and the stream settles on the document itself.
#[test]
fn parser_partials_grow_for_any_split() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(doc: Analysis, splits: Vec<usize>) -> bool {
        let schema = Arc::new(Schema::object([
            Field::new(
                "sentiment",
                Schema::enumeration(["positive", "negative", "neutral"]),
            ),
            Field::new("topics", Schema::array(Schema::String)),
        ]));
        let src = doc.0.to_string();
        let bytes = src.as_bytes();

        // Byte-level splits, so chunks may end inside a code point.
        let mut parser = IncrementalObjectParser::new(schema);
        let mut partials = Vec::new();
        let mut start = 0;
        for split in splits {
            if start == bytes.len() {
                break;
            }
            let end = start + 1 + split % (bytes.len() - start);
            parser.on_chunk(&bytes[start..end]);
            partials.push(parser.partial().cloned());
            start = end;
        }
        parser.on_chunk(&bytes[start..]);
        partials.push(parser.partial().cloned());

        monotone(&partials)
            && parser.on_complete().as_ref() == Ok(&doc.0)
            && parser.state() == StreamState::SettledSuccess
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Analysis, Vec<usize>) -> bool);
}

#[test]
fn extends_rejects_lost_fields() {
    assert!(extends(&json!({"a": [1]}), &json!({"a": [1, 2], "b": true})));
    assert!(extends(&json!({"n": 1}), &json!({"n": 12})));
    assert!(!extends(&json!({"a": 1}), &json!({})));
    assert!(!extends(&json!({"a": [1, 2]}), &json!({"a": [1]})));
    assert!(!extends(&json!({"s": "x"}), &json!({"s": "y"})));
}
