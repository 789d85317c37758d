use alloc::string::ToString;

use quickcheck::QuickCheck;
use serde_json::Value;

use super::arbitrary::ArbitraryJson;
use crate::{ParseState, parse_partial, repair};

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 2_000 } else { 300 };
    #[cfg(miri)]
    let tests = 5;
    tests
}

/// Property: every truncation of a valid document repairs into a document
/// that a strict parser accepts.
#[test]
fn every_prefix_repairs_to_valid_json() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: ArbitraryJson) -> bool {
        let src = value.0.to_string();
        (0..=src.len())
            .filter(|&end| src.is_char_boundary(end))
            .all(|end| serde_json::from_str::<Value>(&repair(&src[..end])).is_ok())
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(ArbitraryJson) -> bool);
}

/// Property: a complete document is never treated as truncated.
#[test]
fn complete_documents_parse_strictly() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(value: ArbitraryJson) -> bool {
        let src = value.0.to_string();
        let strict = serde_json::from_str::<Value>(&src).ok();
        parse_partial(&src) == (strict, ParseState::Successful)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(ArbitraryJson) -> bool);
}

#[test]
fn repair_ignores_pretty_printing() {
    let src = "{\n  \"topics\": [\n    \"ai\",\n    \"m";
    assert_eq!(repair(src), "{\n  \"topics\": [\n    \"ai\"]}");
}
