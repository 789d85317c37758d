//! Helpers for simulating token streams in tests, benches, and demos.

use alloc::vec::Vec;

use serde_json::Value;

use crate::IncrementalObjectParser;

/// Split `payload` into chunks of at most `width` bytes, widened where needed
/// so no UTF-8 code point is broken.
///
/// # Panics
///
/// Panics if `width` is zero.
#[must_use]
pub fn chunks_of(payload: &str, width: usize) -> Vec<&str> {
    assert!(width > 0);
    let len = payload.len();
    let mut chunks = Vec::with_capacity(len.div_ceil(width));
    let mut start = 0;
    while start < len {
        let mut end = core::cmp::min(start + width, len);
        while end < len && !payload.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(&payload[start..end]);
        start = end;
    }
    chunks
}

/// Split `payload` into `parts` roughly equal chunks.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn even_chunks(payload: &str, parts: usize) -> Vec<&str> {
    assert!(parts > 0);
    chunks_of(payload, payload.len().div_ceil(parts).max(1))
}

/// The prefixes of `payload` a consumer would have seen after each chunk.
#[must_use]
pub fn prefixes<'a>(payload: &'a str, chunks: &[&str]) -> Vec<&'a str> {
    let mut end = 0;
    chunks
        .iter()
        .map(|chunk| {
            end = core::cmp::min(end + chunk.len(), payload.len());
            &payload[..end]
        })
        .collect()
}

/// Feed `chunks` to `parser` and record its partial value after each one.
pub fn replay<'a, I>(parser: &mut IncrementalObjectParser, chunks: I) -> Vec<Option<Value>>
where
    I: IntoIterator<Item = &'a str>,
{
    chunks
        .into_iter()
        .map(|chunk| {
            parser.on_chunk(chunk);
            parser.partial().cloned()
        })
        .collect()
}
