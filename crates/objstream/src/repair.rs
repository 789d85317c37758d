//! Repair of truncated JSON documents.
//!
//! A model streaming a JSON document is, at every instant, somewhere in the
//! middle of it: inside a string, between a key and its value, three levels
//! deep in nested arrays. [`repair`] turns such a prefix into a document that
//! a strict parser accepts by cutting it back to the last point at which a
//! value was complete and closing every scope still open there.
//!
//! Nothing is guessed. A string whose closing quote has not arrived is
//! dropped (with its key, if it is an object member), as is a partial
//! literal such as `tru`. A number is kept up to its longest prefix that is
//! itself a valid number, so `1.` reads as `1` and a lone `-` is dropped.

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use serde_json::Value;

/// The outcome of [`parse_partial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// The input was valid JSON; no repair was necessary.
    Successful,
    /// The input was not valid JSON, but it became valid once repaired.
    Repaired,
    /// Nothing usable could be recovered from the input.
    Failed,
}

/// Parse a possibly truncated JSON document.
///
/// A strict parse is attempted first; only if it fails is the input passed
/// through the recovery pass and parsed again.
#[must_use]
pub fn parse_partial(text: &str) -> (Option<Value>, ParseState) {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return (Some(value), ParseState::Successful);
    }
    match repair_prefix(text).map(|fixed| serde_json::from_str::<Value>(&fixed)) {
        Some(Ok(value)) => (Some(value), ParseState::Repaired),
        _ => (None, ParseState::Failed),
    }
}

/// Repair a truncated JSON document.
///
/// When `text` is any prefix of a valid JSON document the result is itself
/// valid JSON. When no value inside `text` is complete yet the result is
/// `null`. Trailing bytes after a complete root value are ignored.
///
/// ```rust
/// use objstream::repair;
///
/// assert_eq!(repair(r#"{"a":[1,2"#), r#"{"a":[1,2]}"#);
/// assert_eq!(repair(r#"{"a":"unterminated"#), r#"{}"#);
/// assert_eq!(repair(r#"{"a":1,"b"#), r#"{"a":1}"#);
/// assert_eq!(repair(r#""dangling"#), "null");
/// ```
#[must_use]
pub fn repair(text: &str) -> String {
    repair_prefix(text).unwrap_or_else(|| "null".to_owned())
}

/// The repaired document, or `None` when nothing complete survives.
pub(crate) fn repair_prefix(text: &str) -> Option<String> {
    let scanner = Scanner::scan(text.as_bytes());
    if scanner.cut == 0 {
        return None;
    }

    // `cut` always follows an ASCII byte, so it is a char boundary.
    let mut fixed = String::with_capacity(scanner.cut + scanner.scopes.len());
    fixed.push_str(&text[..scanner.cut]);
    for scope in scanner.scopes.iter().rev() {
        fixed.push(match scope {
            Scope::Object => '}',
            Scope::Array => ']',
        });
    }
    Some(fixed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A value: at the root, after `:`, or after `,` in an array.
    Value,
    /// Right after `[`.
    ElementOrEnd,
    /// Right after `{`.
    KeyOrEnd,
    /// After `,` in an object.
    Key,
    Colon,
    CommaOrEnd,
    /// The root value is complete.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    None,
    String { key: bool, escaped: bool },
    Number { start: usize },
    Literal { target: &'static [u8], matched: usize },
}

/// Single pass over the input, tracking open scopes and the byte offset just
/// past the last complete value (`cut`).
///
/// Every push or pop of `scopes` happens together with an update of `cut`,
/// so the scopes open at the end of the scan are exactly the scopes open at
/// `cut`.
#[derive(Debug)]
struct Scanner {
    scopes: Vec<Scope>,
    expect: Expect,
    token: Token,
    cut: usize,
}

impl Scanner {
    fn scan(input: &[u8]) -> Self {
        let mut scanner = Scanner {
            scopes: Vec::new(),
            expect: Expect::Value,
            token: Token::None,
            cut: 0,
        };

        for (idx, &byte) in input.iter().enumerate() {
            match scanner.token {
                Token::String { key, escaped } => {
                    if escaped {
                        scanner.token = Token::String {
                            key,
                            escaped: false,
                        };
                    } else if byte == b'\\' {
                        scanner.token = Token::String { key, escaped: true };
                    } else if byte == b'"' {
                        scanner.token = Token::None;
                        if key {
                            scanner.expect = Expect::Colon;
                        } else {
                            scanner.complete_value(idx + 1);
                        }
                    }
                    continue;
                }
                Token::Number { start } => {
                    if is_number_byte(byte) {
                        continue;
                    }
                    scanner.token = Token::None;
                    if number_prefix_len(&input[start..idx]) != idx - start {
                        break;
                    }
                    scanner.complete_value(idx);
                    // `byte` still needs structural handling below.
                }
                Token::Literal { target, matched } => {
                    if target.get(matched) != Some(&byte) {
                        break;
                    }
                    if matched + 1 == target.len() {
                        scanner.token = Token::None;
                        scanner.complete_value(idx + 1);
                    } else {
                        scanner.token = Token::Literal {
                            target,
                            matched: matched + 1,
                        };
                    }
                    continue;
                }
                Token::None => {}
            }

            if !scanner.structural(idx, byte) {
                break;
            }
        }

        if let Token::Number { start } = scanner.token {
            let len = number_prefix_len(&input[start..]);
            if len > 0 {
                scanner.cut = start + len;
            }
        }

        scanner
    }

    /// Handle a byte outside of any token. Returns `false` when the byte
    /// cannot continue the document.
    fn structural(&mut self, idx: usize, byte: u8) -> bool {
        if is_whitespace(byte) {
            return true;
        }
        match self.expect {
            Expect::Value => self.begin_value(idx, byte),
            Expect::ElementOrEnd => {
                if byte == b']' {
                    self.close(idx)
                } else {
                    self.begin_value(idx, byte)
                }
            }
            Expect::KeyOrEnd => match byte {
                b'"' => self.begin_key(),
                b'}' => self.close(idx),
                _ => false,
            },
            Expect::Key => byte == b'"' && self.begin_key(),
            Expect::Colon => {
                if byte == b':' {
                    self.expect = Expect::Value;
                    true
                } else {
                    false
                }
            }
            Expect::CommaOrEnd => match (byte, self.scopes.last()) {
                (b',', Some(Scope::Object)) => {
                    self.expect = Expect::Key;
                    true
                }
                (b',', Some(Scope::Array)) => {
                    self.expect = Expect::Value;
                    true
                }
                (b'}', Some(Scope::Object)) | (b']', Some(Scope::Array)) => self.close(idx),
                _ => false,
            },
            Expect::Done => false,
        }
    }

    fn begin_value(&mut self, idx: usize, byte: u8) -> bool {
        match byte {
            b'{' => self.open(idx, Scope::Object, Expect::KeyOrEnd),
            b'[' => self.open(idx, Scope::Array, Expect::ElementOrEnd),
            b'"' => {
                self.token = Token::String {
                    key: false,
                    escaped: false,
                };
                true
            }
            b'-' | b'0'..=b'9' => {
                self.token = Token::Number { start: idx };
                true
            }
            b't' => self.begin_literal(b"true"),
            b'f' => self.begin_literal(b"false"),
            b'n' => self.begin_literal(b"null"),
            _ => false,
        }
    }

    fn begin_key(&mut self) -> bool {
        self.token = Token::String {
            key: true,
            escaped: false,
        };
        true
    }

    fn begin_literal(&mut self, target: &'static [u8]) -> bool {
        self.token = Token::Literal { target, matched: 1 };
        true
    }

    fn open(&mut self, idx: usize, scope: Scope, expect: Expect) -> bool {
        self.scopes.push(scope);
        self.cut = idx + 1;
        self.expect = expect;
        true
    }

    fn close(&mut self, idx: usize) -> bool {
        self.scopes.pop();
        self.complete_value(idx + 1);
        true
    }

    fn complete_value(&mut self, end: usize) {
        self.cut = end;
        self.expect = if self.scopes.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

/// Length of the longest prefix of `bytes` that is a valid JSON number.
fn number_prefix_len(bytes: &[u8]) -> usize {
    let digits_from = |mut i: usize| {
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        i
    };

    let mut i = usize::from(bytes.first() == Some(&b'-'));
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = digits_from(i + 1),
        _ => return 0,
    }
    let mut valid = i;

    if bytes.get(i) == Some(&b'.') {
        let end = digits_from(i + 1);
        if end == i + 1 {
            return valid;
        }
        i = end;
        valid = i;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut exponent = i + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let end = digits_from(exponent);
        if end > exponent {
            valid = end;
        }
    }

    valid
}
