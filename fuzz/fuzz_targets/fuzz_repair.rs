#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use objstream::{ParseState, parse_partial, repair};
use serde_json::{Map, Value};

#[derive(Debug)]
struct ArbitraryValue(Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(21)? {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => {
                let n: f64 = u.arbitrary()?;
                Value::Number(
                    serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?,
                )
            }
            3..=10 => Value::String(u.arbitrary()?),
            11..=15 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::Array(elems.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let members: Vec<(String, ArbitraryValue)> = u.arbitrary()?;
                Value::Object(members.into_iter().map(|(k, v)| (k, v.0)).collect::<Map<_, _>>())
            }
        };
        Ok(ArbitraryValue(value))
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    value: ArbitraryValue,
    pretty: bool,
    cut: u32,
}

// Any truncation of a valid document repairs to a valid document.
fuzz_target!(|input: Input| {
    let text = if input.pretty {
        serde_json::to_string_pretty(&input.value.0)
    } else {
        serde_json::to_string(&input.value.0)
    }
    .unwrap();

    let mut end = input.cut as usize % (text.len() + 1);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let prefix = &text[..end];

    let repaired = repair(prefix);
    if let Err(err) = serde_json::from_str::<Value>(&repaired) {
        panic!("repair({prefix:?}) = {repaired:?} is not valid JSON: {err}");
    }
    if end == text.len() {
        assert_eq!(parse_partial(prefix).1, ParseState::Successful);
    }
});
