use alloc::{string::String, vec::Vec};

use quickcheck::{Arbitrary, Gen};
use serde_json::{Map, Number, Value};

/// An arbitrary JSON document, at most a few levels deep.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArbitraryJson(pub Value);

fn leaf(g: &mut Gen) -> Value {
    match usize::arbitrary(g) % 5 {
        0 => Value::Null,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::from(i64::arbitrary(g)),
        3 => {
            let mut float = f64::arbitrary(g);
            while !float.is_finite() {
                float = f64::arbitrary(g);
            }
            Number::from_f64(float).map_or(Value::Null, Value::Number)
        }
        _ => Value::String(String::arbitrary(g)),
    }
}

fn gen_value(g: &mut Gen, depth: usize) -> Value {
    if depth == 0 {
        return leaf(g);
    }
    match usize::arbitrary(g) % 3 {
        0 => leaf(g),
        1 => {
            let len = usize::arbitrary(g) % 4;
            Value::Array((0..len).map(|_| gen_value(g, depth - 1)).collect::<Vec<_>>())
        }
        _ => {
            let len = usize::arbitrary(g) % 4;
            let mut map = Map::new();
            for _ in 0..len {
                map.insert(String::arbitrary(g), gen_value(g, depth - 1));
            }
            Value::Object(map)
        }
    }
}

impl Arbitrary for ArbitraryJson {
    fn arbitrary(g: &mut Gen) -> Self {
        let depth = usize::arbitrary(g) % 4;
        Self(gen_value(g, depth))
    }
}
