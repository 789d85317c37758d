use serde_json::{Map, Value};

use crate::schema::Schema;

/// Shape a leniently parsed value after `schema` for use as a partial value.
///
/// Objects keep only the declared fields that are present; nothing is
/// filled in for fields that have not arrived. Array elements are coerced
/// against the item schema. Leaves are passed through as parsed, even when
/// they do not match their declared type or enum: only the final validation
/// step rejects values.
#[must_use]
pub fn coerce(schema: &Schema, value: &Value) -> Value {
    match (schema, value) {
        (Schema::Object(object), Value::Object(map)) => {
            let mut out = Map::new();
            for field in &object.fields {
                if let Some(child) = map.get(&field.name) {
                    out.insert(field.name.clone(), coerce(&field.schema, child));
                }
            }
            Value::Object(out)
        }
        (Schema::Array(items), Value::Array(elements)) => {
            Value::Array(elements.iter().map(|e| coerce(items, e)).collect())
        }
        _ => value.clone(),
    }
}
