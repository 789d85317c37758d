use alloc::{
    borrow::ToOwned,
    format,
    string::ToString,
    vec::Vec,
};

use serde_json::{Map, Value};

use crate::{
    error::ValidationError,
    path::Path,
    repair::parse_partial,
    schema::Schema,
};

/// Strictly check `value` against `schema`.
///
/// Returns the validated value with undeclared object keys removed, or the
/// first constraint that failed, in schema field order.
///
/// # Errors
///
/// Fails when a required field is missing, a value has the wrong type, an
/// enum value is not a declared member, or a number is out of bounds.
pub fn validate(schema: &Schema, value: &Value) -> Result<Value, ValidationError> {
    validate_at(schema, value, &Path::root())
}

/// Produce the final value of a stream from its complete buffer.
///
/// Only a buffer that parses strictly can succeed. When it does not, the
/// last recoverable value is still validated so that a truncated document
/// reports the constraint it does not yet meet rather than a syntax error;
/// if that value happens to satisfy the schema the buffer is reported as
/// truncated. The function is pure: the same buffer always yields the same
/// result.
///
/// # Errors
///
/// [`ValidationError::Truncated`] when the buffer ends inside a document
/// whose prefix is otherwise valid, [`ValidationError::MalformedJson`] when
/// it is not JSON at all, otherwise any error of [`validate`].
pub fn finalize(schema: &Schema, buffer: &[u8]) -> Result<Value, ValidationError> {
    let text = core::str::from_utf8(buffer).map_err(|e| {
        ValidationError::MalformedJson(format!("invalid UTF-8 after byte {}", e.valid_up_to()))
    })?;

    let err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return validate(schema, &value),
        Err(err) => err,
    };

    let Some(recovered) = parse_partial(text).0 else {
        return Err(ValidationError::MalformedJson(err.to_string()));
    };
    validate(schema, &recovered)?;

    if err.is_eof() {
        Err(ValidationError::Truncated(err.to_string()))
    } else {
        Err(ValidationError::MalformedJson(err.to_string()))
    }
}

fn validate_at(schema: &Schema, value: &Value, path: &Path) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        path: path.clone(),
        expected: schema.type_name(),
    };

    match schema {
        Schema::String => value.as_str().map(|_| value.clone()).ok_or_else(mismatch),
        Schema::Boolean => value.as_bool().map(Value::Bool).ok_or_else(mismatch),
        Schema::Number { minimum, maximum } => {
            let number = value.as_f64().ok_or_else(mismatch)?;
            let below = minimum.is_some_and(|min| number < min);
            let above = maximum.is_some_and(|max| number > max);
            if below || above {
                return Err(ValidationError::OutOfRange {
                    path: path.clone(),
                    value: number,
                    minimum: minimum.unwrap_or(f64::NEG_INFINITY),
                    maximum: maximum.unwrap_or(f64::INFINITY),
                });
            }
            Ok(value.clone())
        }
        Schema::Enum(members) => {
            let member = value.as_str().ok_or_else(mismatch)?;
            if members.iter().any(|m| m == member) {
                Ok(value.clone())
            } else {
                Err(ValidationError::NotInEnum {
                    path: path.clone(),
                    value: member.to_owned(),
                })
            }
        }
        Schema::Array(items) => {
            let elements = value.as_array().ok_or_else(mismatch)?;
            elements
                .iter()
                .enumerate()
                .map(|(i, element)| validate_at(items, element, &path.join(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Schema::Object(object) => {
            let map = value.as_object().ok_or_else(mismatch)?;
            let mut out = Map::new();
            for field in &object.fields {
                let field_path = path.join(field.name.as_str());
                match map.get(&field.name) {
                    Some(child) => {
                        let child = validate_at(&field.schema, child, &field_path)?;
                        out.insert(field.name.clone(), child);
                    }
                    None if field.required => {
                        return Err(ValidationError::MissingField { path: field_path });
                    }
                    None => {}
                }
            }
            Ok(Value::Object(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{path, schema::Field};

    fn classification() -> Schema {
        Schema::object([
            Field::new("category", Schema::String),
            Field::new("confidence", Schema::bounded(0.0, 1.0)),
            Field::new(
                "subcategories",
                Schema::array(Schema::object([
                    Field::new("name", Schema::String),
                    Field::new("confidence", Schema::bounded(0.0, 1.0)),
                ])),
            ),
            Field::new("explanation", Schema::String).optional(),
        ])
    }

    #[test]
    fn accepts_and_strips_undeclared_keys() {
        let value = json!({
            "category": "tech",
            "confidence": 0.9,
            "subcategories": [{"name": "ml", "confidence": 1, "extra": null}],
            "unexpected": "dropped"
        });
        assert_eq!(
            validate(&classification(), &value),
            Ok(json!({
                "category": "tech",
                "confidence": 0.9,
                "subcategories": [{"name": "ml", "confidence": 1}]
            }))
        );
    }

    #[rstest]
    #[case::missing(
        json!({"confidence": 0.1, "subcategories": []}),
        ValidationError::MissingField { path: path!["category"] }
    )]
    #[case::wrong_type(
        json!({"category": 7, "confidence": 0.1, "subcategories": []}),
        ValidationError::TypeMismatch { path: path!["category"], expected: "string" }
    )]
    #[case::above_bound(
        json!({"category": "a", "confidence": 1.5, "subcategories": []}),
        ValidationError::OutOfRange { path: path!["confidence"], value: 1.5, minimum: 0.0, maximum: 1.0 }
    )]
    #[case::nested_bound(
        json!({"category": "a", "confidence": 0.5, "subcategories": [{"name": "x", "confidence": -0.1}]}),
        ValidationError::OutOfRange { path: path!["subcategories", 0, "confidence"], value: -0.1, minimum: 0.0, maximum: 1.0 }
    )]
    #[case::nested_missing(
        json!({"category": "a", "confidence": 0.5, "subcategories": [{"confidence": 0.2}]}),
        ValidationError::MissingField { path: path!["subcategories", 0, "name"] }
    )]
    #[case::null_optional(
        json!({"category": "a", "confidence": 0.5, "subcategories": [], "explanation": null}),
        ValidationError::TypeMismatch { path: path!["explanation"], expected: "string" }
    )]
    fn rejects(#[case] value: Value, #[case] expected: ValidationError) {
        assert_eq!(validate(&classification(), &value), Err(expected));
    }

    #[test]
    fn enum_members_are_enforced() {
        let schema = Schema::object([Field::new(
            "sentiment",
            Schema::enumeration(["positive", "negative", "neutral"]),
        )]);
        let err = validate(&schema, &json!({"sentiment": "ecstatic"})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotInEnum {
                path: path!["sentiment"],
                value: "ecstatic".into()
            }
        );
        assert_eq!(
            err.to_string(),
            "value ecstatic at `sentiment` is not one of the allowed values"
        );
    }

    #[test]
    fn finalize_names_the_constraint_a_truncated_prefix_misses() {
        let schema = Schema::object([Field::new("sentiment", Schema::String)]);
        assert_eq!(
            finalize(&schema, br#"{"sentiment":"pos"#),
            Err(ValidationError::MissingField {
                path: path!["sentiment"]
            })
        );
    }

    #[rstest]
    #[case::open_object(br#"{"sentiment":"positive""#)]
    #[case::trailing_comma(br#"{"sentiment":"positive","#)]
    #[case::dangling_key(br#"{"sentiment":"positive","topi"#)]
    fn finalize_never_accepts_a_truncated_document(#[case] buffer: &[u8]) {
        let schema = Schema::object([Field::new("sentiment", Schema::String)]);
        assert!(matches!(
            finalize(&schema, buffer),
            Err(ValidationError::Truncated(_))
        ));
    }

    #[test]
    fn finalize_rejects_trailing_text() {
        let schema = Schema::object([Field::new("sentiment", Schema::String)]);
        let err = finalize(&schema, br#"{"sentiment":"positive"} Hope this helps!"#).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedJson(_)));
        assert_eq!(err.path(), None);
    }

    #[test]
    fn finalize_rejects_unparsable_buffers() {
        let schema = Schema::object([]);
        assert!(matches!(
            finalize(&schema, b""),
            Err(ValidationError::MalformedJson(_))
        ));
        assert!(matches!(
            finalize(&schema, b"{\"a\":\"\xff\"}"),
            Err(ValidationError::MalformedJson(_))
        ));
    }
}
