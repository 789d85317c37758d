//! Declarative description of the structured output an endpoint expects.
//!
//! A [`Schema`] is shared between the side that asks the model for a
//! document (it is rendered with [`Schema::to_json_schema`] into the output
//! constraint) and the side that parses the streamed result (coercion and
//! validation walk the same tree).

use alloc::{borrow::ToOwned, boxed::Box, string::String, vec::Vec};

use serde_json::{Map, Value, json};

/// Shape and type constraints for a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any JSON string.
    String,
    /// A JSON number, optionally bounded (both bounds inclusive).
    Number {
        /// Smallest accepted value.
        minimum: Option<f64>,
        /// Largest accepted value.
        maximum: Option<f64>,
    },
    /// `true` or `false`.
    Boolean,
    /// A string restricted to a fixed set of members.
    Enum(Vec<String>),
    /// A list whose items all match the inner schema.
    Array(Box<Schema>),
    /// A closed object with declared fields.
    Object(ObjectSchema),
}

/// The fields of an object schema plus an optional description of the whole
/// object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    /// Declared fields, in output order.
    pub fields: Vec<Field>,
    /// Description of the object as a whole.
    pub description: Option<String>,
}

/// A named, described member of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Key of the field in the JSON object.
    pub name: String,
    /// Guidance for the model, rendered into the JSON Schema.
    pub description: Option<String>,
    /// Constraint on the field's value.
    pub schema: Schema,
    /// Whether the final value must contain the field.
    pub required: bool,
}

impl Field {
    /// A required field.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema,
            required: true,
        }
    }

    /// Attach a description to the field.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Allow the field to be absent from the final value.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl Schema {
    /// An unbounded number.
    #[must_use]
    pub const fn number() -> Self {
        Schema::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// A number within `[minimum, maximum]`.
    #[must_use]
    pub const fn bounded(minimum: f64, maximum: f64) -> Self {
        Schema::Number {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    /// A string that must be one of `members`.
    #[must_use]
    pub fn enumeration<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum(members.into_iter().map(Into::into).collect())
    }

    /// A list of `items`.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    /// A closed object of `fields`, all of them required unless marked
    /// [`Field::optional`].
    #[must_use]
    pub fn object<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Field>,
    {
        Schema::Object(ObjectSchema {
            fields: fields.into_iter().collect(),
            description: None,
        })
    }

    /// Attach a description to an object schema. Other schemas are returned
    /// unchanged; describe their enclosing [`Field`] instead.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        if let Schema::Object(object) = &mut self {
            object.description = Some(description.into());
        }
        self
    }

    /// The object description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Schema::Object(object) => object.description.as_deref(),
            _ => None,
        }
    }

    /// Name of the JSON type this schema accepts, as used in error messages
    /// and in the rendered JSON Schema.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::String | Schema::Enum(_) => "string",
            Schema::Number { .. } => "number",
            Schema::Boolean => "boolean",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
        }
    }

    /// Render the schema as a JSON Schema document, the form model providers
    /// accept as an output constraint.
    ///
    /// Field names, types, and descriptions are all carried over; objects are
    /// closed (`additionalProperties: false`).
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_owned(), Value::from(self.type_name()));
        match self {
            Schema::String | Schema::Boolean => {}
            Schema::Number { minimum, maximum } => {
                if let Some(min) = minimum {
                    out.insert("minimum".to_owned(), json!(min));
                }
                if let Some(max) = maximum {
                    out.insert("maximum".to_owned(), json!(max));
                }
            }
            Schema::Enum(members) => {
                out.insert("enum".to_owned(), json!(members));
            }
            Schema::Array(items) => {
                out.insert("items".to_owned(), items.to_json_schema());
            }
            Schema::Object(object) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in &object.fields {
                    let mut property = field.schema.to_json_schema();
                    if let (Some(description), Value::Object(property)) =
                        (&field.description, &mut property)
                    {
                        property.insert("description".to_owned(), Value::from(description.as_str()));
                    }
                    properties.insert(field.name.clone(), property);
                    if field.required {
                        required.push(Value::from(field.name.as_str()));
                    }
                }
                out.insert("properties".to_owned(), Value::Object(properties));
                out.insert("required".to_owned(), Value::Array(required));
                out.insert("additionalProperties".to_owned(), Value::Bool(false));
                if let Some(description) = &object.description {
                    out.insert("description".to_owned(), Value::from(description.as_str()));
                }
            }
        }
        Value::Object(out)
    }

    /// Declared fields of an object schema; empty for every other schema.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        match self {
            Schema::Object(object) => &object.fields,
            _ => &[],
        }
    }
}
