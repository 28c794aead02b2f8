//! Transport schemas and the shared validation used by every adapter.
//!
//! Two shapes:
//!
//! - **Query**: flat `key=value` strings (HTTP `GET`/`DELETE`, CLI flags),
//!   coerced per [`ParamKind`]. Complex parameters are accepted as a
//!   JSON-encoded string.
//! - **Body**: a JSON object (HTTP `POST`/`PUT`, tool calls) whose values must
//!   already have the right JSON type.
//!
//! In both shapes unknown keys are rejected, an explicit `null` means "use
//! the default", and omitted optional parameters are filled with their
//! default, so validated [`Kwargs`] always carry every declared parameter.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value, json};

use crate::errors::{ArgumentError, FieldError, FieldProblem, ValidationError, WHOLE_INPUT};
use crate::introspect::{ParamKind, ParameterSpec};

/// Input shape of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaShape {
    /// Flat string pairs.
    Query,
    /// JSON object.
    Body,
}

/// Undecoded invocation input.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// Key/value pairs in arrival order; keys may repeat.
    Query(Vec<(String, String)>),
    /// JSON body; `null` counts as `{}`.
    Body(Value),
}

impl RawInput {
    /// Shape of this input.
    #[must_use]
    pub fn shape(&self) -> SchemaShape {
        match self {
            Self::Query(_) => SchemaShape::Query,
            Self::Body(_) => SchemaShape::Body,
        }
    }

    /// Query input from string pairs.
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Query(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validated keyword arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs(Map<String, Value>);

impl Kwargs {
    /// Empty kwargs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Insert a value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Remove a value and deserialise it into the parameter's Rust type. A
    /// missing value is read as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError`] when the value does not fit `T`.
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, ArgumentError> {
        let value = self.0.remove(name).unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ArgumentError::new(name, e.to_string()))
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Underlying JSON map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the JSON map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Kwargs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// Parameter name.
    pub name: String,
    /// Kind to validate against.
    pub kind: ParamKind,
    /// Whether the field must be given.
    pub required: bool,
    /// Value used when the field is omitted.
    pub default: Option<Value>,
    /// Help text.
    pub description: String,
}

/// Validation schema for one function and one input shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    shape: SchemaShape,
    fields: Vec<SchemaField>,
}

/// Build the schema of `params` for `shape`. Pure: equal inputs give equal
/// schemas.
#[must_use]
pub fn build_schema(params: &[ParameterSpec], shape: SchemaShape) -> Schema {
    Schema {
        shape,
        fields: params
            .iter()
            .map(|p| SchemaField {
                name: p.name.clone(),
                kind: p.kind.clone(),
                required: p.required,
                default: p.default.clone(),
                description: p.description.clone(),
            })
            .collect(),
    }
}

impl Schema {
    /// Input shape.
    #[must_use]
    pub fn shape(&self) -> SchemaShape {
        self.shape
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON Schema rendering.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut property = match (&field.kind, self.shape) {
                (ParamKind::Complex(hint), SchemaShape::Query) => json!({
                    "type": "string",
                    "contentMediaType": "application/json",
                    "contentSchema": hint,
                }),
                (kind, _) => kind.json_schema(),
            };
            if let Value::Object(object) = &mut property {
                object.insert("description".into(), Value::String(field.description.clone()));
                if let Some(default) = &field.default {
                    object.insert("default".into(), default.clone());
                }
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate raw input into kwargs.
    ///
    /// Every problem in the input is reported, not just the first.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when any field is missing, unknown,
    /// repeated, or of the wrong type, or when the input is not an object.
    pub fn validate(&self, function: &str, input: &RawInput) -> Result<Kwargs, ValidationError> {
        let mut errors = Vec::new();
        let Some(provided) = collect_provided(input, &mut errors) else {
            return Err(ValidationError::new(function, errors));
        };

        for (key, _) in &provided {
            if self.field(key).is_none() {
                errors.push(FieldError::new(key.clone(), FieldProblem::Unknown));
            }
        }

        let mut kwargs = Kwargs::new();
        for field in &self.fields {
            let given = provided
                .iter()
                .find(|(key, _)| *key == field.name)
                .map(|(_, value)| value)
                .filter(|value| !value.is_null());
            let resolved = match given {
                Some(value) => self.coerce(&field.kind, value),
                None => field.default.clone().ok_or(FieldProblem::Missing),
            };
            match resolved {
                Ok(value) => kwargs.insert(field.name.clone(), value),
                Err(problem) => errors.push(FieldError::new(field.name.clone(), problem)),
            }
        }

        if errors.is_empty() {
            Ok(kwargs)
        } else {
            Err(ValidationError::new(function, errors))
        }
    }

    fn coerce(&self, kind: &ParamKind, value: &Value) -> Result<Value, FieldProblem> {
        match (self.shape, value) {
            (SchemaShape::Query, Value::String(text)) => coerce_text(kind, text),
            _ => check_json(kind, value),
        }
    }
}

/// Flatten the input into `(key, value)` pairs, reporting repeats and a
/// non-object body. `None` when nothing further can be checked.
fn collect_provided(
    input: &RawInput,
    errors: &mut Vec<FieldError>,
) -> Option<Vec<(String, Value)>> {
    match input {
        RawInput::Query(pairs) => {
            let mut seen = HashSet::new();
            let mut reported = HashSet::new();
            let mut provided = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                if seen.insert(key.as_str()) {
                    provided.push((key.clone(), Value::String(value.clone())));
                } else if reported.insert(key.as_str()) {
                    errors.push(FieldError::new(key.clone(), FieldProblem::Repeated));
                }
            }
            Some(provided)
        }
        RawInput::Body(Value::Null) => Some(Vec::new()),
        RawInput::Body(Value::Object(map)) => {
            Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        RawInput::Body(other) => {
            errors.push(FieldError::new(
                WHOLE_INPUT,
                FieldProblem::WrongType {
                    expected: "object".into(),
                    found: json_type(other).into(),
                },
            ));
            None
        }
    }
}

fn coerce_text(kind: &ParamKind, text: &str) -> Result<Value, FieldProblem> {
    let wrong = || FieldProblem::WrongType {
        expected: kind.label().into(),
        found: format!("`{text}`"),
    };
    match kind {
        ParamKind::String => Ok(Value::String(text.to_string())),
        ParamKind::Int => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .map_err(|_| wrong())
        }
        ParamKind::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(wrong),
        ParamKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(wrong()),
        },
        ParamKind::Choice(values) => values
            .iter()
            .find(|v| choice_text(v) == text)
            .cloned()
            .ok_or_else(|| FieldProblem::NotAllowed {
                allowed: values.clone(),
            }),
        ParamKind::Complex(_) => {
            let value: Value = serde_json::from_str(text).map_err(|e| FieldProblem::Malformed {
                reason: format!("expected JSON text: {e}"),
            })?;
            check_json(kind, &value)
        }
    }
}

fn check_json(kind: &ParamKind, value: &Value) -> Result<Value, FieldProblem> {
    if kind.accepts(value) {
        return Ok(value.clone());
    }
    Err(match kind {
        ParamKind::Choice(values) => FieldProblem::NotAllowed {
            allowed: values.clone(),
        },
        ParamKind::Complex(hint) => FieldProblem::WrongType {
            expected: hint
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("json")
                .to_string(),
            found: json_type(value).into(),
        },
        other => FieldProblem::WrongType {
            expected: other.label().into(),
            found: json_type(value).into(),
        },
    })
}

/// How a choice is spelled on a command line or in a query string.
#[must_use]
pub fn choice_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
