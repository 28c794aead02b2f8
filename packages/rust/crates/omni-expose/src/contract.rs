//! Output contract shared by every exposed function.
//!
//! Every invocation produces an [`OutputEnvelope`]:
//!
//! ```json
//! {"result": <any>, "success": <bool>, "message": <string|null>}
//! ```
//!
//! Return types may extend the envelope with extra top-level fields; the
//! three base fields are never removed. [`OutputShape`] records the fields a
//! return type produces so the registry can reject non-conforming types.

use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ExecutionError;

/// Fields every output type must carry.
pub const ENVELOPE_FIELDS: [&str; 3] = ["result", "success", "message"];

/// The `{result, success, message}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputEnvelope {
    /// Function result.
    pub result: Value,
    /// `false` signals a recovered failure.
    pub success: bool,
    /// Human-readable note; serialised as `null` when absent.
    #[serde(default)]
    pub message: Option<String>,
    /// Structural extensions, flattened next to the base fields.
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

/// Short alias used in function signatures.
pub type Output = OutputEnvelope;

impl OutputEnvelope {
    /// Successful envelope with no message.
    pub fn ok(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
            success: true,
            message: None,
            extra: Map::new(),
        }
    }

    /// Successful envelope carrying a message.
    pub fn ok_with_message(result: impl Into<Value>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(result)
        }
    }

    /// Recovered failure: `result` is `null`, `success` is `false`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: Value::Null,
            success: false,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// Add an extension field. Base field names are ignored.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !ENVELOPE_FIELDS.contains(&key.as_str()) {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Build an envelope from any serialisable record that carries the base
    /// fields, keeping the remaining fields as extensions.
    ///
    /// # Errors
    ///
    /// Fails when `value` does not serialise to an object with a boolean
    /// `success` field.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, ExecutionError> {
        let Value::Object(mut fields) = serde_json::to_value(value)
            .map_err(|e| ExecutionError::new(format!("output is not serialisable: {e}")))?
        else {
            return Err(ExecutionError::new("output must serialise to an object"));
        };
        let Some(Value::Bool(success)) = fields.remove("success") else {
            return Err(ExecutionError::new("output lacks a boolean `success` field"));
        };
        let result = fields.remove("result").unwrap_or(Value::Null);
        let message = match fields.remove("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        };
        Ok(Self {
            result,
            success,
            message,
            extra: fields,
        })
    }

    /// Wire form of the envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("result".to_string(), self.result.clone());
        object.insert("success".to_string(), Value::Bool(self.success));
        object.insert(
            "message".to_string(),
            self.message.clone().map_or(Value::Null, Value::String),
        );
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Fields produced by a return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputShape {
    /// Rust type name, for error messages.
    pub type_name: String,
    /// Top-level field names.
    pub fields: Vec<String>,
}

impl OutputShape {
    /// Shape with the given fields.
    pub fn new(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Shape of [`OutputEnvelope`] itself.
    #[must_use]
    pub fn envelope() -> Self {
        Self::new("OutputEnvelope", ENVELOPE_FIELDS)
    }

    /// Envelope plus extension fields.
    pub fn extending(
        type_name: impl Into<String>,
        extra: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut shape = Self::envelope();
        shape.type_name = type_name.into();
        shape.fields.extend(extra.into_iter().map(Into::into));
        shape
    }

    /// Base fields this shape lacks.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        ENVELOPE_FIELDS
            .iter()
            .filter(|base| !self.fields.iter().any(|f| f == *base))
            .map(|base| (*base).to_string())
            .collect()
    }

    /// True when the shape is the envelope or a structural extension of it.
    #[must_use]
    pub fn satisfies_contract(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fields beyond the base three.
    pub fn extension_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .filter(|f| !ENVELOPE_FIELDS.contains(f))
    }
}

/// Implemented by every type an exposed function may return.
///
/// Custom records extend the envelope by reporting their fields in
/// [`OutputContract::shape`] and converting with
/// [`OutputEnvelope::from_serializable`].
pub trait OutputContract {
    /// Fields this type produces.
    fn shape() -> OutputShape;

    /// Convert a returned value into an envelope.
    ///
    /// # Errors
    ///
    /// An `Err` here is reported as a recovered execution failure.
    fn into_outcome(self) -> Result<OutputEnvelope, ExecutionError>;
}

impl OutputContract for OutputEnvelope {
    fn shape() -> OutputShape {
        OutputShape::envelope()
    }

    fn into_outcome(self) -> Result<OutputEnvelope, ExecutionError> {
        Ok(self)
    }
}

impl<T, E> OutputContract for Result<T, E>
where
    T: OutputContract,
    E: Display,
{
    fn shape() -> OutputShape {
        let inner = T::shape();
        OutputShape {
            type_name: format!("Result<{}, _>", inner.type_name),
            fields: inner.fields,
        }
    }

    fn into_outcome(self) -> Result<OutputEnvelope, ExecutionError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(error) => Err(ExecutionError::new(error.to_string())),
        }
    }
}
