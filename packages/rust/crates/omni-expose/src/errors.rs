//! Error taxonomy.
//!
//! - [`RegistrationError`]: bad declarations. Fatal at load time.
//! - [`ValidationError`]: bad input at call time. The function never runs.
//! - [`ExecutionError`]: a failure inside the function. Recovered into a
//!   `success: false` envelope at the adapter boundary.

use std::any::Any;
use std::fmt;

use serde_json::{Value, json};
use thiserror::Error;

use omni_expose_scanner::ScanError;

use crate::contract::OutputEnvelope;

/// Rejected declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A function with this name is already registered.
    #[error("function `{0}` is already registered")]
    Duplicate(String),

    /// The function has no return type.
    #[error("function `{0}` declares no output type")]
    MissingOutputType(String),

    /// The return type does not carry the envelope fields.
    #[error("function `{name}` returns `{type_name}`, which lacks envelope fields {missing:?}")]
    InvalidOutputType {
        /// Function name.
        name: String,
        /// Declared return type.
        type_name: String,
        /// Base fields the type does not produce.
        missing: Vec<String>,
    },

    /// Names must match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid function name `{0}`")]
    InvalidName(String),

    /// A parameter declaration is inconsistent.
    #[error("function `{function}`, parameter `{param}`: {reason}")]
    InvalidParameter {
        /// Function name.
        function: String,
        /// Parameter name.
        param: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Methods or interface tags are inconsistent.
    #[error("function `{function}`: {reason}")]
    InvalidDeclaration {
        /// Function name.
        function: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The registry no longer accepts writes.
    #[error("registry is frozen; cannot register `{0}`")]
    Frozen(String),
}

/// Why one field was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldProblem {
    /// Required and absent (or explicitly `null`).
    Missing,
    /// Value has the wrong type.
    WrongType {
        /// Expected kind, e.g. `integer`.
        expected: String,
        /// What was received.
        found: String,
    },
    /// Value is not one of the declared choices.
    NotAllowed {
        /// Accepted values.
        allowed: Vec<Value>,
    },
    /// Not a parameter of the function.
    Unknown,
    /// Given more than once.
    Repeated,
    /// Could not be decoded at all.
    Malformed {
        /// Decoder message.
        reason: String,
    },
}

impl FieldProblem {
    /// Stable identifier used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::WrongType { .. } => "wrong_type",
            Self::NotAllowed { .. } => "not_allowed",
            Self::Unknown => "unknown",
            Self::Repeated => "repeated",
            Self::Malformed { .. } => "malformed",
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "field required"),
            Self::WrongType { expected, found } => write!(f, "expected {expected}, found {found}"),
            Self::NotAllowed { allowed } => {
                let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                write!(f, "value not allowed; expected one of {}", allowed.join(", "))
            }
            Self::Unknown => write!(f, "unknown field"),
            Self::Repeated => write!(f, "given more than once"),
            Self::Malformed { reason } => write!(f, "malformed: {reason}"),
        }
    }
}

/// A rejected field. `$input` names the input as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Parameter name.
    pub field: String,
    /// What went wrong.
    pub problem: FieldProblem,
}

impl FieldError {
    /// Field error for `field`.
    pub fn new(field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }

    /// JSON record used inside validation envelopes.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "field": self.field,
            "kind": self.problem.kind(),
            "message": self.problem.to_string(),
        });
        if let FieldProblem::NotAllowed { allowed } = &self.problem {
            value["allowed"] = Value::Array(allowed.clone());
        }
        value
    }
}

/// Input field name used for errors about the input as a whole.
pub const WHOLE_INPUT: &str = "$input";

/// Invocation input rejected before the function ran.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid input for `{function}`: {}", summarize(.errors))]
pub struct ValidationError {
    /// Function name.
    pub function: String,
    /// Every rejected field, in input order.
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.problem))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Validation error with the given field errors.
    pub fn new(function: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            function: function.into(),
            errors,
        }
    }

    /// Validation error for a single field.
    pub fn single(
        function: impl Into<String>,
        field: impl Into<String>,
        problem: FieldProblem,
    ) -> Self {
        Self::new(function, vec![FieldError::new(field, problem)])
    }

    /// The input as a whole could not be decoded.
    pub fn malformed(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::single(
            function,
            WHOLE_INPUT,
            FieldProblem::Malformed {
                reason: reason.into(),
            },
        )
    }

    /// Names of the rejected fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }

    /// Envelope every adapter reports for this error.
    #[must_use]
    pub fn to_envelope(&self) -> OutputEnvelope {
        let errors: Vec<Value> = self.errors.iter().map(FieldError::to_value).collect();
        OutputEnvelope {
            result: json!({ "errors": errors }),
            ..OutputEnvelope::failure(self.to_string())
        }
    }
}

/// Failure raised inside an exposed function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// Text reported as the envelope message.
    pub message: String,
}

impl ExecutionError {
    /// Execution error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Execution error from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(text) = payload.downcast_ref::<&str>() {
            Self::new(*text)
        } else if let Some(text) = payload.downcast_ref::<String>() {
            Self::new(text.clone())
        } else {
            Self::new("function panicked")
        }
    }
}

/// A validated value could not be converted to the declared Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument `{param}`: {reason}")]
pub struct ArgumentError {
    /// Parameter name.
    pub param: String,
    /// Deserialisation message.
    pub reason: String,
}

impl ArgumentError {
    /// Argument error for `param`.
    pub fn new(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

/// Failure returned by a type-erased handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Argument extraction failed; reported as a validation error.
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    /// The function itself failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Autodiscovery failure.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The source tree could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// A discovered declaration was rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
