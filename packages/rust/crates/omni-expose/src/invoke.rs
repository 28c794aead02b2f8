//! Validate -> call -> wrap, shared by every adapter.

use std::panic::{self, AssertUnwindSafe};

use crate::contract::OutputEnvelope;
use crate::errors::{ExecutionError, FieldProblem, HandlerError, ValidationError};
use crate::registry::FunctionEntry;
use crate::schema::{Kwargs, RawInput};

/// Validate `input` against the entry's schema for its shape, then call.
///
/// Execution failures (an `Err` return or a panic) are recovered into a
/// `success: false` envelope; only input problems surface as errors.
///
/// # Errors
///
/// Returns [`ValidationError`] when the input is rejected. The function is
/// not called in that case.
pub fn invoke(entry: &FunctionEntry, input: &RawInput) -> Result<OutputEnvelope, ValidationError> {
    let kwargs = entry.schema(input.shape()).validate(&entry.name, input)?;
    call_validated(entry, kwargs)
}

/// Call an entry with kwargs that already passed validation.
///
/// # Errors
///
/// Returns [`ValidationError`] when a value cannot be converted to the
/// parameter's Rust type.
pub fn call_validated(
    entry: &FunctionEntry,
    kwargs: Kwargs,
) -> Result<OutputEnvelope, ValidationError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.call(kwargs)));
    match outcome {
        Ok(Ok(envelope)) => {
            tracing::debug!(
                function = %entry.name,
                success = envelope.success,
                "function returned"
            );
            Ok(envelope)
        }
        Ok(Err(HandlerError::Argument(error))) => {
            tracing::debug!(function = %entry.name, param = %error.param, "argument rejected");
            Err(ValidationError::single(
                &entry.name,
                error.param,
                FieldProblem::Malformed {
                    reason: error.reason,
                },
            ))
        }
        Ok(Err(HandlerError::Execution(error))) => Ok(recovered(entry, &error)),
        Err(payload) => Ok(recovered(entry, &ExecutionError::from_panic(&*payload))),
    }
}

fn recovered(entry: &FunctionEntry, error: &ExecutionError) -> OutputEnvelope {
    tracing::warn!(function = %entry.name, error = %error, "function failed; recovered");
    OutputEnvelope::failure(error.message.clone())
}
