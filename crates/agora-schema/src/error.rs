//! Schema error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// The first mismatch found while compiling a template or validating a value.
///
/// `field` is a path rooted at `$` (for example `$.items[2].name`), `reason`
/// is a short human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{field}: {reason}")]
pub struct SchemaError {
    /// Path of the offending field.
    pub field: String,
    /// Why the field was rejected.
    pub reason: String,
}

impl SchemaError {
    /// Creates a new schema error.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a "missing required field" error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "missing required field")
    }

    /// Creates a type mismatch error.
    pub fn expected(field: impl Into<String>, expected: &str, got: &serde_json::Value) -> Self {
        Self::new(field, format!("expected {expected}, got {}", kind_of(got)))
    }
}

/// Returns the value kind name used in error messages.
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "number",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
