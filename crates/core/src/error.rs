//! Error types shared by the value model and rule types.

use thiserror::Error;

use crate::RuleId;

/// Errors raised by the value model, rule validation, and path parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Rule not found
    #[error("Rule not found: {0:?}")]
    RuleNotFound(RuleId),

    /// Field-specific validation failure
    #[error("Validation failed for field '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    /// Type mismatch during coercion or arithmetic
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Invalid path format
    #[error("Invalid path format: {0}")]
    InvalidPath(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::SerializationError(e.to_string())
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
