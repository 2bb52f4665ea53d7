//! Error types for the audit core.
//!
//! Two error kinds matter to callers: [`AuditError::InvalidInput`] for every
//! precondition a request can violate (missing dataset, unknown column, bad
//! percentage, ...) and [`AuditError::Computation`] for failures inside a
//! numerical fit. Both carry a human-readable message that is safe to show
//! to the analyst.
//!
//! Errors serialize as `{ "code": ..., "message": ... }` so a transport layer
//! can forward them without inspecting the variant.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the audit core.
#[derive(Error, Debug)]
pub enum AuditError {
    /// A request precondition was violated.
    #[error("{0}")]
    InvalidInput(String),

    /// A numerical fit or search failed. The underlying message is kept verbatim.
    #[error("{0}")]
    Computation(String),

    /// A long-running analysis observed its cancellation token.
    #[error("Analysis cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AuditError>,
    },
}

impl AuditError {
    /// Shorthand for [`AuditError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for [`AuditError::Computation`].
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AuditError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for transport layers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Computation(_) => "COMPUTATION_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is a request-level precondition failure.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::WithContext { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl Serialize for AuditError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AuditError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AuditError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(AuditError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            AuditError::invalid_input("No dataset available").error_code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            AuditError::computation("fold failure").error_code(),
            "COMPUTATION_ERROR"
        );
    }

    #[test]
    fn test_message_is_verbatim() {
        let error = AuditError::computation(
            "Cannot have number of splits n_splits=3 greater than the number of samples: n_samples=2.",
        );
        assert_eq!(
            error.to_string(),
            "Cannot have number of splits n_splits=3 greater than the number of samples: n_samples=2."
        );
    }

    #[test]
    fn test_is_invalid_input() {
        assert!(AuditError::invalid_input("x").is_invalid_input());
        assert!(!AuditError::computation("x").is_invalid_input());
        assert!(
            AuditError::invalid_input("x")
                .with_context("During filter")
                .is_invalid_input()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = AuditError::invalid_input("Sensitive variable Age not found in columns");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("INVALID_INPUT"));
        assert!(json.contains("Age"));
    }

    #[test]
    fn test_with_context() {
        let error = AuditError::Cancelled.with_context("During FACET grid search");
        assert!(error.to_string().contains("During FACET grid search"));
        assert_eq!(error.error_code(), "CANCELLED");
        assert!(error.is_cancelled());
    }
}
