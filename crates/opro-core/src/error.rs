//! Error types for the OPRO engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire OPRO core.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Every failure mode either
/// gets absorbed locally (per-question grading) or leaves the session in a
/// consistent, retryable state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OproError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The proposer exhausted its retries or returned an unusable payload.
    /// The current step is left unchanged; the caller may retry Generate.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A single grading call exhausted its retries. Absorbed inside the
    /// scorer engine (counted as incorrect); surfaced here only for logs
    /// and client-boundary reporting.
    #[error("Grading failed: {0}")]
    Grading(String),

    /// Advance was attempted while the current step still had unscored
    /// (or zero) prompts. No state is mutated.
    #[error("Step {step_number} is incomplete: {reason}")]
    IncompleteStep { step_number: u32, reason: String },

    /// An operation was attempted against a prompt or step in the wrong
    /// state (e.g. Generate on a non-empty step, scoring a scored prompt).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration rejected at the validation boundary.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scoring was requested against an empty question set.
    #[error("Benchmark contains no questions")]
    EmptyBenchmark,

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OproError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Creates a Grading error
    pub fn grading(message: impl Into<String>) -> Self {
        Self::Grading(message.into())
    }

    /// Creates an IncompleteStep error
    pub fn incomplete_step(step_number: u32, reason: impl Into<String>) -> Self {
        Self::IncompleteStep {
            step_number,
            reason: reason.into(),
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Generation error
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation(_))
    }

    /// Check if this is an IncompleteStep error
    pub fn is_incomplete_step(&self) -> bool {
        matches!(self, Self::IncompleteStep { .. })
    }

    /// Check if this is an InvalidState error
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    /// Check if this is a Config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for OproError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for OproError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for OproError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for OproError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (for boundary code that aggregates causes)
impl From<anyhow::Error> for OproError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, OproError>`.
pub type Result<T> = std::result::Result<T, OproError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_helpers() {
        let err = OproError::not_found("session", "abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: session 'abc'");

        let err = OproError::incomplete_step(3, "1 prompt still pending");
        assert!(err.is_incomplete_step());
        assert!(err.to_string().contains("Step 3"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: OproError = io.into();
        assert!(matches!(err, OproError::Io { .. }));
    }

    #[test]
    fn test_serializable() {
        let err = OproError::generation("proposer returned no candidates");
        let json = serde_json::to_string(&err).unwrap();
        // `NotFound::entity_type` is `&'static str`, so deserialization
        // needs `'static` input; leak the small test buffer to satisfy it.
        let back: OproError = serde_json::from_str(Box::leak(json.into_boxed_str())).unwrap();
        assert!(back.is_generation());
    }
}
