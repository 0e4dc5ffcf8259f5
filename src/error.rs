//! Error types surfaced by the air quality engine
//!
//! Only two kinds of failure ever reach a caller of the engine: malformed
//! input (`Validation`) and configuration bugs detected while computing
//! (`InternalCompute`). Upstream provider trouble is modelled separately as
//! [`crate::providers::ProviderFailure`] and is absorbed by the fallback chain.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single offending input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum AqiError {
    /// Input validation errors, carrying every violated field
    #[error("Invalid input: {}", join_violations(.violations))]
    Validation { violations: Vec<FieldViolation> },

    /// Defensive failures that indicate a configuration bug
    #[error("Internal compute error: {message}")]
    InternalCompute { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AqiError {
    /// Create a validation error for a single field
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            violations: vec![FieldViolation::new(field, message)],
        }
    }

    /// Create a validation error from an accumulated set of violations
    #[must_use]
    pub fn violations(violations: Vec<FieldViolation>) -> Self {
        Self::Validation { violations }
    }

    /// Create a new internal compute error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::InternalCompute {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Names of the fields that failed validation, empty for other variants
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<&str> {
        match self {
            Self::Validation { violations } => {
                violations.iter().map(|v| v.field.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            AqiError::Validation { violations } => {
                format!("Invalid input: {}", join_violations(violations))
            }
            AqiError::InternalCompute { .. } => {
                "Air quality could not be computed due to a server configuration problem."
                    .to_string()
            }
            AqiError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let validation_err = AqiError::validation("latitude", "out of range");
        assert!(validation_err.is_validation());
        assert_eq!(validation_err.invalid_fields(), vec!["latitude"]);

        let internal_err = AqiError::internal("missing table");
        assert!(matches!(internal_err, AqiError::InternalCompute { .. }));
        assert!(internal_err.invalid_fields().is_empty());
    }

    #[test]
    fn test_validation_lists_every_field() {
        let err = AqiError::violations(vec![
            FieldViolation::new("latitude", "must be within [-90, 90]"),
            FieldViolation::new("days", "must be within [1, 30]"),
        ]);
        let text = err.to_string();
        assert!(text.contains("latitude: must be within [-90, 90]"));
        assert!(text.contains("days: must be within [1, 30]"));
    }

    #[test]
    fn test_user_messages() {
        let config_err = AqiError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let internal_err = AqiError::internal("table");
        assert!(internal_err.user_message().contains("configuration problem"));

        let validation_err = AqiError::validation("guess", "test input");
        assert!(validation_err.user_message().contains("test input"));
    }
}
