//! Policy configuration error types.
//!
//! Domain-specific errors for loading, parsing, and validating policy
//! documents and engine configuration.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Policy configuration errors.
///
/// These errors occur when loading engine configuration or policy documents
/// from disk, parsing TOML, or validating a materialized policy snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to access configuration file: {path} - {reason}")]
    FileAccessError { path: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    ParseError { reason: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Policy configuration unavailable for project {project_id}: {reason}")]
    StoreUnavailable { project_id: u64, reason: String },
}

impl ConfigurationError {
    /// Creates an `InvalidConfiguration` error for a field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for configuration operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
