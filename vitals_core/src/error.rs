//! Error types for the vitals_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vitals_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error (config file or an invalid change policy)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected at construction time
    #[error("Validation error: {field} = {value}: {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted data failed shape validation
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a validation error for `field` holding `value`
    pub fn validation(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::Validation {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
