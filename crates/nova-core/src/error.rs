//! Error types for configuration and version parsing.

use thiserror::Error;

/// Result type alias for nova-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading configuration or parsing versions.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("invalid API version: {0:?}")]
    InvalidVersion(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
