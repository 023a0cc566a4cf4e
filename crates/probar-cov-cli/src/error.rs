//! CLI error types

use probar_cov::CoverageError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Server failed to start or stopped unexpectedly
    #[error("Server error: {message}")]
    Server {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed coverage input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Coverage library error
    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a server error
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Threshold failure messages, if this is a threshold failure
    #[must_use]
    pub fn threshold_failures(&self) -> Option<&[String]> {
        match self {
            Self::Coverage(CoverageError::ThresholdFailure { failures }) => Some(failures),
            _ => None,
        }
    }
}
