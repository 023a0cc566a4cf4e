//! Result and error types for probar-cov.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for coverage operations
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Errors that can occur while instrumenting, collecting or validating coverage
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A glob in the include/exclude rules does not compile
    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Parser message
        message: String,
    },

    /// The instrumentation engine cannot produce output for this asset.
    ///
    /// Never escapes the cache: callers see a miss instead.
    #[error("{} is not instrumentable: {reason}", path.display())]
    NotInstrumentable {
        /// Asset path
        path: PathBuf,
        /// Why the engine gave up
        reason: String,
    },

    /// Coverage is below one or more configured thresholds
    #[error("Coverage thresholds not met:\n{}", failures.join("\n"))]
    ThresholdFailure {
        /// One human readable message per failed check
        failures: Vec<String>,
    },

    /// A reporter failed to write its output
    #[error("Reporter '{reporter}' failed: {message}")]
    Report {
        /// Reporter name
        reporter: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoverageError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not-instrumentable error for `path`
    #[must_use]
    pub fn not_instrumentable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotInstrumentable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a reporter error
    #[must_use]
    pub fn report(reporter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Report {
            reporter: reporter.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an expected, locally recovered outcome
    #[must_use]
    pub const fn is_not_instrumentable(&self) -> bool {
        matches!(self, Self::NotInstrumentable { .. })
    }
}
