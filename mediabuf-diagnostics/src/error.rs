//! Error types for diagnostics

use thiserror::Error;

/// Errors raised while installing logging or rendering diagnostics
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// A filter directive could not be parsed
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// Directive as given
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber could not be installed
    #[error("Failed to install subscriber: {reason}")]
    SubscriberInstall {
        /// Why installation failed
        reason: String,
    },

    /// A snapshot could not be rendered
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for diagnostics operations
pub type DiagnosticsResult<T> = Result<T, DiagnosticsError>;
