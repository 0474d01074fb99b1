//! Error types for mediabuf
//!
//! Every fallible operation on a source buffer returns a [`BufferError`].
//! Synchronous rejections (`InvalidState`, `InvalidAccess`) leave the buffer
//! untouched; `Decode` is terminal for the buffering session.

use thiserror::Error;

/// Failure reported by a segment parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The bytes do not form a valid segment
    #[error("Malformed segment: {reason}")]
    Malformed {
        /// What was wrong with the data
        reason: String,
    },

    /// The segment uses a codec or layout the parser does not handle
    #[error("Unsupported segment: {reason}")]
    Unsupported {
        /// What was not supported
        reason: String,
    },

    /// The parser has been detached and no longer accepts data
    #[error("Parser detached")]
    Detached,
}

/// Main error type for source buffer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Operation is not allowed in the buffer's current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Why the operation was rejected
        message: String,
    },

    /// Arguments are outside their allowed range
    #[error("Invalid access: {message}")]
    InvalidAccess {
        /// Which argument was rejected
        message: String,
    },

    /// Eviction could not free enough memory for the incoming data
    #[error("Quota exceeded: {requested} bytes requested, {available} bytes available")]
    QuotaExceeded {
        /// Size of the rejected append
        requested: usize,
        /// Remaining room under the budget
        available: usize,
    },

    /// Media data is malformed or inconsistent
    #[error("Decode error: {reason}")]
    Decode {
        /// Reason for the decode failure
        reason: String,
    },

    /// Network failure reported by the host
    #[error("Network error: {reason}")]
    Network {
        /// Reason for the network failure
        reason: String,
    },

    /// Segment parser failure
    #[error("Parse error: {source}")]
    Parse {
        /// Underlying parser error
        #[from]
        source: ParseError,
    },
}

/// Result type alias for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

impl BufferError {
    /// Shorthand for [`BufferError::InvalidState`]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        BufferError::InvalidState {
            message: message.into(),
        }
    }

    /// Shorthand for [`BufferError::InvalidAccess`]
    pub fn invalid_access(message: impl Into<String>) -> Self {
        BufferError::InvalidAccess {
            message: message.into(),
        }
    }

    /// Shorthand for [`BufferError::Decode`]
    pub fn decode(reason: impl Into<String>) -> Self {
        BufferError::Decode {
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable
    ///
    /// A recoverable error fails only the call that produced it; the buffer
    /// keeps accepting data afterwards.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BufferError::InvalidState { .. } => true,
            BufferError::InvalidAccess { .. } => true,
            BufferError::QuotaExceeded { .. } => true,
            BufferError::Network { .. } => true,
            BufferError::Decode { .. } => false,
            BufferError::Parse { .. } => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            BufferError::InvalidState { .. } => ErrorCategory::State,
            BufferError::InvalidAccess { .. } => ErrorCategory::Argument,
            BufferError::QuotaExceeded { .. } => ErrorCategory::Memory,
            BufferError::Decode { .. } => ErrorCategory::Media,
            BufferError::Parse { .. } => ErrorCategory::Media,
            BufferError::Network { .. } => ErrorCategory::Network,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operation attempted in the wrong state
    State,
    /// Invalid arguments
    Argument,
    /// Memory budget errors
    Memory,
    /// Malformed or inconsistent media
    Media,
    /// Network-related errors
    Network,
}
