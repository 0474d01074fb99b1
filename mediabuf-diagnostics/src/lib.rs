//! # mediabuf Diagnostics
//!
//! Debugging and diagnostic tools for mediabuf.
//! Provides buffer state snapshots, event recording, and structured logging.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod buffer_analyzer;
pub mod debug_logger;
pub mod error;
pub mod event_log;

// Re-export main types
pub use buffer_analyzer::{BufferSnapshot, Finding, RangeSnapshot, TrackSnapshot};
pub use debug_logger::{DebugLogger, LoggingConfig};
pub use error::{DiagnosticsError, DiagnosticsResult};
pub use event_log::{EventLog, EventRecord};
