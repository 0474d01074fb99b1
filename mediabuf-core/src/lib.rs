//! # mediabuf core
//!
//! Data structures underneath a media source buffer: rational media time,
//! sets of buffered time ranges, the coded frame model, the dual-ordered
//! sample index and the deferred task queue that drives asynchronous appends.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sample;
pub mod sample_map;
pub mod task_queue;
pub mod time;
pub mod time_ranges;

// Re-export main types
pub use error::{BufferError, BufferResult, ErrorCategory, ParseError};
pub use sample::{CodedFrame, DecodeKey, PresentationKey, TrackDescription, TrackId, TrackKind};
pub use sample_map::{DecodeOrderMap, SampleMap};
pub use task_queue::{TaskHandle, TaskQueue};
pub use time::{MediaTime, DEFAULT_TIMESCALE};
pub use time_ranges::{TimeRange, TimeRanges};
