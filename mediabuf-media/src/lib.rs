//! # mediabuf media
//!
//! Source buffer controller for segmented media. Appended bytes are parsed
//! into coded frames, stored per track in decode and presentation order, kept
//! under a memory budget by window-based eviction, and fed to a frame sink in
//! decode order.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod event;
pub mod eviction;
pub mod host;
pub mod parser;
pub mod processing;
pub mod removal;
pub mod render;
pub mod source_buffer;
pub mod tracks;

// Re-export main types
pub use config::SourceBufferConfig;
pub use event::{EventStream, SourceBufferEvent};
pub use eviction::{EvictionController, EvictionTarget};
pub use host::{EndOfStreamError, MediaSourceHost};
pub use parser::{InitializationSegment, InitializationTrack, ParsedSegment, SegmentParser};
pub use processing::{
    BufferStats, BufferingRateMonitor, CodedFrameProcessor, FrameOutcome, InitializationOutcome,
};
pub use removal::RemovalReport;
pub use render::{FrameSink, ReadyState};
pub use source_buffer::{AppendState, SourceBuffer};
pub use tracks::TrackBuffer;
