//! # mediabuf - Streaming Media Buffer Manager
//!
//! mediabuf implements the buffering core of a Media Source Extensions style
//! player. Applications append container bytes to a [`SourceBuffer`]; a
//! pluggable [`SegmentParser`] turns them into coded frames, which are stored
//! per track, kept under a memory budget, and handed to a [`FrameSink`] in
//! decode order.
//!
//! ## Key Features
//!
//! - **Deferred append and remove**: work runs on a task queue the host drains
//! - **Dual-ordered sample storage**: lookups by presentation or decode time
//! - **Window-based eviction**: keeps playback surroundings while freeing memory
//! - **Seek support**: re-enqueue from the nearest sync frame, fast-seek snapping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediabuf::{FrameSink, MediaBuf, MediaSourceHost, SegmentParser};
//! use std::sync::Arc;
//!
//! fn play(
//!     parser: Box<dyn SegmentParser>,
//!     sink: Arc<dyn FrameSink>,
//!     host: Arc<dyn MediaSourceHost>,
//!     segment: Vec<u8>,
//! ) -> anyhow::Result<()> {
//!     let mediabuf = MediaBuf::init()?;
//!     let mut buffer = mediabuf.create_source_buffer(parser, sink, host);
//!
//!     buffer.append_buffer(segment)?;
//!     buffer.run_pending_tasks();
//!
//!     println!("Buffered: {:?}", buffer.buffered()?.to_secs());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use mediabuf_core::{
    BufferError, BufferResult, CodedFrame, DecodeKey, ErrorCategory, MediaTime, ParseError,
    PresentationKey, SampleMap, TaskHandle, TaskQueue, TimeRange, TimeRanges, TrackDescription,
    TrackId, TrackKind,
};

pub use mediabuf_media::{
    AppendState, BufferStats, EndOfStreamError, EventStream, EvictionController, FrameSink,
    InitializationSegment, InitializationTrack, MediaSourceHost, ParsedSegment, ReadyState,
    SegmentParser, SourceBuffer, SourceBufferConfig, SourceBufferEvent, TrackBuffer,
};

#[cfg(feature = "diagnostics")]
pub use mediabuf_diagnostics::{
    BufferSnapshot, DebugLogger, DiagnosticsError, EventLog, Finding, LoggingConfig,
    TrackSnapshot,
};

// Public API modules
pub mod config;

// Re-export main API types
pub use config::{GlobalConfig, MAX_BUFFER_BYTES_ENV};

use std::sync::Arc;

/// Main entry point for mediabuf
#[derive(Debug, Clone)]
pub struct MediaBuf {
    config: Arc<GlobalConfig>,
}

impl MediaBuf {
    /// Initialize with default settings and environment overrides
    ///
    /// # Example
    /// ```rust,no_run
    /// use mediabuf::MediaBuf;
    ///
    /// let mediabuf = MediaBuf::init()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn init() -> anyhow::Result<Self> {
        Self::init_with(GlobalConfig::default().with_env_overrides()?)
    }

    /// Initialize with custom global configuration
    pub fn init_with(config: GlobalConfig) -> anyhow::Result<Self> {
        if config.debug_logging {
            install_logging(&config)?;
        }

        tracing::info!(
            maximum_buffer_size = config.source_buffer.maximum_buffer_size,
            "mediabuf initialized"
        );

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Create a source buffer using the configured settings
    pub fn create_source_buffer(
        &self,
        parser: Box<dyn SegmentParser>,
        sink: Arc<dyn FrameSink>,
        host: Arc<dyn MediaSourceHost>,
    ) -> SourceBuffer {
        SourceBuffer::new(self.config.source_buffer.clone(), parser, sink, host)
    }
}

#[cfg(feature = "diagnostics")]
fn install_logging(config: &GlobalConfig) -> anyhow::Result<()> {
    match DebugLogger::new(config.logging.clone()).init() {
        Ok(()) => Ok(()),
        // Another subscriber is already installed
        Err(DiagnosticsError::SubscriberInstall { reason }) => {
            tracing::debug!(reason = %reason, "Keeping existing subscriber");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(feature = "diagnostics"))]
fn install_logging(_config: &GlobalConfig) -> anyhow::Result<()> {
    tracing::warn!("Debug logging requested without the diagnostics feature");
    Ok(())
}
