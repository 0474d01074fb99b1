//! Frame sink interface
//!
//! The sink is the rendering side of a source buffer: it accepts coded frames
//! in decode order, applies back-pressure through
//! [`FrameSink::is_ready_for_more_samples`], and tracks the media element's
//! ready state.

use mediabuf_core::{CodedFrame, TrackId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Playback readiness, ordered from least to most data available
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ReadyState {
    /// Nothing is known about the media
    #[default]
    HaveNothing,
    /// Track metadata is known
    HaveMetadata,
    /// Data for the current position is available
    HaveCurrentData,
    /// Data beyond the current position is available
    HaveFutureData,
    /// Enough data is available to play through
    HaveEnoughData,
}

/// Trait for the renderer fed by a source buffer
///
/// Every method takes `&self`; implementations use interior mutability.
pub trait FrameSink: Send + Sync {
    /// Whether the track's decoder can accept another frame now
    fn is_ready_for_more_samples(&self, track_id: &TrackId) -> bool;

    /// Queue a frame for decoding and display
    fn enqueue_sample(&self, frame: Arc<CodedFrame>, track_id: &TrackId);

    /// Request a one-shot readiness notification for the track
    ///
    /// The host answers by calling
    /// `SourceBuffer::did_become_ready_for_more_samples`.
    fn notify_when_ready_for_more_samples(&self, track_id: &TrackId);

    /// Drop everything queued for the track, then decode `frames` without
    /// displaying them
    fn flush_and_enqueue_non_displaying_samples(
        &self,
        frames: Vec<Arc<CodedFrame>>,
        track_id: &TrackId,
    );

    /// Update the ready state
    fn set_ready_state(&self, state: ReadyState);

    /// Current ready state
    fn ready_state(&self) -> ReadyState;

    /// Whether the source buffer holding this sink is active
    fn set_active(&self, active: bool);
}
