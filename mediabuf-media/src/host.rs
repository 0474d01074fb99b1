//! Media source host interface
//!
//! The host owns the playback clock and the presentation duration, and is the
//! place stream-level errors are reported to.

use mediabuf_core::MediaTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason passed to [`MediaSourceHost::stream_ended_with_error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndOfStreamError {
    /// Malformed or inconsistent media data
    Decode,
    /// Failure fetching media data
    Network,
}

impl fmt::Display for EndOfStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndOfStreamError::Decode => write!(f, "decode"),
            EndOfStreamError::Network => write!(f, "network"),
        }
    }
}

/// Trait for the media source a buffer is attached to
pub trait MediaSourceHost: Send + Sync {
    /// Current playback position
    fn current_time(&self) -> MediaTime;

    /// Presentation duration, `None` until known
    fn duration(&self) -> Option<MediaTime>;

    /// Whether the stream is in the ended state
    fn is_ended(&self) -> bool;

    /// Whether the stream is in the open state
    fn is_open(&self) -> bool;

    /// Whether a seek is in progress
    fn is_seeking(&self) -> bool;

    /// Move an ended stream back to open
    fn open_if_in_ended_state(&self);

    /// Update the duration without re-validating buffered data
    fn set_duration_internal(&self, duration: MediaTime);

    /// Run the end-of-stream algorithm with an error
    fn stream_ended_with_error(&self, error: EndOfStreamError);

    /// Notification that the buffer joined or left the active set
    fn source_buffer_did_change_active_state(&self, active: bool);
}
