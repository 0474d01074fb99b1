//! Coded frame data model

use crate::time::MediaTime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a track inside a source buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    /// Create a track id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
    /// Timed text track
    Text,
}

/// Description of a track as announced by an initialization segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackDescription {
    /// Codec string, e.g. `avc1.64001f`
    pub codec: String,
    /// Media kind
    pub kind: TrackKind,
}

impl TrackDescription {
    /// Create a description
    pub fn new(codec: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            codec: codec.into(),
            kind,
        }
    }

    /// Whether this describes a video track
    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }
}

/// Key ordering frames in decode order: `(decode time, presentation time)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecodeKey {
    /// Decode timestamp
    pub decode_time: MediaTime,
    /// Presentation timestamp, breaks ties between equal decode times
    pub presentation_time: MediaTime,
}

impl DecodeKey {
    /// Create a decode key
    pub fn new(decode_time: MediaTime, presentation_time: MediaTime) -> Self {
        Self {
            decode_time,
            presentation_time,
        }
    }
}

/// Key ordering frames in presentation order: `(presentation time, decode time)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresentationKey {
    /// Presentation timestamp
    pub presentation_time: MediaTime,
    /// Decode timestamp, breaks ties between equal presentation times
    pub decode_time: MediaTime,
}

/// One decodable unit of media
///
/// Frames are immutable once built and shared as `Arc<CodedFrame>` between the
/// sample map orderings and the decode queue.
#[derive(Clone, PartialEq, Eq)]
pub struct CodedFrame {
    /// Presentation timestamp
    pub presentation_time: MediaTime,
    /// Decode timestamp
    pub decode_time: MediaTime,
    /// Frame duration
    pub duration: MediaTime,
    /// Whether the frame is a random access point
    pub is_sync: bool,
    /// Owning track
    pub track_id: TrackId,
    /// Description of the owning track, if known
    pub description: Option<Arc<TrackDescription>>,
    /// Encoded payload
    pub payload: Bytes,
}

impl CodedFrame {
    /// Create a frame with no description and an empty payload
    pub fn new(
        track_id: impl Into<TrackId>,
        presentation_time: MediaTime,
        decode_time: MediaTime,
        duration: MediaTime,
        is_sync: bool,
    ) -> Self {
        Self {
            presentation_time,
            decode_time,
            duration,
            is_sync,
            track_id: track_id.into(),
            description: None,
            payload: Bytes::new(),
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Attach a track description
    pub fn with_description(mut self, description: Arc<TrackDescription>) -> Self {
        self.description = Some(description);
        self
    }

    /// A copy of this frame with both timestamps shifted by `offset`
    ///
    /// The payload is shared, not copied.
    pub fn with_timestamp_offset(&self, offset: MediaTime) -> Self {
        let mut frame = self.clone();
        frame.presentation_time += offset;
        frame.decode_time += offset;
        frame
    }

    /// Key in decode order
    pub fn decode_key(&self) -> DecodeKey {
        DecodeKey::new(self.decode_time, self.presentation_time)
    }

    /// Key in presentation order
    pub fn presentation_key(&self) -> PresentationKey {
        PresentationKey {
            presentation_time: self.presentation_time,
            decode_time: self.decode_time,
        }
    }

    /// `presentation_time + duration`
    pub fn presentation_end_time(&self) -> MediaTime {
        self.presentation_time + self.duration
    }

    /// `decode_time + duration`
    pub fn decode_end_time(&self) -> MediaTime {
        self.decode_time + self.duration
    }

    /// Payload size in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Whether the frame belongs to a video track
    pub fn is_video(&self) -> bool {
        self.description
            .as_ref()
            .map(|description| description.is_video())
            .unwrap_or(false)
    }
}

impl fmt::Debug for CodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodedFrame")
            .field("track_id", &self.track_id)
            .field("presentation_time", &self.presentation_time)
            .field("decode_time", &self.decode_time)
            .field("duration", &self.duration)
            .field("is_sync", &self.is_sync)
            .field("size", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for CodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{pts({}), dts({}), duration({}), flags({}), size({})}}",
            self.presentation_time,
            self.decode_time,
            self.duration,
            if self.is_sync { "sync" } else { "none" },
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_offset_shares_payload() {
        let frame = CodedFrame::new(
            "video",
            MediaTime::from_secs(1),
            MediaTime::ZERO,
            MediaTime::from_secs(1),
            true,
        )
        .with_payload(vec![0u8; 16]);

        let shifted = frame.with_timestamp_offset(MediaTime::from_secs(10));
        assert_eq!(shifted.presentation_time, MediaTime::from_secs(11));
        assert_eq!(shifted.decode_time, MediaTime::from_secs(10));
        assert_eq!(shifted.payload.as_ptr(), frame.payload.as_ptr());
    }

    #[test]
    fn test_decode_key_breaks_ties_by_presentation() {
        let early = DecodeKey::new(MediaTime::ZERO, MediaTime::from_secs(1));
        let late = DecodeKey::new(MediaTime::ZERO, MediaTime::from_secs(2));
        assert!(early < late);
    }

    #[test]
    fn test_display_matches_sample_description() {
        let frame = CodedFrame::new(
            "audio",
            MediaTime::ZERO,
            MediaTime::ZERO,
            MediaTime::from_secs(1),
            false,
        );
        assert_eq!(
            frame.to_string(),
            "{pts(0.000000), dts(0.000000), duration(1.000000), flags(none), size(0)}"
        );
    }
}
