//! Segment parser interface

use bytes::Bytes;
use mediabuf_core::{CodedFrame, MediaTime, ParseError, TrackDescription, TrackId, TrackKind};
use std::sync::Arc;

/// One track announced by an initialization segment
#[derive(Debug, Clone, PartialEq)]
pub struct InitializationTrack {
    /// Track identifier used by the track's coded frames
    pub id: TrackId,
    /// Codec and kind
    pub description: Arc<TrackDescription>,
}

impl InitializationTrack {
    /// Create a track entry
    pub fn new(id: impl Into<TrackId>, codec: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            description: Arc::new(TrackDescription::new(codec, kind)),
        }
    }

    /// Media kind of the track
    pub fn kind(&self) -> TrackKind {
        self.description.kind
    }
}

/// Track layout and optional duration of a stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitializationSegment {
    /// Overall media duration, if the container declares one
    pub duration: Option<MediaTime>,
    /// Tracks in declaration order
    pub tracks: Vec<InitializationTrack>,
}

impl InitializationSegment {
    /// Tracks of one kind, in declaration order
    pub fn tracks_of_kind(&self, kind: TrackKind) -> impl Iterator<Item = &InitializationTrack> {
        self.tracks.iter().filter(move |track| track.kind() == kind)
    }
}

/// One item produced by parsing appended bytes
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSegment {
    /// Track layout for the media that follows
    Initialization(InitializationSegment),
    /// Coded frames in the order the container stores them
    MediaSamples(Vec<CodedFrame>),
}

/// Trait for container demuxers feeding a source buffer
pub trait SegmentParser: Send + Sync {
    /// Parse one append's worth of bytes
    fn parse(&self, data: Bytes) -> Result<Vec<ParsedSegment>, ParseError>;

    /// Drop any partially parsed input
    fn abort(&self);

    /// Release parser resources; later `parse` calls fail
    fn detach(&self);
}
