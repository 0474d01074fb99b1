//! Per-track buffering state
//!
//! A [`TrackBuffer`] bundles the coded frames of one track with the buffered
//! ranges they cover, the queue of frames not yet handed to the sink, and the
//! continuity bookkeeping the coded frame processor uses to detect
//! discontinuities.

use mediabuf_core::{
    CodedFrame, DecodeKey, DecodeOrderMap, MediaTime, SampleMap, TimeRanges, TrackDescription,
    TrackId,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// Coded frames and continuity state for one track
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    id: TrackId,
    pub(crate) samples: SampleMap,
    pub(crate) decode_queue: DecodeOrderMap,
    pub(crate) buffered: TimeRanges,
    pub(crate) description: Option<Arc<TrackDescription>>,
    pub(crate) last_decode_timestamp: Option<MediaTime>,
    pub(crate) last_frame_duration: Option<MediaTime>,
    pub(crate) highest_presentation_timestamp: Option<MediaTime>,
    pub(crate) need_random_access_point: bool,
    pub(crate) enabled: bool,
    pub(crate) needs_reenqueueing: bool,
    pub(crate) last_enqueued_presentation_time: Option<MediaTime>,
    pub(crate) last_enqueued_decode_end_time: Option<MediaTime>,
}

impl TrackBuffer {
    /// Create an empty, enabled track buffer waiting for a random access point
    pub fn new(id: TrackId, description: Option<Arc<TrackDescription>>) -> Self {
        Self {
            id,
            samples: SampleMap::new(),
            decode_queue: DecodeOrderMap::new(),
            buffered: TimeRanges::new(),
            description,
            last_decode_timestamp: None,
            last_frame_duration: None,
            highest_presentation_timestamp: None,
            need_random_access_point: true,
            enabled: true,
            needs_reenqueueing: false,
            last_enqueued_presentation_time: None,
            last_enqueued_decode_end_time: None,
        }
    }

    /// Track identifier
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Codec and kind, once known
    pub fn description(&self) -> Option<&Arc<TrackDescription>> {
        self.description.as_ref()
    }

    /// Stored coded frames
    pub fn samples(&self) -> &SampleMap {
        &self.samples
    }

    /// Ranges covered by stored frames
    pub fn buffered(&self) -> &TimeRanges {
        &self.buffered
    }

    /// Frames waiting to be handed to the sink, in decode order
    pub fn decode_queue(&self) -> impl Iterator<Item = &Arc<CodedFrame>> {
        self.decode_queue.values()
    }

    /// Number of frames waiting for the sink
    pub fn decode_queue_len(&self) -> usize {
        self.decode_queue.len()
    }

    /// Whether the track takes part in the aggregate buffered range
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the next frame must be a random access point
    pub fn needs_random_access_point(&self) -> bool {
        self.need_random_access_point
    }

    /// Whether the sink must be re-primed before more frames are delivered
    pub fn needs_reenqueueing(&self) -> bool {
        self.needs_reenqueueing
    }

    /// Decode time of the last accepted frame
    pub fn last_decode_timestamp(&self) -> Option<MediaTime> {
        self.last_decode_timestamp
    }

    /// Duration of the last accepted frame
    pub fn last_frame_duration(&self) -> Option<MediaTime> {
        self.last_frame_duration
    }

    /// Highest frame end time since the last discontinuity
    pub fn highest_presentation_timestamp(&self) -> Option<MediaTime> {
        self.highest_presentation_timestamp
    }

    /// Presentation time of the last frame handed to the sink
    pub fn last_enqueued_presentation_time(&self) -> Option<MediaTime> {
        self.last_enqueued_presentation_time
    }

    /// Decode end time of the last frame handed to the sink
    ///
    /// After a re-enqueue this is the decode time of the last
    /// non-displaying frame.
    pub fn last_enqueued_decode_end_time(&self) -> Option<MediaTime> {
        self.last_enqueued_decode_end_time
    }

    /// Whether the track carries video
    pub fn is_video(&self) -> bool {
        self.description
            .as_ref()
            .map(|description| description.is_video())
            .unwrap_or(false)
    }

    /// Forget continuity state so the next frame starts a new coded frame group
    pub(crate) fn reset_continuity(&mut self) {
        self.last_decode_timestamp = None;
        self.last_frame_duration = None;
        self.highest_presentation_timestamp = None;
        self.need_random_access_point = true;
    }

    /// Store an accepted frame and extend the buffered ranges
    pub(crate) fn add_frame(&mut self, frame: Arc<CodedFrame>) {
        let enqueueable = match self.last_enqueued_decode_end_time {
            Some(decode_end) => frame.decode_time >= decode_end,
            None => true,
        };
        if enqueueable {
            self.decode_queue.insert(frame.decode_key(), frame.clone());
        }

        self.buffered.add(
            frame.presentation_time,
            frame.presentation_end_time() + MediaTime::MICROSECOND,
        );
        self.samples.add_sample(frame);
    }

    /// Remove the decode-order run `[start, end)` (or `[start, ..)` when `end`
    /// is `None`) from the samples and the decode queue
    ///
    /// The covered presentation intervals are erased from the buffered
    /// ranges. If they overlap frames already handed to the sink but not yet
    /// displayed, the track is flagged for re-enqueueing.
    pub(crate) fn remove_decode_run(
        &mut self,
        start: DecodeKey,
        end: Option<DecodeKey>,
        current_time: MediaTime,
    ) -> DecodeOrderMap {
        let removed = match end {
            Some(end) if end <= start => return DecodeOrderMap::new(),
            Some(end) => self.samples.remove_decode_range(start..end),
            None => self.samples.remove_decode_range(start..),
        };

        let mut erased = TimeRanges::new();
        for (key, frame) in &removed {
            trace!(track_id = %self.id, sample = %frame, "Removing sample");
            self.decode_queue.remove(key);
            erased.add(
                frame.presentation_time,
                frame.presentation_end_time() + MediaTime::MICROSECOND,
            );
        }

        if let Some(last_enqueued) = self.last_enqueued_presentation_time {
            if current_time < last_enqueued {
                let possibly_enqueued = TimeRanges::from_range(current_time, last_enqueued);
                if possibly_enqueued.intersects(&erased) {
                    self.needs_reenqueueing = true;
                }
            }
        }

        if !erased.is_empty() {
            debug!(
                track_id = %self.id,
                frames = removed.len(),
                erased = %erased,
                "Erased buffered ranges"
            );
            erased.invert();
            self.buffered.intersect_with(&erased);
        }

        removed
    }

    /// Drop every stored and queued frame
    pub(crate) fn clear_samples(&mut self) {
        self.samples.clear();
        self.decode_queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts: i64, sync: bool) -> Arc<CodedFrame> {
        Arc::new(CodedFrame::new(
            "video",
            MediaTime::from_secs(pts),
            MediaTime::from_secs(pts),
            MediaTime::from_secs(1),
            sync,
        ))
    }

    #[test]
    fn test_new_track_waits_for_random_access() {
        let track = TrackBuffer::new(TrackId::new("video"), None);
        assert!(track.needs_random_access_point());
        assert!(track.is_enabled());
        assert!(track.last_decode_timestamp().is_none());
    }

    #[test]
    fn test_removing_run_restores_empty_buffered() {
        let mut track = TrackBuffer::new(TrackId::new("video"), None);
        let sample = frame(0, true);
        track.add_frame(sample.clone());
        assert_eq!(track.buffered().len(), 1);

        let removed = track.remove_decode_run(sample.decode_key(), None, MediaTime::ZERO);
        assert_eq!(removed.len(), 1);
        assert!(track.buffered().is_empty());
        assert_eq!(track.decode_queue_len(), 0);
    }

    #[test]
    fn test_removal_under_enqueued_frames_requests_reenqueue() {
        let mut track = TrackBuffer::new(TrackId::new("video"), None);
        for pts in 0..4 {
            track.add_frame(frame(pts, pts == 0));
        }
        track.last_enqueued_presentation_time = Some(MediaTime::from_secs(3));

        let start = frame(2, false).decode_key();
        track.remove_decode_run(start, None, MediaTime::from_secs(1));
        assert!(track.needs_reenqueueing());
    }
}
