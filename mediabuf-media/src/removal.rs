//! Coded frame removal
//!
//! Removing `[start, end)` from a track always extends the removal up to the
//! next sync frame at or after `end`, so no frame left behind depends on a
//! removed one.

use crate::processing::CodedFrameProcessor;
use mediabuf_core::{MediaTime, TrackId};
use tracing::debug;

/// What a removal pass took out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Tracks that lost at least one frame
    pub tracks: Vec<TrackId>,
    /// Frames removed across all tracks
    pub frames_removed: usize,
    /// Payload bytes removed across all tracks
    pub bytes_removed: usize,
}

impl RemovalReport {
    /// Whether nothing was removed
    pub fn is_empty(&self) -> bool {
        self.frames_removed == 0
    }
}

impl CodedFrameProcessor {
    /// Remove the frames presented in `[start, end)` from every track, along
    /// with the frames that depend on them
    pub fn remove_coded_frames(
        &mut self,
        start: MediaTime,
        end: MediaTime,
        current_time: MediaTime,
    ) -> RemovalReport {
        let mut report = RemovalReport::default();

        for track in self.tracks_mut() {
            let next_sync = track
                .samples
                .find_sync_sample_after_presentation_time(end, MediaTime::POSITIVE_INFINITY);
            let (presentation_end, decode_end) = match &next_sync {
                Some(sync) => (sync.presentation_time, Some(sync.decode_key())),
                None => (MediaTime::POSITIVE_INFINITY, None),
            };

            let in_range = track
                .samples
                .find_samples_between_presentation_times(start, presentation_end);
            let Some(first) = in_range.iter().map(|frame| frame.decode_key()).min() else {
                continue;
            };

            let removed = track.remove_decode_run(first, decode_end, current_time);
            if removed.is_empty() {
                continue;
            }

            debug!(
                track_id = %track.id(),
                start = %start,
                end = %end,
                frames = removed.len(),
                "Removed coded frames"
            );
            report.tracks.push(track.id().clone());
            report.frames_removed += removed.len();
            report.bytes_removed += removed
                .values()
                .map(|frame| frame.size_in_bytes())
                .sum::<usize>();
        }

        self.stats.frames_removed += report.frames_removed as u64;
        self.stats.bytes_removed += report.bytes_removed as u64;
        report
    }
}

// Tests moved to tests/ directory
