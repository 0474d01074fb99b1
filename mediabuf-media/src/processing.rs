//! Coded frame processing
//!
//! [`CodedFrameProcessor`] owns every [`TrackBuffer`] of a source buffer and
//! runs the per-frame acceptance algorithm: timestamp offset, discontinuity
//! detection across all tracks, the random access gate, overlap and stale
//! frame removal with their decode dependencies, and buffered range upkeep.
//! It also applies initialization segments to the track map.

use crate::parser::InitializationSegment;
use crate::tracks::TrackBuffer;
use mediabuf_core::{
    BufferError, BufferResult, CodedFrame, DecodeOrderMap, MediaTime, TrackId, TrackKind,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Result of offering one coded frame to the processor
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame was stored
    Accepted,
    /// The frame was dropped while its track waited for a random access point
    Dropped {
        /// Track of the dropped frame
        track_id: TrackId,
        /// Presentation time after the timestamp offset
        presentation_time: MediaTime,
    },
}

/// Result of applying an initialization segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitializationOutcome {
    /// The segment introduced the buffer's first audio or video track
    pub activated: bool,
    /// This was the first initialization segment
    pub first: bool,
}

/// Counters for a source buffer's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Frames stored
    pub frames_appended: u64,
    /// Payload bytes stored
    pub bytes_appended: u64,
    /// Frames dropped by the random access gate
    pub frames_dropped: u64,
    /// Frames removed by overlap, explicit removal or eviction
    pub frames_removed: u64,
    /// Payload bytes removed by overlap, explicit removal or eviction
    pub bytes_removed: u64,
    /// Frames removed by eviction
    pub frames_evicted: u64,
    /// Payload bytes removed by eviction
    pub bytes_evicted: u64,
    /// Discontinuities that reset every track
    pub discontinuities: u64,
}

impl BufferStats {
    pub(crate) fn record_removed(&mut self, removed: &DecodeOrderMap) {
        self.frames_removed += removed.len() as u64;
        self.bytes_removed += removed
            .values()
            .map(|frame| frame.size_in_bytes() as u64)
            .sum::<u64>();
    }
}

/// Exponential moving average of media seconds buffered per wall-clock second
#[derive(Debug, Clone)]
pub struct BufferingRateMonitor {
    coefficient: f64,
    buffered_since_last_monitor: f64,
    average_rate: f64,
    last_monitor: Instant,
}

impl BufferingRateMonitor {
    /// Create a monitor weighting each new measurement by `coefficient`
    pub fn new(coefficient: f64) -> Self {
        Self {
            coefficient,
            buffered_since_last_monitor: 0.0,
            average_rate: 0.0,
            last_monitor: Instant::now(),
        }
    }

    /// Account for newly buffered media
    pub fn record(&mut self, duration: MediaTime) {
        if duration.is_finite() {
            self.buffered_since_last_monitor += duration.as_secs_f64();
        }
    }

    /// Fold the media buffered since the last call into the average
    pub fn update(&mut self, now: Instant) {
        if self.buffered_since_last_monitor == 0.0 {
            return;
        }
        let interval = now.saturating_duration_since(self.last_monitor).as_secs_f64();
        if interval <= 0.0 {
            return;
        }

        let rate = self.buffered_since_last_monitor / interval;
        self.last_monitor = now;
        self.buffered_since_last_monitor = 0.0;
        self.average_rate = self.average_rate * (1.0 - self.coefficient) + rate * self.coefficient;

        debug!(average_rate = self.average_rate, "Updated buffering rate");
    }

    /// Media seconds buffered since the last update
    pub fn pending_seconds(&self) -> f64 {
        self.buffered_since_last_monitor
    }

    /// Current moving average
    pub fn average_rate(&self) -> f64 {
        self.average_rate
    }
}

#[derive(Debug, Clone, Default)]
struct InitializationState {
    received_first: bool,
    track_ids: BTreeMap<TrackKindKey, Vec<TrackId>>,
    codecs: BTreeMap<TrackKindKey, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TrackKindKey {
    Audio,
    Video,
    Text,
}

impl From<TrackKind> for TrackKindKey {
    fn from(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => TrackKindKey::Audio,
            TrackKind::Video => TrackKindKey::Video,
            TrackKind::Text => TrackKindKey::Text,
        }
    }
}

const ALL_KINDS: [TrackKind; 3] = [TrackKind::Audio, TrackKind::Video, TrackKind::Text];

/// Frame acceptance state shared by every track of a source buffer
#[derive(Debug)]
pub struct CodedFrameProcessor {
    tracks: BTreeMap<TrackId, TrackBuffer>,
    highest_presentation_end: Option<MediaTime>,
    timestamp_offset: MediaTime,
    init: InitializationState,
    pub(crate) monitor: BufferingRateMonitor,
    pub(crate) stats: BufferStats,
}

impl CodedFrameProcessor {
    /// Create a processor with no tracks
    pub fn new(buffering_rate_coefficient: f64) -> Self {
        Self {
            tracks: BTreeMap::new(),
            highest_presentation_end: None,
            timestamp_offset: MediaTime::ZERO,
            init: InitializationState::default(),
            monitor: BufferingRateMonitor::new(buffering_rate_coefficient),
            stats: BufferStats::default(),
        }
    }

    /// Offset added to every incoming frame's timestamps
    pub fn timestamp_offset(&self) -> MediaTime {
        self.timestamp_offset
    }

    /// Replace the timestamp offset
    pub fn set_timestamp_offset(&mut self, offset: MediaTime) {
        self.timestamp_offset = offset;
    }

    /// Highest frame end time seen across all tracks
    pub fn highest_presentation_end(&self) -> Option<MediaTime> {
        self.highest_presentation_end
    }

    /// Whether an initialization segment has been applied
    pub fn received_first_initialization_segment(&self) -> bool {
        self.init.received_first
    }

    /// Track buffers keyed by id
    pub fn tracks(&self) -> &BTreeMap<TrackId, TrackBuffer> {
        &self.tracks
    }

    /// One track buffer
    pub fn track(&self, id: &TrackId) -> Option<&TrackBuffer> {
        self.tracks.get(id)
    }

    pub(crate) fn track_mut(&mut self, id: &TrackId) -> Option<&mut TrackBuffer> {
        self.tracks.get_mut(id)
    }

    pub(crate) fn tracks_mut(&mut self) -> impl Iterator<Item = &mut TrackBuffer> {
        self.tracks.values_mut()
    }

    /// Sum of stored payload bytes across tracks
    pub fn size_in_bytes(&self) -> usize {
        self.tracks
            .values()
            .map(|track| track.samples.size_in_bytes())
            .sum()
    }

    /// Unset continuity state on every track and require a random access
    /// point on each
    pub fn reset_all_tracks(&mut self) {
        for track in self.tracks.values_mut() {
            track.reset_continuity();
        }
    }

    /// Apply an initialization segment to the track map
    ///
    /// The first segment creates one track buffer per announced track. Later
    /// segments must repeat the same track layout and codecs; they refresh the
    /// track descriptions and force every track back to a random access point.
    pub fn apply_initialization_segment(
        &mut self,
        segment: &InitializationSegment,
    ) -> BufferResult<InitializationOutcome> {
        if segment.tracks.is_empty() {
            return Err(BufferError::decode("initialization segment has no tracks"));
        }

        if self.init.received_first {
            self.validate_initialization_segment(segment)?;

            for kind in ALL_KINDS {
                let known = self
                    .init
                    .track_ids
                    .get(&kind.into())
                    .cloned()
                    .unwrap_or_default();
                for announced in segment.tracks_of_kind(kind) {
                    let target = if known.len() == 1 {
                        &known[0]
                    } else {
                        &announced.id
                    };
                    if let Some(track) = self.tracks.get_mut(target) {
                        track.description = Some(announced.description.clone());
                    }
                }
            }
            for track in self.tracks.values_mut() {
                track.need_random_access_point = true;
            }

            debug!(tracks = segment.tracks.len(), "Applied repeated initialization segment");
            return Ok(InitializationOutcome::default());
        }

        let mut activated = false;
        for announced in &segment.tracks {
            let key = TrackKindKey::from(announced.kind());
            let ids = self.init.track_ids.entry(key).or_default();
            if ids.is_empty() && matches!(announced.kind(), TrackKind::Audio | TrackKind::Video) {
                activated = true;
            }
            ids.push(announced.id.clone());
            self.init
                .codecs
                .entry(key)
                .or_default()
                .push(announced.description.codec.clone());

            self.tracks
                .entry(announced.id.clone())
                .and_modify(|track| track.description = Some(announced.description.clone()))
                .or_insert_with(|| {
                    TrackBuffer::new(announced.id.clone(), Some(announced.description.clone()))
                });
        }
        self.init.received_first = true;

        debug!(
            tracks = segment.tracks.len(),
            activated, "Applied first initialization segment"
        );
        Ok(InitializationOutcome {
            activated,
            first: true,
        })
    }

    fn validate_initialization_segment(&self, segment: &InitializationSegment) -> BufferResult<()> {
        for kind in ALL_KINDS {
            let key = TrackKindKey::from(kind);
            let known = self.init.track_ids.get(&key).map(Vec::len).unwrap_or(0);
            let announced: Vec<_> = segment.tracks_of_kind(kind).collect();

            if announced.len() != known {
                return Err(BufferError::decode(format!(
                    "initialization segment has {} {:?} tracks, expected {}",
                    announced.len(),
                    kind,
                    known
                )));
            }

            let codecs = self.init.codecs.get(&key);
            for track in &announced {
                let known_codec = codecs
                    .map(|codecs| codecs.contains(&track.description.codec))
                    .unwrap_or(false);
                if !known_codec {
                    return Err(BufferError::decode(format!(
                        "codec {} was not in the first initialization segment",
                        track.description.codec
                    )));
                }
                if announced.len() >= 2 && !self.tracks.contains_key(&track.id) {
                    return Err(BufferError::decode(format!("unknown track id {}", track.id)));
                }
            }
        }
        Ok(())
    }

    /// Run the acceptance algorithm for one coded frame
    ///
    /// A negative timestamp after the offset is a decode error; the caller
    /// must stop processing the rest of the append.
    pub fn process_frame(
        &mut self,
        frame: CodedFrame,
        current_time: MediaTime,
    ) -> BufferResult<FrameOutcome> {
        let frame = if self.timestamp_offset != MediaTime::ZERO {
            frame.with_timestamp_offset(self.timestamp_offset)
        } else {
            frame
        };

        let presentation_time = frame.presentation_time;
        let decode_time = frame.decode_time;
        let duration = frame.duration;

        if presentation_time.is_negative() || decode_time.is_negative() {
            return Err(BufferError::decode(format!(
                "negative timestamp after offset: pts {}, dts {}",
                presentation_time, decode_time
            )));
        }

        let track_id = frame.track_id.clone();
        let discontinuity = {
            let track = self.tracks.entry(track_id.clone()).or_insert_with(|| {
                debug!(track_id = %track_id, "Creating track buffer for unannounced track");
                TrackBuffer::new(track_id.clone(), frame.description.clone())
            });

            match track.last_decode_timestamp {
                Some(last_decode) => {
                    let last_duration = track.last_frame_duration.unwrap_or(MediaTime::ZERO);
                    decode_time < last_decode
                        || (decode_time - last_decode).abs() > last_duration * 2
                }
                None => false,
            }
        };

        if discontinuity {
            debug!(
                track_id = %track_id,
                dts = %decode_time,
                "Decode discontinuity, resetting every track"
            );
            self.highest_presentation_end = Some(presentation_time);
            self.reset_all_tracks();
            self.stats.discontinuities += 1;
        }

        let frame_end = presentation_time + duration;
        let track = match self.tracks.get_mut(&track_id) {
            Some(track) => track,
            None => return Err(BufferError::invalid_state("track buffer vanished")),
        };

        if track.need_random_access_point {
            if !frame.is_sync {
                trace!(track_id = %track_id, pts = %presentation_time, "Dropping non-sync frame");
                self.stats.frames_dropped += 1;
                return Ok(FrameOutcome::Dropped {
                    track_id,
                    presentation_time,
                });
            }
            track.need_random_access_point = false;
        }

        let mut marked = DecodeOrderMap::new();

        if track.last_decode_timestamp.is_none() {
            if let Some(overlapped) = track
                .samples
                .find_sample_containing_presentation_time(presentation_time)
            {
                let is_video = track.is_video() || frame.is_video();
                if is_video
                    && presentation_time < overlapped.presentation_time + MediaTime::MICROSECOND
                {
                    marked.insert(overlapped.decode_key(), overlapped);
                }
            }
        }

        match track.highest_presentation_timestamp {
            None => {
                for stale in track
                    .samples
                    .find_samples_between_presentation_times(presentation_time, frame_end)
                {
                    marked.insert(stale.decode_key(), stale);
                }
            }
            Some(highest) if highest <= presentation_time => {
                if let Some(highest_buffered) = track.buffered.maximum_buffered_time() {
                    let last_duration = track.last_frame_duration.unwrap_or(MediaTime::ZERO);
                    let stale = if highest_buffered - highest < last_duration {
                        track
                            .samples
                            .find_samples_within_presentation_range_from_end(highest, frame_end)
                    } else {
                        track
                            .samples
                            .find_samples_within_presentation_range(highest, frame_end)
                    };
                    for stale in stale {
                        marked.insert(stale.decode_key(), stale);
                    }
                }
            }
            Some(_) => {}
        }

        let first_marked = marked.keys().next().copied();
        let last_marked = marked.keys().next_back().copied();
        if let (Some(first), Some(last)) = (first_marked, last_marked) {
            let next_sync = track
                .samples
                .find_sync_sample_after_decode_key(&last)
                .map(|sync| sync.decode_key());
            let removed = track.remove_decode_run(first, next_sync, current_time);
            self.stats.record_removed(&removed);
        }

        let size = frame.size_in_bytes();
        track.add_frame(Arc::new(frame));
        track.last_decode_timestamp = Some(decode_time);
        track.last_frame_duration = Some(duration);
        if track
            .highest_presentation_timestamp
            .map_or(true, |highest| frame_end > highest)
        {
            track.highest_presentation_timestamp = Some(frame_end);
        }

        if self
            .highest_presentation_end
            .map_or(true, |highest| frame_end > highest)
        {
            self.highest_presentation_end = Some(frame_end);
        }

        self.monitor.record(duration);
        self.stats.frames_appended += 1;
        self.stats.bytes_appended += size as u64;

        trace!(
            track_id = %track_id,
            pts = %presentation_time,
            dts = %decode_time,
            "Accepted coded frame"
        );
        Ok(FrameOutcome::Accepted)
    }

    /// Drop every stored and queued frame on every track
    pub(crate) fn clear_samples(&mut self) {
        for track in self.tracks.values_mut() {
            track.clear_samples();
        }
    }
}

// Tests moved to tests/ directory
