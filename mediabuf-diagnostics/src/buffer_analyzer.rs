//! Source buffer state analysis
//!
//! Captures a serializable point-in-time view of a [`SourceBuffer`] and flags
//! conditions that usually explain stalls: gaps in the buffered ranges, a full
//! buffer, tracks stuck waiting for a sync frame, and frames held back from
//! the sink.

use crate::error::DiagnosticsResult;
use mediabuf_core::{TrackId, TrackKind};
use mediabuf_media::{AppendState, BufferStats, SourceBuffer, TrackBuffer};
use serde::Serialize;
use uuid::Uuid;

/// Buffered interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeSnapshot {
    /// Start of the interval
    pub start: f64,
    /// End of the interval
    pub end: f64,
}

/// State of one track buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    /// Track identifier
    pub id: TrackId,
    /// Codec from the initialization segment, if announced
    pub codec: Option<String>,
    /// Media kind, if announced
    pub kind: Option<TrackKind>,
    /// Whether the track is selected for playback
    pub enabled: bool,
    /// Number of buffered coded frames
    pub sample_count: usize,
    /// Payload bytes of the buffered coded frames
    pub size_in_bytes: usize,
    /// Buffered ranges of this track alone
    pub buffered: Vec<RangeSnapshot>,
    /// Frames waiting to be handed to the sink
    pub decode_queue_len: usize,
    /// Frames are dropped until the next sync frame
    pub needs_random_access_point: bool,
    /// The sink must be flushed and refilled
    pub needs_reenqueueing: bool,
    /// Decode time of the last processed frame
    pub last_decode_timestamp: Option<f64>,
    /// Presentation time of the last frame given to the sink
    pub last_enqueued_presentation_time: Option<f64>,
}

impl TrackSnapshot {
    /// Capture one track buffer
    pub fn capture(track: &TrackBuffer) -> Self {
        let description = track.description();
        Self {
            id: track.id().clone(),
            codec: description.map(|description| description.codec.clone()),
            kind: description.map(|description| description.kind),
            enabled: track.is_enabled(),
            sample_count: track.samples().len(),
            size_in_bytes: track.samples().size_in_bytes(),
            buffered: ranges(track.buffered().to_secs()),
            decode_queue_len: track.decode_queue_len(),
            needs_random_access_point: track.needs_random_access_point(),
            needs_reenqueueing: track.needs_reenqueueing(),
            last_decode_timestamp: track
                .last_decode_timestamp()
                .map(|time| time.as_secs_f64()),
            last_enqueued_presentation_time: track
                .last_enqueued_presentation_time()
                .map(|time| time.as_secs_f64()),
        }
    }
}

/// Point-in-time view of a source buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferSnapshot {
    /// Buffer identifier
    pub buffer_id: Uuid,
    /// Parser state
    pub append_state: AppendState,
    /// An append or remove is in flight
    pub updating: bool,
    /// The last append did not fit the memory budget
    pub buffer_full: bool,
    /// The buffer holds a selected audio or video track
    pub active: bool,
    /// The buffer has been removed from its media source
    pub detached: bool,
    /// The last append failed to parse or decode
    pub decode_error: bool,
    /// Offset added to every parsed timestamp, in seconds
    pub timestamp_offset: f64,
    /// Aggregate buffered ranges; empty once detached
    pub buffered: Vec<RangeSnapshot>,
    /// Bytes held by buffered samples and pending append data
    pub memory_cost: usize,
    /// Configured memory budget
    pub maximum_buffer_size: usize,
    /// Moving average of seconds buffered per second
    pub buffering_rate: f64,
    /// Lifetime counters
    pub stats: BufferStats,
    /// Per-track state
    pub tracks: Vec<TrackSnapshot>,
}

impl BufferSnapshot {
    /// Capture the state of a source buffer
    pub fn capture(buffer: &SourceBuffer) -> Self {
        let buffered = buffer
            .buffered()
            .map(|buffered| ranges(buffered.to_secs()))
            .unwrap_or_default();

        Self {
            buffer_id: buffer.id(),
            append_state: buffer.append_state(),
            updating: buffer.is_updating(),
            buffer_full: buffer.is_buffer_full(),
            active: buffer.is_active(),
            detached: buffer.is_detached(),
            decode_error: buffer.has_decode_error(),
            timestamp_offset: buffer.timestamp_offset().as_secs_f64(),
            buffered,
            memory_cost: buffer.extra_memory_cost(),
            maximum_buffer_size: buffer.config().maximum_buffer_size,
            buffering_rate: buffer.buffering_rate(),
            stats: buffer.stats().clone(),
            tracks: buffer.tracks().values().map(TrackSnapshot::capture).collect(),
        }
    }

    /// Fraction of the memory budget in use
    pub fn memory_utilization(&self) -> f64 {
        if self.maximum_buffer_size == 0 {
            return 1.0;
        }
        self.memory_cost as f64 / self.maximum_buffer_size as f64
    }

    /// Total seconds covered by the aggregate buffered ranges
    pub fn buffered_seconds(&self) -> f64 {
        self.buffered
            .iter()
            .filter(|range| range.end.is_finite())
            .map(|range| range.end - range.start)
            .sum()
    }

    /// Conditions worth a look, in track order
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        if self.decode_error {
            findings.push(Finding::DecodeError);
        }
        if self.buffer_full {
            findings.push(Finding::BufferFull {
                utilization: self.memory_utilization(),
            });
        }
        for pair in self.buffered.windows(2) {
            findings.push(Finding::BufferedGap {
                start: pair[0].end,
                end: pair[1].start,
            });
        }

        for track in &self.tracks {
            if !track.enabled {
                continue;
            }
            if track.needs_random_access_point && track.sample_count > 0 {
                findings.push(Finding::AwaitingSyncFrame {
                    track_id: track.id.clone(),
                });
            }
            if track.needs_reenqueueing {
                findings.push(Finding::PendingReenqueue {
                    track_id: track.id.clone(),
                });
            }
            if track.decode_queue_len > 0 {
                findings.push(Finding::HeldBackFrames {
                    track_id: track.id.clone(),
                    count: track.decode_queue_len,
                });
            }
        }

        findings
    }

    /// Render as compact JSON
    pub fn to_json(&self) -> DiagnosticsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Render as indented JSON
    pub fn to_json_pretty(&self) -> DiagnosticsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Condition detected in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The last append failed to parse or decode
    DecodeError,
    /// Eviction could not make room for the last append
    BufferFull {
        /// Fraction of the budget in use
        utilization: f64,
    },
    /// Unbuffered time between two buffered ranges
    BufferedGap {
        /// End of the earlier range
        start: f64,
        /// Start of the later range
        end: f64,
    },
    /// Buffered frames exist but new ones are dropped until a sync frame
    AwaitingSyncFrame {
        /// Affected track
        track_id: TrackId,
    },
    /// The sink must be refilled before playback continues
    PendingReenqueue {
        /// Affected track
        track_id: TrackId,
    },
    /// Frames are queued but not yet given to the sink
    HeldBackFrames {
        /// Affected track
        track_id: TrackId,
        /// Queue length
        count: usize,
    },
}

fn ranges(secs: Vec<(f64, f64)>) -> Vec<RangeSnapshot> {
    secs.into_iter()
        .map(|(start, end)| RangeSnapshot { start, end })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BufferSnapshot {
        BufferSnapshot {
            buffer_id: Uuid::nil(),
            append_state: AppendState::WaitingForSegment,
            updating: false,
            buffer_full: false,
            active: true,
            detached: false,
            decode_error: false,
            timestamp_offset: 0.0,
            buffered: vec![
                RangeSnapshot { start: 0.0, end: 4.0 },
                RangeSnapshot { start: 6.0, end: 8.0 },
            ],
            memory_cost: 25,
            maximum_buffer_size: 100,
            buffering_rate: 0.0,
            stats: BufferStats::default(),
            tracks: Vec::new(),
        }
    }

    #[test]
    fn test_memory_utilization() {
        let mut snapshot = snapshot();
        assert_eq!(snapshot.memory_utilization(), 0.25);

        snapshot.maximum_buffer_size = 0;
        assert_eq!(snapshot.memory_utilization(), 1.0);
    }

    #[test]
    fn test_gaps_reported() {
        let snapshot = snapshot();
        assert_eq!(snapshot.buffered_seconds(), 6.0);
        assert_eq!(
            snapshot.findings(),
            vec![Finding::BufferedGap {
                start: 4.0,
                end: 6.0
            }]
        );
    }
}
