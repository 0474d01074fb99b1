//! Integration tests for buffer snapshots and event recording

use bytes::Bytes;
use mediabuf_core::*;
use mediabuf_diagnostics::*;
use mediabuf_media::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

// ============================================================================
// FIXTURES
// ============================================================================

#[derive(Debug)]
struct GatedSink {
    ready: Mutex<bool>,
}

impl FrameSink for GatedSink {
    fn is_ready_for_more_samples(&self, _track_id: &TrackId) -> bool {
        *self.ready.lock()
    }

    fn enqueue_sample(&self, _frame: Arc<CodedFrame>, _track_id: &TrackId) {}

    fn notify_when_ready_for_more_samples(&self, _track_id: &TrackId) {}

    fn flush_and_enqueue_non_displaying_samples(
        &self,
        _frames: Vec<Arc<CodedFrame>>,
        _track_id: &TrackId,
    ) {
    }

    fn set_ready_state(&self, _state: ReadyState) {}

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveNothing
    }

    fn set_active(&self, _active: bool) {}
}

#[derive(Debug, Default)]
struct IdleHost;

impl MediaSourceHost for IdleHost {
    fn current_time(&self) -> MediaTime {
        MediaTime::ZERO
    }

    fn duration(&self) -> Option<MediaTime> {
        None
    }

    fn is_ended(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        true
    }

    fn is_seeking(&self) -> bool {
        false
    }

    fn open_if_in_ended_state(&self) {}

    fn set_duration_internal(&self, _duration: MediaTime) {}

    fn stream_ended_with_error(&self, _error: EndOfStreamError) {}

    fn source_buffer_did_change_active_state(&self, _active: bool) {}
}

#[derive(Debug, Clone, Default)]
struct QueuedParser {
    script: Arc<Mutex<VecDeque<Result<Vec<ParsedSegment>, ParseError>>>>,
}

impl SegmentParser for QueuedParser {
    fn parse(&self, _data: Bytes) -> Result<Vec<ParsedSegment>, ParseError> {
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn abort(&self) {}

    fn detach(&self) {}
}

fn secs(value: f64) -> MediaTime {
    MediaTime::from_secs_f64(value)
}

fn video_segments(frames: &[(f64, bool)]) -> Vec<ParsedSegment> {
    vec![
        ParsedSegment::Initialization(InitializationSegment {
            duration: None,
            tracks: vec![InitializationTrack::new(
                "video",
                "avc1.64001f",
                TrackKind::Video,
            )],
        }),
        ParsedSegment::MediaSamples(
            frames
                .iter()
                .map(|&(time, sync)| {
                    CodedFrame::new("video", secs(time), secs(time), secs(1.0), sync)
                        .with_payload(vec![0u8; 10])
                })
                .collect(),
        ),
    ]
}

fn buffer_with(
    script: Vec<Result<Vec<ParsedSegment>, ParseError>>,
    sink_ready: bool,
) -> SourceBuffer {
    let parser = QueuedParser::default();
    parser.script.lock().extend(script);
    let sink = Arc::new(GatedSink {
        ready: Mutex::new(sink_ready),
    });

    let mut buffer = SourceBuffer::new(
        SourceBufferConfig::default().with_maximum_buffer_size(1000),
        Box::new(parser),
        sink,
        Arc::new(IdleHost),
    );
    buffer.append_buffer(vec![0u8; 8]).unwrap();
    buffer.run_pending_tasks();
    buffer
}

// ============================================================================
// SNAPSHOT TESTS
// ============================================================================

#[test]
fn test_snapshot_captures_track_state() {
    let buffer = buffer_with(
        vec![Ok(video_segments(&[(0.0, true), (1.0, false), (2.0, true)]))],
        true,
    );

    let snapshot = BufferSnapshot::capture(&buffer);
    assert_eq!(snapshot.buffer_id, buffer.id());
    assert!(snapshot.active);
    assert!(!snapshot.updating);
    assert_eq!(snapshot.memory_cost, 30);
    assert_eq!(snapshot.memory_utilization(), 0.03);
    assert_eq!(snapshot.stats.frames_appended, 3);
    assert_eq!(snapshot.buffered.len(), 1);
    assert_eq!(snapshot.buffered[0].start, 0.0);

    let track = &snapshot.tracks[0];
    assert_eq!(track.id, TrackId::new("video"));
    assert_eq!(track.codec.as_deref(), Some("avc1.64001f"));
    assert_eq!(track.kind, Some(TrackKind::Video));
    assert_eq!(track.sample_count, 3);
    assert_eq!(track.size_in_bytes, 30);
    assert_eq!(track.last_decode_timestamp, Some(2.0));
    assert!(!snapshot
        .findings()
        .iter()
        .any(|finding| matches!(finding, Finding::BufferedGap { .. })));
}

#[test]
fn test_held_back_frames_reported() {
    let buffer = buffer_with(vec![Ok(video_segments(&[(0.0, true), (1.0, false)]))], false);

    let snapshot = BufferSnapshot::capture(&buffer);
    assert!(snapshot.findings().contains(&Finding::HeldBackFrames {
        track_id: TrackId::new("video"),
        count: 2,
    }));
}

#[test]
fn test_decode_error_reported() {
    let buffer = buffer_with(
        vec![Err(ParseError::Malformed {
            reason: "bad box".to_string(),
        })],
        true,
    );

    let snapshot = BufferSnapshot::capture(&buffer);
    assert!(snapshot.decode_error);
    assert_eq!(snapshot.findings().first(), Some(&Finding::DecodeError));
}

#[test]
fn test_detached_snapshot_has_no_ranges() {
    let mut buffer = buffer_with(vec![Ok(video_segments(&[(0.0, true)]))], true);
    buffer.detach();

    let snapshot = BufferSnapshot::capture(&buffer);
    assert!(snapshot.detached);
    assert!(snapshot.buffered.is_empty());
    assert_eq!(snapshot.buffered_seconds(), 0.0);
}

#[test]
fn test_snapshot_json() {
    let buffer = buffer_with(vec![Ok(video_segments(&[(0.0, true)]))], true);
    let snapshot = BufferSnapshot::capture(&buffer);

    let json = snapshot.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["tracks"][0]["codec"], "avc1.64001f");
    assert_eq!(value["tracks"][0]["kind"], "Video");
    assert_eq!(value["append_state"], "WaitingForSegment");
    assert_eq!(value["stats"]["frames_appended"], 1);

    assert!(snapshot.to_json_pretty().unwrap().contains('\n'));
}

// ============================================================================
// EVENT LOG TESTS
// ============================================================================

#[test]
fn test_event_log_drains_lifecycle() {
    let mut buffer = buffer_with(vec![Ok(video_segments(&[(0.0, true)]))], true);
    let mut events = buffer.events().unwrap();

    let mut log = EventLog::new(buffer.id());
    assert_eq!(log.drain(&mut events), 3);
    assert_eq!(log.event_types(), vec!["updatestart", "update", "updateend"]);
    assert_eq!(log.count("update"), 1);
    assert_eq!(log.count("error"), 0);
    assert_eq!(log.records()[2].sequence, 2);
}

#[test]
fn test_event_log_keeps_details() {
    let mut buffer = buffer_with(
        vec![Ok(video_segments(&[(0.0, false), (1.0, true)]))],
        true,
    );
    let mut events = buffer.events().unwrap();

    let mut log = EventLog::new(buffer.id());
    log.drain(&mut events);

    assert_eq!(log.count("sampledropped"), 1);
    let dropped = log
        .records()
        .iter()
        .find(|record| record.event_type == "sampledropped")
        .unwrap();
    assert_eq!(dropped.detail.as_deref(), Some("video @ 0.000000"));

    let json = log.to_json().unwrap();
    assert!(json.contains("sampledropped"));
}

#[tokio::test]
async fn test_event_log_records_until_buffer_dropped() {
    let mut buffer = buffer_with(vec![Ok(video_segments(&[(0.0, true)]))], true);
    let events = buffer.events().unwrap();
    let buffer_id = buffer.id();
    drop(buffer);

    let mut log = EventLog::new(buffer_id);
    let recorded = log.record_until_closed(events).await;
    assert_eq!(recorded, 3);
    assert_eq!(log.len(), 3);
    assert!(!log.is_empty());
    assert_eq!(log.buffer_id(), buffer_id);
}
