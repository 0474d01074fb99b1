//! Test doubles shared by the integration tests

#![allow(dead_code)]

use bytes::Bytes;
use mediabuf_core::*;
use mediabuf_media::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

// ============================================================================
// FRAME SINK
// ============================================================================

#[derive(Debug, Default)]
struct SinkState {
    ready: bool,
    enqueued: Vec<Arc<CodedFrame>>,
    flushes: Vec<(TrackId, Vec<Arc<CodedFrame>>)>,
    notify_requests: Vec<TrackId>,
    ready_state: ReadyState,
    active: bool,
}

/// Sink that records everything handed to it
#[derive(Debug)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SinkState {
                ready: true,
                ..SinkState::default()
            }),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().ready = ready;
    }

    /// Frames enqueued since the last flush
    pub fn enqueued(&self) -> Vec<Arc<CodedFrame>> {
        self.state.lock().enqueued.clone()
    }

    pub fn enqueued_decode_times(&self) -> Vec<MediaTime> {
        self.state
            .lock()
            .enqueued
            .iter()
            .map(|frame| frame.decode_time)
            .collect()
    }

    pub fn enqueued_presentation_times(&self) -> Vec<MediaTime> {
        self.state
            .lock()
            .enqueued
            .iter()
            .map(|frame| frame.presentation_time)
            .collect()
    }

    pub fn flushes(&self) -> Vec<(TrackId, Vec<Arc<CodedFrame>>)> {
        self.state.lock().flushes.clone()
    }

    pub fn notify_requests(&self) -> Vec<TrackId> {
        self.state.lock().notify_requests.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }
}

impl FrameSink for RecordingSink {
    fn is_ready_for_more_samples(&self, _track_id: &TrackId) -> bool {
        self.state.lock().ready
    }

    fn enqueue_sample(&self, frame: Arc<CodedFrame>, _track_id: &TrackId) {
        self.state.lock().enqueued.push(frame);
    }

    fn notify_when_ready_for_more_samples(&self, track_id: &TrackId) {
        self.state.lock().notify_requests.push(track_id.clone());
    }

    fn flush_and_enqueue_non_displaying_samples(
        &self,
        frames: Vec<Arc<CodedFrame>>,
        track_id: &TrackId,
    ) {
        let mut state = self.state.lock();
        state.enqueued.clear();
        state.flushes.push((track_id.clone(), frames));
    }

    fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.lock().ready_state = ready_state;
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }
}

// ============================================================================
// MEDIA SOURCE HOST
// ============================================================================

#[derive(Debug)]
struct HostState {
    current_time: MediaTime,
    duration: Option<MediaTime>,
    ended: bool,
    open: bool,
    seeking: bool,
    errors: Vec<EndOfStreamError>,
    active_changes: Vec<bool>,
    reopened: usize,
}

/// Host with a settable clock and duration
#[derive(Debug)]
pub struct TestHost {
    state: Mutex<HostState>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HostState {
                current_time: MediaTime::ZERO,
                duration: None,
                ended: false,
                open: true,
                seeking: false,
                errors: Vec::new(),
                active_changes: Vec::new(),
                reopened: 0,
            }),
        })
    }

    pub fn set_current_time(&self, time: MediaTime) {
        self.state.lock().current_time = time;
    }

    pub fn set_duration(&self, duration: Option<MediaTime>) {
        self.state.lock().duration = duration;
    }

    pub fn set_ended(&self, ended: bool) {
        let mut state = self.state.lock();
        state.ended = ended;
        state.open = !ended;
    }

    pub fn set_open(&self, open: bool) {
        self.state.lock().open = open;
    }

    pub fn set_seeking(&self, seeking: bool) {
        self.state.lock().seeking = seeking;
    }

    pub fn errors(&self) -> Vec<EndOfStreamError> {
        self.state.lock().errors.clone()
    }

    pub fn active_changes(&self) -> Vec<bool> {
        self.state.lock().active_changes.clone()
    }

    pub fn reopened(&self) -> usize {
        self.state.lock().reopened
    }
}

impl MediaSourceHost for TestHost {
    fn current_time(&self) -> MediaTime {
        self.state.lock().current_time
    }

    fn duration(&self) -> Option<MediaTime> {
        self.state.lock().duration
    }

    fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn is_seeking(&self) -> bool {
        self.state.lock().seeking
    }

    fn open_if_in_ended_state(&self) {
        let mut state = self.state.lock();
        if state.ended {
            state.ended = false;
            state.open = true;
            state.reopened += 1;
        }
    }

    fn set_duration_internal(&self, duration: MediaTime) {
        self.state.lock().duration = Some(duration);
    }

    fn stream_ended_with_error(&self, error: EndOfStreamError) {
        let mut state = self.state.lock();
        state.errors.push(error);
        state.ended = true;
        state.open = false;
    }

    fn source_buffer_did_change_active_state(&self, active: bool) {
        self.state.lock().active_changes.push(active);
    }
}

// ============================================================================
// SEGMENT PARSER
// ============================================================================

#[derive(Debug, Default)]
struct ParserState {
    script: VecDeque<Result<Vec<ParsedSegment>, ParseError>>,
    parsed_bytes: Vec<usize>,
    aborts: usize,
    detached: bool,
}

/// Parser that returns queued results regardless of input
#[derive(Debug, Clone, Default)]
pub struct ScriptedParser {
    state: Arc<Mutex<ParserState>>,
}

impl ScriptedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, segments: Vec<ParsedSegment>) {
        self.state.lock().script.push_back(Ok(segments));
    }

    pub fn push_error(&self, error: ParseError) {
        self.state.lock().script.push_back(Err(error));
    }

    pub fn aborts(&self) -> usize {
        self.state.lock().aborts
    }

    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    pub fn parsed_bytes(&self) -> Vec<usize> {
        self.state.lock().parsed_bytes.clone()
    }
}

impl SegmentParser for ScriptedParser {
    fn parse(&self, data: Bytes) -> Result<Vec<ParsedSegment>, ParseError> {
        let mut state = self.state.lock();
        if state.detached {
            return Err(ParseError::Detached);
        }
        state.parsed_bytes.push(data.len());
        state.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn abort(&self) {
        self.state.lock().aborts += 1;
    }

    fn detach(&self) {
        self.state.lock().detached = true;
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub struct Harness {
    pub buffer: SourceBuffer,
    pub host: Arc<TestHost>,
    pub sink: Arc<RecordingSink>,
    pub parser: ScriptedParser,
    pub events: EventStream,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SourceBufferConfig::default())
    }

    pub fn with_config(config: SourceBufferConfig) -> Self {
        let host = TestHost::new();
        let sink = RecordingSink::new();
        let parser = ScriptedParser::new();
        let mut buffer = SourceBuffer::new(
            config,
            Box::new(parser.clone()),
            sink.clone(),
            host.clone(),
        );
        let events = buffer.events().expect("event stream");
        Self {
            buffer,
            host,
            sink,
            parser,
            events,
        }
    }

    /// Script `segments` for the next append and run it to completion
    pub fn append(&mut self, segments: Vec<ParsedSegment>) -> BufferResult<()> {
        self.parser.push(segments);
        self.buffer.append_buffer(Bytes::from_static(b"segment"))?;
        self.buffer.run_pending_tasks();
        Ok(())
    }

    /// Event type names drained from the stream
    pub fn event_types(&mut self) -> Vec<&'static str> {
        self.events
            .drain()
            .iter()
            .map(|event| event.event_type())
            .collect()
    }
}

pub fn secs(value: f64) -> MediaTime {
    MediaTime::from_secs_f64(value)
}

pub fn video_id() -> TrackId {
    TrackId::new("video")
}

pub fn audio_id() -> TrackId {
    TrackId::new("audio")
}

pub fn video_init(duration: Option<f64>) -> ParsedSegment {
    ParsedSegment::Initialization(InitializationSegment {
        duration: duration.map(secs),
        tracks: vec![InitializationTrack::new(
            "video",
            "avc1.64001f",
            TrackKind::Video,
        )],
    })
}

pub fn audio_video_init(duration: Option<f64>) -> ParsedSegment {
    ParsedSegment::Initialization(InitializationSegment {
        duration: duration.map(secs),
        tracks: vec![
            InitializationTrack::new("audio", "mp4a.40.2", TrackKind::Audio),
            InitializationTrack::new("video", "avc1.64001f", TrackKind::Video),
        ],
    })
}

/// A frame on `track` with times in seconds and a one byte payload
pub fn frame(track: &str, pts: f64, dts: f64, duration: f64, sync: bool) -> CodedFrame {
    CodedFrame::new(track, secs(pts), secs(dts), secs(duration), sync).with_payload(vec![0u8; 1])
}

/// One-second video frames at `0..count` with a sync frame every `gop`
pub fn video_frames(count: usize, gop: usize) -> Vec<CodedFrame> {
    (0..count)
        .map(|index| {
            let time = index as f64;
            frame("video", time, time, 1.0, index % gop == 0)
        })
        .collect()
}

pub fn media(frames: Vec<CodedFrame>) -> ParsedSegment {
    ParsedSegment::MediaSamples(frames)
}
