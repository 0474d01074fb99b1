//! Integration tests for configuration loading and the facade entry point

use bytes::Bytes;
use mediabuf::*;
use std::sync::Arc;
use tokio_test::assert_ok;

// ============================================================================
// CONFIGURATION TESTS
// ============================================================================

#[test]
fn test_default_config_uses_desktop_budget() {
    let config = GlobalConfig::default();
    assert!(!config.debug_logging);
    assert_eq!(config.source_buffer, SourceBufferConfig::desktop());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = GlobalConfig::from_json(
        r#"{
            "debug_logging": true,
            "source_buffer": { "maximum_buffer_size": 4096 }
        }"#,
    )
    .unwrap();

    assert!(config.debug_logging);
    assert_eq!(config.source_buffer.maximum_buffer_size, 4096);
    assert_eq!(
        config.source_buffer.eviction_window,
        SourceBufferConfig::desktop().eviction_window
    );
}

#[test]
fn test_malformed_json_rejected() {
    let error = GlobalConfig::from_json("{ not json").unwrap_err();
    assert!(error
        .to_string()
        .contains("Failed to parse mediabuf configuration"));
}

#[test]
fn test_config_survives_json_round_trip() {
    let mut config = GlobalConfig::default();
    config.source_buffer = SourceBufferConfig::constrained();

    let json = config.to_json().unwrap();
    assert_eq!(GlobalConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_budget_override() {
    let config = GlobalConfig::default()
        .with_overrides_from(|key| {
            (key == MAX_BUFFER_BYTES_ENV).then(|| " 2048 ".to_string())
        })
        .unwrap();
    assert_eq!(config.source_buffer.maximum_buffer_size, 2048);

    let untouched = GlobalConfig::default().with_overrides_from(|_| None).unwrap();
    assert_eq!(untouched, GlobalConfig::default());
}

#[test]
fn test_invalid_budget_override_rejected() {
    let error = GlobalConfig::default()
        .with_overrides_from(|_| Some("lots".to_string()))
        .unwrap_err();
    assert!(error.to_string().contains(MAX_BUFFER_BYTES_ENV));
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!(
        "mediabuf-config-{}.json",
        std::process::id()
    ));
    std::fs::write(&path, r#"{ "source_buffer": { "maximum_buffer_size": 777 } }"#).unwrap();

    let config = GlobalConfig::from_file(&path).unwrap();
    assert_eq!(config.source_buffer.maximum_buffer_size, 777);
    std::fs::remove_file(&path).unwrap();

    let error = GlobalConfig::from_file(&path).unwrap_err();
    assert!(error.to_string().contains("Failed to read configuration"));
}

// ============================================================================
// FACADE TESTS
// ============================================================================

#[derive(Debug)]
struct NullSink;

impl FrameSink for NullSink {
    fn is_ready_for_more_samples(&self, _track_id: &TrackId) -> bool {
        true
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

#[derive(Debug)]
struct StillHost;

impl MediaSourceHost for StillHost {
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

/// Treats every appended byte as a one-second sync frame on one audio track
#[derive(Debug)]
struct ByteFrameParser;

impl SegmentParser for ByteFrameParser {
    fn parse(&self, data: Bytes) -> Result<Vec<ParsedSegment>, ParseError> {
        let init = InitializationSegment {
            duration: None,
            tracks: vec![InitializationTrack::new("audio", "opus", TrackKind::Audio)],
        };
        let frames = (0..data.len())
            .map(|index| {
                let time = MediaTime::from_secs(index as i64);
                CodedFrame::new("audio", time, time, MediaTime::from_secs(1), true)
                    .with_payload(data.slice(index..index + 1))
            })
            .collect();
        Ok(vec![
            ParsedSegment::Initialization(init),
            ParsedSegment::MediaSamples(frames),
        ])
    }

    fn abort(&self) {}

    fn detach(&self) {}
}

fn byte_buffer(mediabuf: &MediaBuf) -> SourceBuffer {
    mediabuf.create_source_buffer(
        Box::new(ByteFrameParser),
        Arc::new(NullSink),
        Arc::new(StillHost),
    )
}

#[test]
fn test_created_buffer_uses_configured_budget() {
    let mut config = GlobalConfig::default();
    config.source_buffer.maximum_buffer_size = 64;
    let mediabuf = MediaBuf::init_with(config).unwrap();

    let mut buffer = byte_buffer(&mediabuf);
    assert_eq!(buffer.config().maximum_buffer_size, 64);

    assert_ok!(buffer.append_buffer(vec![0u8; 4]));
    assert_eq!(buffer.run_pending_tasks(), 1);

    let buffered = buffer.buffered().unwrap();
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered.start(0), Some(MediaTime::ZERO));
    assert_eq!(buffer.stats().frames_appended, 4);
}

#[test]
fn test_debug_logging_tolerates_existing_subscriber() {
    let mut config = GlobalConfig::default();
    config.debug_logging = true;
    config.logging.use_env = false;
    config.logging.directive = "mediabuf=debug".to_string();

    assert!(MediaBuf::init_with(config.clone()).is_ok());
    assert!(MediaBuf::init_with(config).is_ok());
}

#[test]
fn test_invalid_log_directive_fails_init() {
    let mut config = GlobalConfig::default();
    config.debug_logging = true;
    config.logging.use_env = false;
    config.logging.directive = "mediabuf=shouting".to_string();

    assert!(MediaBuf::init_with(config).is_err());
}

#[test]
fn test_snapshot_through_facade() {
    let mediabuf = MediaBuf::init_with(GlobalConfig::default()).unwrap();
    let mut buffer = byte_buffer(&mediabuf);
    assert_ok!(buffer.append_buffer(vec![0u8; 2]));
    buffer.run_pending_tasks();

    let snapshot = BufferSnapshot::capture(&buffer);
    assert_eq!(snapshot.tracks.len(), 1);
    assert_eq!(snapshot.tracks[0].kind, Some(TrackKind::Audio));
    assert_eq!(snapshot.buffered_seconds(), 2.000001);
}
