//! Source buffer controller
//!
//! [`SourceBuffer`] is the public face of the crate. `append_buffer` and
//! `remove` validate their arguments, emit `UpdateStart` and schedule a task;
//! the host's event loop drives those tasks with
//! [`SourceBuffer::run_pending_tasks`]. A completed append hands its bytes to
//! the [`SegmentParser`], runs every parsed frame through the coded frame
//! processor and then feeds the [`FrameSink`] in decode order as far as the
//! sink's back-pressure allows.

use crate::config::SourceBufferConfig;
use crate::event::{EventStream, SourceBufferEvent};
use crate::eviction::{EvictionController, EvictionTarget};
use crate::host::{EndOfStreamError, MediaSourceHost};
use crate::parser::{InitializationSegment, ParsedSegment, SegmentParser};
use crate::processing::{BufferStats, CodedFrameProcessor, FrameOutcome};
use crate::removal::RemovalReport;
use crate::render::{FrameSink, ReadyState};
use crate::tracks::TrackBuffer;
use bytes::Bytes;
use mediabuf_core::{
    BufferError, BufferResult, CodedFrame, MediaTime, TaskHandle, TaskQueue, TimeRanges, TrackId,
    TrackKind,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Where the segment parser loop stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppendState {
    /// Between segments
    #[default]
    WaitingForSegment,
    /// Inside an initialization segment
    ParsingInitSegment,
    /// Inside a media segment
    ParsingMediaSegment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingTask {
    Append,
    Remove,
}

/// Buffer controller for one stream of media segments
pub struct SourceBuffer {
    id: Uuid,
    config: SourceBufferConfig,
    processor: CodedFrameProcessor,
    parser: Box<dyn SegmentParser>,
    sink: Arc<dyn FrameSink>,
    host: Option<Arc<dyn MediaSourceHost>>,
    event_tx: mpsc::UnboundedSender<SourceBufferEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SourceBufferEvent>>,
    tasks: TaskQueue<PendingTask>,
    append_task: Option<TaskHandle>,
    remove_task: Option<TaskHandle>,
    pending_append: Option<Bytes>,
    pending_remove: Option<(MediaTime, MediaTime)>,
    // Aggregate ranges and the host's ended flag they were computed with
    buffered_cache: Mutex<Option<(bool, TimeRanges)>>,
    append_state: AppendState,
    updating: bool,
    buffer_full: bool,
    active: bool,
    decode_error: bool,
}

impl SourceBuffer {
    /// Create a source buffer attached to `host`
    pub fn new(
        config: SourceBufferConfig,
        parser: Box<dyn SegmentParser>,
        sink: Arc<dyn FrameSink>,
        host: Arc<dyn MediaSourceHost>,
    ) -> Self {
        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!(
            id = %id,
            maximum_buffer_size = config.maximum_buffer_size,
            "Created source buffer"
        );

        Self {
            id,
            processor: CodedFrameProcessor::new(config.buffering_rate_coefficient),
            config,
            parser,
            sink,
            host: Some(host),
            event_tx,
            event_rx: Some(event_rx),
            tasks: TaskQueue::new(),
            append_task: None,
            remove_task: None,
            pending_append: None,
            pending_remove: None,
            buffered_cache: Mutex::new(None),
            append_state: AppendState::WaitingForSegment,
            updating: false,
            buffer_full: false,
            active: false,
            decode_error: false,
        }
    }

    /// Unique id of this buffer, used in log output
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration in effect
    pub fn config(&self) -> &SourceBufferConfig {
        &self.config
    }

    /// Take the event stream
    ///
    /// Returns `None` after the first call.
    pub fn events(&mut self) -> Option<EventStream> {
        self.event_rx.take().map(EventStream::new)
    }

    /// Whether an append or remove is in progress
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Whether the memory budget was exceeded by the last append
    pub fn is_buffer_full(&self) -> bool {
        self.buffer_full
    }

    /// Whether the buffer carries an enabled audio or video track
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the buffer was detached from its host
    pub fn is_detached(&self) -> bool {
        self.host.is_none()
    }

    /// Whether a decode error blocks further appends
    pub fn has_decode_error(&self) -> bool {
        self.decode_error
    }

    /// Segment parser loop state
    pub fn append_state(&self) -> AppendState {
        self.append_state
    }

    /// Number of scheduled tasks not yet run
    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Track buffers keyed by id
    pub fn tracks(&self) -> &BTreeMap<TrackId, TrackBuffer> {
        self.processor.tracks()
    }

    /// One track buffer
    pub fn track(&self, id: &TrackId) -> Option<&TrackBuffer> {
        self.processor.track(id)
    }

    /// Lifetime counters
    pub fn stats(&self) -> &BufferStats {
        &self.processor.stats
    }

    /// Highest frame end time seen across all tracks
    pub fn highest_presentation_end(&self) -> Option<MediaTime> {
        self.processor.highest_presentation_end()
    }

    fn host(&self) -> BufferResult<Arc<dyn MediaSourceHost>> {
        self.host
            .clone()
            .ok_or_else(|| BufferError::invalid_state("source buffer has been removed"))
    }

    fn current_time(&self) -> MediaTime {
        self.host
            .as_ref()
            .map(|host| host.current_time())
            .unwrap_or(MediaTime::ZERO)
    }

    fn emit(&self, event: SourceBufferEvent) {
        trace!(id = %self.id, event = event.event_type(), "Emitting event");
        let _ = self.event_tx.send(event);
    }

    fn invalidate_buffered(&self) {
        *self.buffered_cache.lock() = None;
    }

    /// Queue `data` for parsing
    ///
    /// The bytes are parsed when the scheduled task runs. If the buffer is
    /// full and eviction cannot make room, fails with
    /// [`BufferError::QuotaExceeded`] after emitting the update triplet.
    pub fn append_buffer(&mut self, data: impl Into<Bytes>) -> BufferResult<()> {
        let data = data.into();
        let host = self.host()?;
        if self.updating {
            return Err(BufferError::invalid_state(
                "an append or remove is already in progress",
            ));
        }
        if self.decode_error {
            return Err(BufferError::invalid_state(
                "a previous append failed to decode",
            ));
        }

        host.open_if_in_ended_state();

        if self.buffer_full {
            let controller = EvictionController::from_config(&self.config);
            self.buffer_full = controller.evict(self, data.len());
        }

        if self.buffer_full {
            let available = self
                .config
                .maximum_buffer_size
                .saturating_sub(self.extra_memory_cost());
            warn!(
                id = %self.id,
                requested = data.len(),
                available,
                "Append rejected, buffer full"
            );
            self.emit(SourceBufferEvent::UpdateStart);
            self.emit(SourceBufferEvent::Update);
            self.emit(SourceBufferEvent::UpdateEnd);
            return Err(BufferError::QuotaExceeded {
                requested: data.len(),
                available,
            });
        }

        debug!(id = %self.id, bytes = data.len(), "Scheduling append");
        self.pending_append = Some(data);
        self.updating = true;
        self.emit(SourceBufferEvent::UpdateStart);
        self.append_task = Some(self.tasks.schedule(PendingTask::Append));
        Ok(())
    }

    /// Queue removal of the media presented in `[start, end)`
    pub fn remove(&mut self, start: MediaTime, end: MediaTime) -> BufferResult<()> {
        let host = self.host()?;
        if self.updating {
            return Err(BufferError::invalid_state(
                "an append or remove is already in progress",
            ));
        }

        let Some(duration) = host.duration() else {
            return Err(BufferError::invalid_access("duration is not set"));
        };
        if start.is_negative() || start > duration {
            return Err(BufferError::invalid_access(format!(
                "removal start {} outside [0, {}]",
                start, duration
            )));
        }
        if end <= start || end > duration {
            return Err(BufferError::invalid_access(format!(
                "removal end {} outside ({}, {}]",
                end, start, duration
            )));
        }

        host.open_if_in_ended_state();

        debug!(id = %self.id, start = %start, end = %end, "Scheduling removal");
        self.pending_remove = Some((start, end));
        self.updating = true;
        self.emit(SourceBufferEvent::UpdateStart);
        self.remove_task = Some(self.tasks.schedule(PendingTask::Remove));
        Ok(())
    }

    /// Run every scheduled task in order
    ///
    /// Returns the number of tasks run.
    pub fn run_pending_tasks(&mut self) -> usize {
        let mut ran = 0;
        while let Some((handle, task)) = self.tasks.pop() {
            match task {
                PendingTask::Append => {
                    if self.append_task == Some(handle) {
                        self.append_task = None;
                    }
                    self.run_append();
                }
                PendingTask::Remove => {
                    if self.remove_task == Some(handle) {
                        self.remove_task = None;
                    }
                    self.run_removal();
                }
            }
            ran += 1;
        }
        ran
    }

    /// Cancel any in-flight append or remove and reset the parser
    pub fn abort(&mut self) -> BufferResult<()> {
        let host = self.host()?;
        if !host.is_open() {
            return Err(BufferError::invalid_state("media source is not open"));
        }

        self.abort_if_updating();
        self.reset_parser_state();
        debug!(id = %self.id, "Aborted");
        Ok(())
    }

    fn abort_if_updating(&mut self) {
        if !self.updating {
            return;
        }

        if let Some(handle) = self.append_task.take() {
            self.tasks.cancel(handle);
        }
        if let Some(handle) = self.remove_task.take() {
            self.tasks.cancel(handle);
        }
        self.pending_append = None;
        self.pending_remove = None;
        self.updating = false;

        self.emit(SourceBufferEvent::Abort);
        self.emit(SourceBufferEvent::UpdateEnd);
    }

    fn reset_parser_state(&mut self) {
        self.processor.reset_all_tracks();
        self.append_state = AppendState::WaitingForSegment;
        self.parser.abort();
    }

    /// Offset added to the timestamps of frames appended from now on
    pub fn timestamp_offset(&self) -> MediaTime {
        self.processor.timestamp_offset()
    }

    /// Change the timestamp offset
    pub fn set_timestamp_offset(&mut self, offset: MediaTime) -> BufferResult<()> {
        let host = self.host()?;
        if self.updating {
            return Err(BufferError::invalid_state(
                "an append or remove is already in progress",
            ));
        }
        if self.append_state == AppendState::ParsingMediaSegment {
            return Err(BufferError::invalid_state(
                "cannot change the offset inside a media segment",
            ));
        }
        if !offset.is_finite() {
            return Err(BufferError::invalid_access("timestamp offset must be finite"));
        }

        host.open_if_in_ended_state();
        self.processor.set_timestamp_offset(offset);
        debug!(id = %self.id, offset = %offset, "Set timestamp offset");
        Ok(())
    }

    /// Enable or disable a track
    ///
    /// Disabled tracks do not contribute to [`Self::buffered`]. The buffer is
    /// active while any audio or video track is enabled.
    pub fn set_track_enabled(&mut self, track_id: &TrackId, enabled: bool) -> BufferResult<()> {
        self.host()?;
        let track = self
            .processor
            .track_mut(track_id)
            .ok_or_else(|| BufferError::invalid_access(format!("unknown track {}", track_id)))?;
        track.enabled = enabled;

        let active = self.processor.tracks().values().any(|track| {
            track.enabled
                && track
                    .description()
                    .map(|description| {
                        matches!(description.kind, TrackKind::Audio | TrackKind::Video)
                    })
                    .unwrap_or(false)
        });
        self.set_active(active);
        self.invalidate_buffered();

        debug!(id = %self.id, track_id = %track_id, enabled, "Changed track state");
        Ok(())
    }

    fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        self.sink.set_active(active);
        if let Some(host) = &self.host {
            host.source_buffer_did_change_active_state(active);
        }
    }

    /// Detach from the host
    ///
    /// Aborts in-flight work and drops every stored frame. Every later
    /// operation fails with [`BufferError::InvalidState`].
    pub fn detach(&mut self) {
        if self.host.is_none() {
            return;
        }

        self.abort_if_updating();
        self.reset_parser_state();
        self.parser.detach();
        self.processor.clear_samples();
        self.set_active(false);
        self.host = None;
        self.invalidate_buffered();

        info!(id = %self.id, "Detached source buffer");
    }

    /// Clear the decode error flag so appends are accepted again
    pub fn reset_after_decode_error(&mut self) {
        if self.decode_error {
            info!(id = %self.id, "Resetting after decode error");
        }
        self.decode_error = false;
        self.reset_parser_state();
    }

    /// Ranges buffered on every enabled track
    pub fn buffered(&self) -> BufferResult<TimeRanges> {
        self.host()?;
        Ok(self.buffered_ranges_cached())
    }

    fn buffered_ranges_cached(&self) -> TimeRanges {
        let ended = self
            .host
            .as_ref()
            .map(|host| host.is_ended())
            .unwrap_or(false);

        let mut cache = self.buffered_cache.lock();
        if let Some((cached_ended, ranges)) = cache.as_ref() {
            if *cached_ended == ended {
                return ranges.clone();
            }
        }
        let ranges = self.recalculate_buffered(ended);
        *cache = Some((ended, ranges.clone()));
        ranges
    }

    fn recalculate_buffered(&self, ended: bool) -> TimeRanges {
        let enabled: Vec<&TrackBuffer> = self
            .processor
            .tracks()
            .values()
            .filter(|track| track.enabled)
            .collect();

        let highest_end = enabled
            .iter()
            .filter_map(|track| track.buffered.maximum_buffered_time())
            .max()
            .unwrap_or(MediaTime::ZERO);
        if highest_end <= MediaTime::ZERO {
            return TimeRanges::new();
        }

        let mut intersection = TimeRanges::from_range(MediaTime::ZERO, highest_end);
        for track in enabled {
            let mut track_ranges = track.buffered.clone();
            if ended {
                if let Some(track_end) = track_ranges.maximum_buffered_time() {
                    track_ranges.add(track_end, highest_end);
                }
            }
            intersection.intersect_with(&track_ranges);
        }

        trace!(id = %self.id, buffered = %intersection, "Recalculated buffered ranges");
        intersection
    }

    fn buffered_accounting_for_end_of_stream(&self) -> TimeRanges {
        let mut ranges = self.buffered_ranges_cached();
        if let Some(host) = &self.host {
            if host.is_ended() {
                if let (Some(duration), Some(maximum)) =
                    (host.duration(), ranges.maximum_buffered_time())
                {
                    if maximum < duration {
                        ranges.add(maximum, duration);
                    }
                }
            }
        }
        ranges
    }

    /// Bytes held by pending append data plus all stored frames
    pub fn extra_memory_cost(&self) -> usize {
        let pending = self.pending_append.as_ref().map(Bytes::len).unwrap_or(0);
        pending + self.processor.size_in_bytes()
    }

    fn run_append(&mut self) {
        let Some(data) = self.pending_append.take() else {
            return;
        };

        if data.is_empty() {
            self.append_complete();
            return;
        }

        let result = self
            .parser
            .parse(data)
            .map_err(BufferError::from)
            .and_then(|segments| self.apply_segments(segments));

        match result {
            Ok(()) => self.append_complete(),
            Err(error) => self.append_error(error),
        }
    }

    fn apply_segments(&mut self, segments: Vec<ParsedSegment>) -> BufferResult<()> {
        let host = self.host()?;
        let current_time = host.current_time();
        let outcome = self.apply_segments_inner(segments, current_time);

        if let (Some(highest), Some(duration)) =
            (self.processor.highest_presentation_end(), host.duration())
        {
            if highest > duration {
                debug!(id = %self.id, duration = %highest, "Extending duration");
                host.set_duration_internal(highest);
            }
        }
        self.invalidate_buffered();
        outcome
    }

    fn apply_segments_inner(
        &mut self,
        segments: Vec<ParsedSegment>,
        current_time: MediaTime,
    ) -> BufferResult<()> {
        for segment in segments {
            match segment {
                ParsedSegment::Initialization(init) => {
                    self.append_state = AppendState::ParsingInitSegment;
                    self.apply_initialization_segment(&init)?;
                    self.append_state = AppendState::WaitingForSegment;
                }
                ParsedSegment::MediaSamples(frames) => {
                    if !self.processor.received_first_initialization_segment() {
                        return Err(BufferError::decode(
                            "media segment before the first initialization segment",
                        ));
                    }
                    self.append_state = AppendState::ParsingMediaSegment;
                    for frame in frames {
                        match self.processor.process_frame(frame, current_time)? {
                            FrameOutcome::Accepted => {}
                            FrameOutcome::Dropped {
                                track_id,
                                presentation_time,
                            } => self.emit(SourceBufferEvent::SampleDropped {
                                track_id,
                                presentation_time,
                            }),
                        }
                    }
                    self.append_state = AppendState::WaitingForSegment;
                }
            }
        }
        Ok(())
    }

    fn apply_initialization_segment(
        &mut self,
        segment: &InitializationSegment,
    ) -> BufferResult<()> {
        let host = self.host()?;
        if host.duration().is_none() {
            let duration = segment.duration.unwrap_or(MediaTime::POSITIVE_INFINITY);
            host.set_duration_internal(duration);
        }

        let outcome = self.processor.apply_initialization_segment(segment)?;
        if outcome.activated {
            self.set_active(true);
        }

        if self.sink.ready_state() == ReadyState::HaveNothing {
            self.sink.set_ready_state(ReadyState::HaveMetadata);
        }
        if outcome.activated && self.sink.ready_state() > ReadyState::HaveCurrentData {
            self.sink.set_ready_state(ReadyState::HaveMetadata);
        }

        info!(
            id = %self.id,
            tracks = segment.tracks.len(),
            first = outcome.first,
            "Initialization segment received"
        );
        Ok(())
    }

    fn append_complete(&mut self) {
        self.updating = false;
        self.emit(SourceBufferEvent::Update);
        self.emit(SourceBufferEvent::UpdateEnd);

        let current_time = self.current_time();
        let track_ids: Vec<TrackId> = self.processor.tracks().keys().cloned().collect();
        for track_id in &track_ids {
            let needs_reenqueueing = self
                .processor
                .track(track_id)
                .map(|track| track.needs_reenqueueing)
                .unwrap_or(false);
            if needs_reenqueueing {
                self.reenqueue_media_for_time(track_id, current_time);
            } else {
                self.provide_media_data(track_id);
            }
        }

        if self.extra_memory_cost() > self.config.maximum_buffer_size {
            debug!(
                id = %self.id,
                cost = self.extra_memory_cost(),
                "Buffer exceeded its memory budget"
            );
            self.buffer_full = true;
        }

        self.monitor_buffering_rate();
    }

    fn append_error(&mut self, error: BufferError) {
        warn!(id = %self.id, error = %error, "Append failed");

        self.reset_parser_state();
        self.updating = false;
        self.decode_error = true;
        self.invalidate_buffered();

        self.emit(SourceBufferEvent::Error {
            reason: error.to_string(),
        });
        self.emit(SourceBufferEvent::UpdateEnd);

        if let Some(host) = &self.host {
            host.stream_ended_with_error(EndOfStreamError::Decode);
        }
    }

    fn run_removal(&mut self) {
        let Some((start, end)) = self.pending_remove.take() else {
            return;
        };

        self.remove_coded_frames_internal(start, end);

        if self.buffer_full && self.extra_memory_cost() < self.config.maximum_buffer_size {
            self.buffer_full = false;
        }

        let current_time = self.current_time();
        let seeking = self
            .host
            .as_ref()
            .map(|host| host.is_seeking())
            .unwrap_or(false);
        if !seeking {
            let flagged: Vec<TrackId> = self
                .processor
                .tracks()
                .values()
                .filter(|track| track.needs_reenqueueing)
                .map(|track| track.id().clone())
                .collect();
            for track_id in &flagged {
                self.reenqueue_media_for_time(track_id, current_time);
            }
        }

        self.updating = false;
        self.emit(SourceBufferEvent::Update);
        self.emit(SourceBufferEvent::UpdateEnd);
    }

    fn remove_coded_frames_internal(&mut self, start: MediaTime, end: MediaTime) -> RemovalReport {
        let current_time = self.current_time();
        let report = self.processor.remove_coded_frames(start, end, current_time);

        if self.active
            && start <= current_time
            && current_time < end
            && self.sink.ready_state() > ReadyState::HaveMetadata
        {
            self.sink.set_ready_state(ReadyState::HaveMetadata);
        }

        self.invalidate_buffered();
        debug!(
            id = %self.id,
            start = %start,
            end = %end,
            frames = report.frames_removed,
            "Coded frame removal finished"
        );
        report
    }

    /// Re-prime every track at `time`
    pub fn seek_to_time(&mut self, time: MediaTime) -> BufferResult<()> {
        self.host()?;
        debug!(id = %self.id, time = %time, "Seeking");

        let track_ids: Vec<TrackId> = self.processor.tracks().keys().cloned().collect();
        for track_id in &track_ids {
            if let Some(track) = self.processor.track_mut(track_id) {
                track.needs_reenqueueing = true;
            }
            self.reenqueue_media_for_time(track_id, time);
        }
        Ok(())
    }

    /// Flush the sink and refill it so playback can resume at `time`
    ///
    /// Frames from the preceding sync frame up to the frame at `time` are
    /// decoded without display; the decode queue restarts at the frame at
    /// `time`.
    pub fn reenqueue_media_for_time(&mut self, track_id: &TrackId, time: MediaTime) {
        let sink = self.sink.clone();
        let fudge = self.config.current_time_fudge;
        let Some(track) = self.processor.track_mut(track_id) else {
            return;
        };

        let current = track
            .samples
            .find_sample_containing_presentation_time(time)
            .or_else(|| {
                track
                    .samples
                    .find_sample_on_or_after_presentation_time(time)
                    .filter(|frame| frame.presentation_time - time <= fudge)
            });
        let sync = current.as_ref().and_then(|frame| {
            track
                .samples
                .find_sync_sample_prior_to_decode_key(&frame.decode_key())
        });

        let (Some(current), Some(sync)) = (current, sync) else {
            debug!(track_id = %track_id, time = %time, "Nothing to re-enqueue");
            track.decode_queue.clear();
            track.last_enqueued_presentation_time = None;
            track.last_enqueued_decode_end_time = None;
            sink.flush_and_enqueue_non_displaying_samples(Vec::new(), track_id);
            return;
        };

        let non_displaying: Vec<Arc<CodedFrame>> = track
            .samples
            .decode_order_range(sync.decode_key()..current.decode_key())
            .cloned()
            .collect();
        track.last_enqueued_presentation_time =
            non_displaying.last().map(|frame| frame.presentation_time);
        track.last_enqueued_decode_end_time =
            non_displaying.last().map(|frame| frame.decode_time);

        debug!(
            track_id = %track_id,
            time = %time,
            non_displaying = non_displaying.len(),
            "Re-enqueueing media"
        );
        sink.flush_and_enqueue_non_displaying_samples(non_displaying, track_id);

        track.decode_queue = track
            .samples
            .decode_order_range(current.decode_key()..)
            .map(|frame| (frame.decode_key(), frame.clone()))
            .collect();

        self.provide_media_data(track_id);
        if let Some(track) = self.processor.track_mut(track_id) {
            track.needs_reenqueueing = false;
        }
    }

    /// Hand queued frames to the sink in decode order while it accepts them
    pub fn provide_media_data(&mut self, track_id: &TrackId) {
        let sink = self.sink.clone();
        let max_gap = self.config.max_enqueue_gap;
        let Some(track) = self.processor.track_mut(track_id) else {
            return;
        };

        let mut delivered = 0usize;
        while let Some(entry) = track.decode_queue.first_entry() {
            if !sink.is_ready_for_more_samples(track_id) {
                sink.notify_when_ready_for_more_samples(track_id);
                break;
            }

            // Hold back frames after a large decode gap
            if let Some(decode_end) = track.last_enqueued_decode_end_time {
                if entry.get().decode_time - decode_end > max_gap {
                    break;
                }
            }

            let frame = entry.remove();
            track.last_enqueued_presentation_time = Some(frame.presentation_time);
            track.last_enqueued_decode_end_time = Some(frame.decode_end_time());
            sink.enqueue_sample(frame, track_id);
            delivered += 1;
        }

        if delivered > 0 {
            trace!(
                track_id = %track_id,
                delivered,
                queued = track.decode_queue.len(),
                "Provided media data"
            );
        }
    }

    /// Sink readiness callback
    pub fn did_become_ready_for_more_samples(&mut self, track_id: &TrackId) {
        let Some(host) = self.host.clone() else {
            return;
        };
        let needs_reenqueueing = self
            .processor
            .track(track_id)
            .map(|track| track.needs_reenqueueing)
            .unwrap_or(true);
        if needs_reenqueueing || host.is_seeking() {
            return;
        }
        self.provide_media_data(track_id);
    }

    /// Nearest sync frame time to `target` within the thresholds
    ///
    /// Each track picks the closer of its sync frames before and after
    /// `target`; the track whose pick is farthest from `target` wins so that
    /// every track can start decoding there. Returns `target` when no track
    /// has a sync frame within range.
    pub fn fast_seek_time_for_media_time(
        &self,
        target: MediaTime,
        negative_threshold: MediaTime,
        positive_threshold: MediaTime,
    ) -> MediaTime {
        let mut seek_time = target;
        let mut seek_distance = MediaTime::ZERO;

        for track in self.processor.tracks().values() {
            let future = track
                .samples
                .find_sync_sample_after_presentation_time(target, positive_threshold)
                .map(|frame| frame.presentation_time);
            let past = track
                .samples
                .find_sync_sample_prior_to_presentation_time(target, negative_threshold)
                .map(|frame| frame.presentation_time);

            let track_seek_time = match (past, future) {
                (Some(past), Some(future)) => {
                    if (target - past).abs() < (future - target).abs() {
                        past
                    } else {
                        future
                    }
                }
                (Some(past), None) => past,
                (None, Some(future)) => future,
                (None, None) => continue,
            };

            let distance = (track_seek_time - target).abs();
            if distance > seek_distance {
                seek_distance = distance;
                seek_time = track_seek_time;
            }
        }

        seek_time
    }

    /// Whether media is buffered at the current playback position
    pub fn has_current_time(&self) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        if self.buffered_ranges_cached().is_empty() {
            return false;
        }

        let current_time = host.current_time();
        if host.duration().map_or(false, |duration| current_time >= duration) {
            return true;
        }

        self.buffered_accounting_for_end_of_stream()
            .nearest(current_time)
            .map(|nearest| (nearest - current_time).abs() <= self.config.current_time_fudge)
            .unwrap_or(false)
    }

    /// Whether media is buffered past the current playback position
    pub fn has_future_time(&self) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        let ranges = self.buffered_accounting_for_end_of_stream();
        if ranges.is_empty() {
            return false;
        }

        let current_time = host.current_time();
        if host.duration().map_or(false, |duration| current_time >= duration) {
            return true;
        }

        let fudge = self.config.current_time_fudge;
        let Some(nearest) = ranges.nearest(current_time) else {
            return false;
        };
        if (nearest - current_time).abs() > fudge {
            return false;
        }

        let Some(local_end) = ranges.find(nearest).and_then(|index| ranges.end(index)) else {
            return false;
        };
        if host.duration() == Some(local_end) {
            return true;
        }
        local_end - current_time > fudge
    }

    /// Whether playback can likely continue to the end at the current
    /// buffering rate
    pub fn can_play_through(&mut self) -> bool {
        let Some(host) = self.host.clone() else {
            return false;
        };

        self.monitor_buffering_rate();
        let average_rate = self.processor.monitor.average_rate();
        if average_rate > 1.0 {
            return true;
        }

        let current_time = host.current_time();
        let duration = host.duration().unwrap_or(MediaTime::POSITIVE_INFINITY);

        let mut unbuffered = self.buffered_accounting_for_end_of_stream();
        unbuffered.invert();
        unbuffered.intersect_with(&TimeRanges::from_range(
            current_time,
            current_time.max(duration),
        ));
        let unbuffered_time = unbuffered.total_duration();
        if unbuffered_time == MediaTime::ZERO {
            return true;
        }

        let time_remaining = duration - current_time;
        unbuffered_time.as_secs_f64() / average_rate < time_remaining.as_secs_f64()
    }

    /// Fold recently buffered media into the buffering-rate average
    pub fn monitor_buffering_rate(&mut self) {
        self.processor.monitor.update(Instant::now());
    }

    /// Moving average of media seconds buffered per second
    pub fn buffering_rate(&self) -> f64 {
        self.processor.monitor.average_rate()
    }

    /// Human-readable descriptions of a track's frames in decode order
    pub fn buffered_samples_for_track(&self, track_id: &TrackId) -> Vec<String> {
        self.processor
            .track(track_id)
            .map(|track| {
                track
                    .samples
                    .decode_order()
                    .map(|frame| frame.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Human-readable descriptions of the frames waiting for the sink
    pub fn enqueued_samples_for_track(&self, track_id: &TrackId) -> Vec<String> {
        self.processor
            .track(track_id)
            .map(|track| track.decode_queue().map(|frame| frame.to_string()).collect())
            .unwrap_or_default()
    }
}

impl EvictionTarget for SourceBuffer {
    fn extra_memory_cost(&self) -> usize {
        SourceBuffer::extra_memory_cost(self)
    }

    fn buffered_ranges(&self) -> TimeRanges {
        self.buffered_ranges_cached()
    }

    fn remove_coded_frames(&mut self, start: MediaTime, end: MediaTime) {
        let report = self.remove_coded_frames_internal(start, end);
        self.processor.stats.frames_evicted += report.frames_removed as u64;
        self.processor.stats.bytes_evicted += report.bytes_removed as u64;
    }

    fn current_time(&self) -> MediaTime {
        SourceBuffer::current_time(self)
    }

    fn duration(&self) -> Option<MediaTime> {
        self.host.as_ref().and_then(|host| host.duration())
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("id", &self.id)
            .field("tracks", &self.processor.tracks().len())
            .field("append_state", &self.append_state)
            .field("updating", &self.updating)
            .field("buffer_full", &self.buffer_full)
            .field("active", &self.active)
            .field("detached", &self.host.is_none())
            .finish()
    }
}

// Tests moved to tests/ directory
