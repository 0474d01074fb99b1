//! Recording of source buffer notifications

use crate::error::DiagnosticsResult;
use futures::{Stream, StreamExt};
use mediabuf_media::{EventStream, SourceBufferEvent};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// One recorded notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Position in the log, starting at zero
    pub sequence: u64,
    /// Event type name, e.g. `updateend`
    pub event_type: &'static str,
    /// Error reason or dropped frame description
    pub detail: Option<String>,
}

/// Ordered log of the events one source buffer emitted
#[derive(Debug, Clone, Serialize)]
pub struct EventLog {
    buffer_id: Uuid,
    records: Vec<EventRecord>,
    counts: BTreeMap<&'static str, usize>,
}

impl EventLog {
    /// Create an empty log for a buffer
    pub fn new(buffer_id: Uuid) -> Self {
        Self {
            buffer_id,
            records: Vec::new(),
            counts: BTreeMap::new(),
        }
    }

    /// Append one event
    pub fn record(&mut self, event: &SourceBufferEvent) {
        let event_type = event.event_type();
        let detail = match event {
            SourceBufferEvent::Error { reason } => {
                warn!(buffer_id = %self.buffer_id, reason = %reason, "Source buffer error");
                Some(reason.clone())
            }
            SourceBufferEvent::SampleDropped {
                track_id,
                presentation_time,
            } => Some(format!("{track_id} @ {presentation_time}")),
            _ => None,
        };

        debug!(buffer_id = %self.buffer_id, event = event_type, "Recorded event");

        self.records.push(EventRecord {
            sequence: self.records.len() as u64,
            event_type,
            detail,
        });
        *self.counts.entry(event_type).or_insert(0) += 1;
    }

    /// Record whatever is queued on the stream without waiting
    pub fn drain(&mut self, events: &mut EventStream) -> usize {
        let drained = events.drain();
        for event in &drained {
            self.record(event);
        }
        drained.len()
    }

    /// Record every event until the stream ends
    pub async fn record_until_closed<S>(&mut self, mut events: S) -> usize
    where
        S: Stream<Item = SourceBufferEvent> + Unpin,
    {
        let mut recorded = 0;
        while let Some(event) = events.next().await {
            self.record(&event);
            recorded += 1;
        }
        recorded
    }

    /// Buffer the events came from
    pub fn buffer_id(&self) -> Uuid {
        self.buffer_id
    }

    /// Recorded events in arrival order
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Event type names in arrival order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.records.iter().map(|record| record.event_type).collect()
    }

    /// How many events of a type were recorded
    pub fn count(&self, event_type: &str) -> usize {
        self.counts.get(event_type).copied().unwrap_or(0)
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render as JSON
    pub fn to_json(&self) -> DiagnosticsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
