//! Source buffer notifications

use futures::Stream;
use mediabuf_core::{MediaTime, TrackId};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Notifications emitted by a source buffer
#[derive(Debug, Clone, PartialEq)]
pub enum SourceBufferEvent {
    /// An append or remove started
    UpdateStart,
    /// An append or remove completed successfully
    Update,
    /// An append or remove finished, successfully or not
    UpdateEnd,
    /// An in-flight append or remove was aborted
    Abort,
    /// An append failed
    Error {
        /// Why the append failed
        reason: String,
    },
    /// A coded frame was dropped while waiting for a random access point
    SampleDropped {
        /// Track of the dropped frame
        track_id: TrackId,
        /// Presentation time of the dropped frame
        presentation_time: MediaTime,
    },
}

impl SourceBufferEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SourceBufferEvent::UpdateStart => "updatestart",
            SourceBufferEvent::Update => "update",
            SourceBufferEvent::UpdateEnd => "updateend",
            SourceBufferEvent::Abort => "abort",
            SourceBufferEvent::Error { .. } => "error",
            SourceBufferEvent::SampleDropped { .. } => "sampledropped",
        }
    }

    /// Check if this event is part of the update lifecycle
    pub fn is_update_event(&self) -> bool {
        matches!(
            self,
            SourceBufferEvent::UpdateStart
                | SourceBufferEvent::Update
                | SourceBufferEvent::UpdateEnd
                | SourceBufferEvent::Abort
        )
    }
}

/// Stream of source buffer events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<SourceBufferEvent>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<SourceBufferEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<SourceBufferEvent> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<SourceBufferEvent>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Drain every event that is already queued
    pub fn drain(&mut self) -> Vec<SourceBufferEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Check if the event stream is closed
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl Stream for EventStream {
    type Item = SourceBufferEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
