//! Dual-ordered sample index
//!
//! A [`SampleMap`] holds the coded frames of one track in two synchronized
//! orderings:
//!
//! - **decode order**, keyed by [`DecodeKey`], used for dependency-safe
//!   removal and for feeding the decoder
//! - **presentation order**, keyed by [`PresentationKey`], used for time range
//!   queries and overlap detection
//!
//! Both orderings share the same `Arc<CodedFrame>`; payloads are never copied.

use crate::sample::{CodedFrame, DecodeKey, PresentationKey};
use crate::time::MediaTime;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::ops::RangeBounds;
use std::sync::Arc;
use tracing::{debug, trace};

/// Frames keyed by decode order, as returned by removals
pub type DecodeOrderMap = BTreeMap<DecodeKey, Arc<CodedFrame>>;

/// Per-track index of coded frames in decode and presentation order
#[derive(Debug, Default, Clone)]
pub struct SampleMap {
    decode_order: DecodeOrderMap,
    presentation_order: BTreeMap<PresentationKey, Arc<CodedFrame>>,
    size_in_bytes: usize,
}

impl SampleMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a frame into both orderings
    ///
    /// A frame with the same decode key replaces the previous one.
    pub fn add_sample(&mut self, frame: Arc<CodedFrame>) {
        trace!(
            track_id = %frame.track_id,
            pts = %frame.presentation_time,
            dts = %frame.decode_time,
            "Indexing sample"
        );

        if let Some(previous) = self.decode_order.insert(frame.decode_key(), frame.clone()) {
            self.presentation_order.remove(&previous.presentation_key());
            self.size_in_bytes -= previous.size_in_bytes();
        }
        self.size_in_bytes += frame.size_in_bytes();
        self.presentation_order.insert(frame.presentation_key(), frame);
    }

    /// Remove a single frame from both orderings
    pub fn remove_sample(&mut self, frame: &CodedFrame) -> Option<Arc<CodedFrame>> {
        let removed = self.decode_order.remove(&frame.decode_key())?;
        self.presentation_order.remove(&removed.presentation_key());
        self.size_in_bytes -= removed.size_in_bytes();
        Some(removed)
    }

    /// Remove every frame whose decode key falls in `range`
    ///
    /// Returns the removed frames in decode order.
    pub fn remove_decode_range<R: RangeBounds<DecodeKey>>(&mut self, range: R) -> DecodeOrderMap {
        let keys: Vec<DecodeKey> = self.decode_order.range(range).map(|(key, _)| *key).collect();

        let mut removed = DecodeOrderMap::new();
        for key in keys {
            if let Some(frame) = self.decode_order.remove(&key) {
                self.presentation_order.remove(&frame.presentation_key());
                self.size_in_bytes -= frame.size_in_bytes();
                removed.insert(key, frame);
            }
        }

        if !removed.is_empty() {
            debug!(
                removed = removed.len(),
                remaining = self.decode_order.len(),
                "Removed decode range"
            );
        }
        removed
    }

    /// Frame with exactly this decode key
    pub fn find_sample_with_decode_key(&self, key: &DecodeKey) -> Option<Arc<CodedFrame>> {
        self.decode_order.get(key).cloned()
    }

    /// Frame whose `[pts, pts + duration)` contains `time`
    pub fn find_sample_containing_presentation_time(
        &self,
        time: MediaTime,
    ) -> Option<Arc<CodedFrame>> {
        let upper = PresentationKey {
            presentation_time: time,
            decode_time: MediaTime::POSITIVE_INFINITY,
        };
        self.presentation_order
            .range(..=upper)
            .next_back()
            .map(|(_, frame)| frame)
            .filter(|frame| time < frame.presentation_end_time())
            .cloned()
    }

    /// First frame in presentation order with `pts >= time`
    pub fn find_sample_on_or_after_presentation_time(
        &self,
        time: MediaTime,
    ) -> Option<Arc<CodedFrame>> {
        self.presentation_order
            .range(Self::lower_presentation_key(time)..)
            .next()
            .map(|(_, frame)| frame.clone())
    }

    /// First sync frame in decode order at or after the first frame with
    /// `pts >= time`
    ///
    /// Returns `None` when no such frame exists or when its presentation time
    /// is later than `time + threshold`.
    pub fn find_sync_sample_after_presentation_time(
        &self,
        time: MediaTime,
        threshold: MediaTime,
    ) -> Option<Arc<CodedFrame>> {
        let start = self.find_sample_on_or_after_presentation_time(time)?;
        let cutoff = time + threshold;

        self.decode_order
            .range(start.decode_key()..)
            .map(|(_, frame)| frame)
            .find(|frame| frame.is_sync)
            .filter(|frame| frame.presentation_time <= cutoff)
            .cloned()
    }

    /// Last sync frame in decode order at or before the last frame with
    /// `pts <= time`
    ///
    /// Returns `None` when no such frame exists or when its presentation time
    /// is earlier than `time - threshold`.
    pub fn find_sync_sample_prior_to_presentation_time(
        &self,
        time: MediaTime,
        threshold: MediaTime,
    ) -> Option<Arc<CodedFrame>> {
        let upper = PresentationKey {
            presentation_time: time,
            decode_time: MediaTime::POSITIVE_INFINITY,
        };
        let (_, start) = self.presentation_order.range(..=upper).next_back()?;
        let cutoff = time - threshold;

        self.decode_order
            .range(..=start.decode_key())
            .rev()
            .map(|(_, frame)| frame)
            .find(|frame| frame.is_sync)
            .filter(|frame| frame.presentation_time >= cutoff)
            .cloned()
    }

    /// First sync frame strictly after `key` in decode order
    pub fn find_sync_sample_after_decode_key(&self, key: &DecodeKey) -> Option<Arc<CodedFrame>> {
        self.decode_order
            .range((Excluded(*key), Unbounded))
            .map(|(_, frame)| frame)
            .find(|frame| frame.is_sync)
            .cloned()
    }

    /// Last sync frame at or before `key` in decode order
    pub fn find_sync_sample_prior_to_decode_key(&self, key: &DecodeKey) -> Option<Arc<CodedFrame>> {
        self.decode_order
            .range(..=*key)
            .rev()
            .map(|(_, frame)| frame)
            .find(|frame| frame.is_sync)
            .cloned()
    }

    /// Frames with `start <= pts < end`, in presentation order
    pub fn find_samples_between_presentation_times(
        &self,
        start: MediaTime,
        end: MediaTime,
    ) -> Vec<Arc<CodedFrame>> {
        if start >= end {
            return Vec::new();
        }
        self.presentation_order
            .range(Self::lower_presentation_key(start)..Self::lower_presentation_key(end))
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Frames with `start < pts <= end`, in presentation order
    pub fn find_samples_within_presentation_range(
        &self,
        start: MediaTime,
        end: MediaTime,
    ) -> Vec<Arc<CodedFrame>> {
        if start >= end {
            return Vec::new();
        }
        self.presentation_order
            .range((
                Excluded(Self::upper_presentation_key(start)),
                Included(Self::upper_presentation_key(end)),
            ))
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Same result as [`Self::find_samples_within_presentation_range`], found
    /// by walking backwards from the last frame
    ///
    /// Cheaper when the range sits near the end of the buffer.
    pub fn find_samples_within_presentation_range_from_end(
        &self,
        start: MediaTime,
        end: MediaTime,
    ) -> Vec<Arc<CodedFrame>> {
        if start >= end {
            return Vec::new();
        }
        let mut frames: Vec<Arc<CodedFrame>> = self
            .presentation_order
            .iter()
            .rev()
            .map(|(_, frame)| frame)
            .skip_while(|frame| frame.presentation_time > end)
            .take_while(|frame| frame.presentation_time > start)
            .cloned()
            .collect();
        frames.reverse();
        frames
    }

    /// Frames in decode order
    pub fn decode_order(&self) -> impl DoubleEndedIterator<Item = &Arc<CodedFrame>> + '_ {
        self.decode_order.values()
    }

    /// Frames in decode order whose key falls in `range`
    pub fn decode_order_range<R: RangeBounds<DecodeKey>>(
        &self,
        range: R,
    ) -> impl DoubleEndedIterator<Item = &Arc<CodedFrame>> + '_ {
        self.decode_order.range(range).map(|(_, frame)| frame)
    }

    /// Frames in presentation order
    pub fn presentation_order(&self) -> impl DoubleEndedIterator<Item = &Arc<CodedFrame>> + '_ {
        self.presentation_order.values()
    }

    /// Last frame in presentation order
    pub fn last_in_presentation_order(&self) -> Option<&Arc<CodedFrame>> {
        self.presentation_order.values().next_back()
    }

    /// Sum of payload sizes
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.decode_order.len()
    }

    /// Whether the map holds no frames
    pub fn is_empty(&self) -> bool {
        self.decode_order.is_empty()
    }

    /// Drop every frame
    pub fn clear(&mut self) {
        self.decode_order.clear();
        self.presentation_order.clear();
        self.size_in_bytes = 0;
    }

    fn lower_presentation_key(time: MediaTime) -> PresentationKey {
        PresentationKey {
            presentation_time: time,
            decode_time: MediaTime::NEGATIVE_INFINITY,
        }
    }

    fn upper_presentation_key(time: MediaTime) -> PresentationKey {
        PresentationKey {
            presentation_time: time,
            decode_time: MediaTime::POSITIVE_INFINITY,
        }
    }
}
