//! Memory-budget eviction
//!
//! Before new append data is accepted into a full buffer, the eviction
//! controller removes media in fixed-size windows. It first walks forward
//! from time zero up to one window before the playback position, then
//! walks backward from the end of the presentation down to one window past
//! it. The buffered range that contains the playback position is never
//! touched by the backward pass.

use crate::config::SourceBufferConfig;
use mediabuf_core::{MediaTime, TimeRanges};
use tracing::{debug, trace};

/// Trait for whatever owns the media being evicted
pub trait EvictionTarget {
    /// Bytes held by pending append data plus all stored frames
    fn extra_memory_cost(&self) -> usize;

    /// Current aggregate buffered ranges
    fn buffered_ranges(&self) -> TimeRanges;

    /// Remove the frames presented in `[start, end)`
    fn remove_coded_frames(&mut self, start: MediaTime, end: MediaTime);

    /// Current playback position
    fn current_time(&self) -> MediaTime;

    /// Presentation duration, `None` until known
    fn duration(&self) -> Option<MediaTime>;
}

/// Window-by-window eviction against a byte budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionController {
    maximum_buffer_size: usize,
    window: MediaTime,
}

impl EvictionController {
    /// Create a controller
    pub fn new(maximum_buffer_size: usize, window: MediaTime) -> Self {
        Self {
            maximum_buffer_size,
            window,
        }
    }

    /// Create a controller from a source buffer configuration
    pub fn from_config(config: &SourceBufferConfig) -> Self {
        Self::new(config.maximum_buffer_size, config.eviction_window)
    }

    /// Byte budget
    pub fn maximum_buffer_size(&self) -> usize {
        self.maximum_buffer_size
    }

    /// Eviction window length
    pub fn window(&self) -> MediaTime {
        self.window
    }

    /// Whether `incoming` more bytes fit in the budget
    pub fn fits<T: EvictionTarget + ?Sized>(&self, target: &T, incoming: usize) -> bool {
        target.extra_memory_cost().saturating_add(incoming) < self.maximum_buffer_size
    }

    /// Evict until `incoming` bytes fit
    ///
    /// Returns `true` if the buffer is still full afterwards.
    pub fn evict<T: EvictionTarget + ?Sized>(&self, target: &mut T, incoming: usize) -> bool {
        let current_time = target.current_time();
        debug!(
            cost = target.extra_memory_cost(),
            incoming,
            budget = self.maximum_buffer_size,
            current_time = %current_time,
            "Evicting coded frames"
        );

        // Forward pass: from zero up to one window before the playback position
        let maximum_range_end = current_time - self.window;
        let mut range_start = MediaTime::ZERO;
        while range_start < maximum_range_end {
            let range_end = (range_start + self.window).min(maximum_range_end);
            trace!(start = %range_start, end = %range_end, "Evicting leading window");
            target.remove_coded_frames(range_start, range_end);

            if self.fits(target, incoming) {
                debug!(cost = target.extra_memory_cost(), "Eviction freed enough space");
                return false;
            }
            range_start = range_start + self.window;
        }

        // Backward pass: from the end down to one window past the playback
        // position, skipping the range that contains it
        let buffered = target.buffered_ranges();
        let Some(current_range) = buffered.find(current_time) else {
            return true;
        };
        if current_range + 1 == buffered.len() {
            return true;
        }

        let minimum_range_start = current_time + self.window;
        let mut range_end = match target.duration() {
            Some(duration) if duration.is_finite() => duration,
            _ => match buffered.maximum_buffered_time() {
                Some(maximum) => maximum,
                None => return true,
            },
        };
        let mut range_start = range_end - self.window;

        while range_start > minimum_range_start {
            let mut window_start = range_start;
            if buffered.find(range_start) == Some(current_range) {
                match buffered.find(range_end) {
                    Some(end_range) if end_range == current_range => break,
                    Some(end_range) => match buffered.start(end_range) {
                        Some(start) => window_start = start,
                        None => break,
                    },
                    None => break,
                }
            }

            let window_start = window_start.max(minimum_range_start);
            trace!(start = %window_start, end = %range_end, "Evicting trailing window");
            target.remove_coded_frames(window_start, range_end);

            if self.fits(target, incoming) {
                debug!(cost = target.extra_memory_cost(), "Eviction freed enough space");
                return false;
            }

            range_start = range_start - self.window;
            range_end = range_end - self.window;
        }

        debug!(
            cost = target.extra_memory_cost(),
            incoming, "Buffer still full after eviction"
        );
        true
    }
}
