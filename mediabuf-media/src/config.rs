//! Source buffer configuration
//!
//! Budgets and tolerances used by the eviction controller and the playback
//! readiness checks.

use mediabuf_core::MediaTime;
use serde::{Deserialize, Serialize};

/// Tunables for one source buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBufferConfig {
    /// Memory budget in bytes for buffered samples plus pending append data
    pub maximum_buffer_size: usize,
    /// Size of each eviction window, and the distance around the current
    /// playback position that eviction never touches
    pub eviction_window: MediaTime,
    /// How far the current time may be from buffered data and still count as
    /// buffered (one 24fps frame by default)
    pub current_time_fudge: MediaTime,
    /// Frames further than this past the last enqueued decode end are held back
    pub max_enqueue_gap: MediaTime,
    /// Weight of the newest sample in the buffering-rate moving average
    pub buffering_rate_coefficient: f64,
}

impl SourceBufferConfig {
    /// Desktop defaults: 150 MiB budget, 30 second windows
    pub fn desktop() -> Self {
        Self {
            maximum_buffer_size: 150 * 1024 * 1024,
            eviction_window: MediaTime::from_secs(30),
            current_time_fudge: MediaTime::new(250, 6000),
            max_enqueue_gap: MediaTime::from_secs(1),
            buffering_rate_coefficient: 0.1,
        }
    }

    /// Memory-constrained devices: 30 MiB budget, 10 second windows
    pub fn constrained() -> Self {
        Self {
            maximum_buffer_size: 30 * 1024 * 1024,
            eviction_window: MediaTime::from_secs(10),
            ..Self::desktop()
        }
    }

    /// No memory budget (for testing)
    pub fn unlimited() -> Self {
        Self {
            maximum_buffer_size: usize::MAX,
            ..Self::desktop()
        }
    }

    /// Override the memory budget
    pub fn with_maximum_buffer_size(mut self, bytes: usize) -> Self {
        self.maximum_buffer_size = bytes;
        self
    }
}

impl Default for SourceBufferConfig {
    fn default() -> Self {
        // Default to desktop configuration
        Self::desktop()
    }
}
