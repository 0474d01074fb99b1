//! Sorted sets of disjoint time intervals
//!
//! [`TimeRanges`] is the representation of "what is buffered" used by track
//! buffers, the removal algorithm and the controller's aggregate view.

use crate::time::MediaTime;
use serde::Serialize;
use std::fmt;

/// A half-open interval `[start, end)` on the media timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: MediaTime,
    /// Exclusive end
    pub end: MediaTime,
}

impl TimeRange {
    /// Create a new range
    pub fn new(start: MediaTime, end: MediaTime) -> Self {
        Self { start, end }
    }

    /// Length of the range
    pub fn duration(&self) -> MediaTime {
        self.end - self.start
    }

    /// Whether `time` lies in `[start, end)`
    pub fn contains(&self, time: MediaTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Sorted, disjoint, non-adjacent sequence of half-open time ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single range
    pub fn from_range(start: MediaTime, end: MediaTime) -> Self {
        let mut ranges = Self::new();
        ranges.add(start, end);
        ranges
    }

    /// Add `[start, end)`, merging with every overlapping or touching range
    ///
    /// Empty or inverted input is ignored.
    pub fn add(&mut self, start: MediaTime, end: MediaTime) {
        if start >= end {
            return;
        }

        let first = self.ranges.partition_point(|range| range.end < start);
        let mut merged = TimeRange::new(start, end);
        let mut last = first;
        while last < self.ranges.len() && self.ranges[last].start <= end {
            merged.start = merged.start.min(self.ranges[last].start);
            merged.end = merged.end.max(self.ranges[last].end);
            last += 1;
        }

        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// Replace `self` with the union of both sets
    pub fn union_with(&mut self, other: &TimeRanges) {
        for range in &other.ranges {
            self.add(range.start, range.end);
        }
    }

    /// Replace `self` with the intersection of both sets
    pub fn intersect_with(&mut self, other: &TimeRanges) {
        let mut result = Vec::with_capacity(self.ranges.len().min(other.ranges.len()));
        let (mut i, mut j) = (0, 0);

        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                result.push(TimeRange::new(start, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        self.ranges = result;
    }

    /// Replace `self` with its complement over `[0, +inf)`
    pub fn invert(&mut self) {
        self.invert_within(MediaTime::ZERO, MediaTime::POSITIVE_INFINITY);
    }

    /// Replace `self` with its complement over `[start, end)`
    pub fn invert_within(&mut self, start: MediaTime, end: MediaTime) {
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut cursor = start;

        for range in &self.ranges {
            if range.start >= end {
                break;
            }
            if range.start > cursor {
                result.push(TimeRange::new(cursor, range.start));
            }
            cursor = cursor.max(range.end);
        }
        if cursor < end {
            result.push(TimeRange::new(cursor, end));
        }

        self.ranges = result;
    }

    /// Remove every point covered by `other`
    pub fn subtract(&mut self, other: &TimeRanges) {
        if other.is_empty() || self.is_empty() {
            return;
        }
        let mut remaining = other.clone();
        remaining.invert_within(MediaTime::NEGATIVE_INFINITY, MediaTime::POSITIVE_INFINITY);
        self.intersect_with(&remaining);
    }

    /// Whether the two sets share any point
    pub fn intersects(&self, other: &TimeRanges) -> bool {
        let mut overlap = self.clone();
        overlap.intersect_with(other);
        !overlap.is_empty()
    }

    /// `time` itself if it is buffered, otherwise the closest range endpoint
    pub fn nearest(&self, time: MediaTime) -> Option<MediaTime> {
        let mut best: Option<(MediaTime, MediaTime)> = None;

        for range in &self.ranges {
            if range.start <= time && time <= range.end {
                return Some(time);
            }
            for candidate in [range.start, range.end] {
                let distance = (candidate - time).abs();
                match best {
                    Some((best_distance, _)) if best_distance <= distance => {}
                    _ => best = Some((distance, candidate)),
                }
            }
        }

        best.map(|(_, candidate)| candidate)
    }

    /// Index of the range with `start <= time <= end`
    pub fn find(&self, time: MediaTime) -> Option<usize> {
        let index = self.ranges.partition_point(|range| range.end < time);
        match self.ranges.get(index) {
            Some(range) if range.start <= time => Some(index),
            _ => None,
        }
    }

    /// Whether `time` lies inside one of the half-open ranges
    pub fn contains(&self, time: MediaTime) -> bool {
        self.find(time)
            .map(|index| self.ranges[index].contains(time))
            .unwrap_or(false)
    }

    /// Sum of all range lengths
    pub fn total_duration(&self) -> MediaTime {
        self.ranges
            .iter()
            .fold(MediaTime::ZERO, |total, range| total + range.duration())
    }

    /// End of the last range
    pub fn maximum_buffered_time(&self) -> Option<MediaTime> {
        self.ranges.last().map(|range| range.end)
    }

    /// Start of the `index`-th range
    pub fn start(&self, index: usize) -> Option<MediaTime> {
        self.ranges.get(index).map(|range| range.start)
    }

    /// End of the `index`-th range
    pub fn end(&self, index: usize) -> Option<MediaTime> {
        self.ranges.get(index).map(|range| range.end)
    }

    /// Number of ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Remove every range
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Ranges in ascending order
    pub fn iter(&self) -> std::slice::Iter<'_, TimeRange> {
        self.ranges.iter()
    }

    /// Mutable access to the last range
    pub fn last_mut(&mut self) -> Option<&mut TimeRange> {
        self.ranges.last_mut()
    }

    /// Ranges as `(start, end)` pairs in seconds
    pub fn to_secs(&self) -> Vec<(f64, f64)> {
        self.ranges
            .iter()
            .map(|range| (range.start.as_secs_f64(), range.end.as_secs_f64()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a TimeRanges {
    type Item = &'a TimeRange;
    type IntoIter = std::slice::Iter<'a, TimeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl FromIterator<(MediaTime, MediaTime)> for TimeRanges {
    fn from_iter<I: IntoIterator<Item = (MediaTime, MediaTime)>>(iter: I) -> Self {
        let mut ranges = TimeRanges::new();
        for (start, end) in iter {
            ranges.add(start, end);
        }
        ranges
    }
}

impl fmt::Display for TimeRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, range) in self.ranges.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{}, {})", range.start, range.end)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: i64) -> MediaTime {
        MediaTime::from_secs(value)
    }

    #[test]
    fn test_add_merges_touching_ranges() {
        let mut ranges = TimeRanges::new();
        ranges.add(secs(0), secs(1));
        ranges.add(secs(2), secs(3));
        ranges.add(secs(1), secs(2));

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges.start(0), Some(secs(0)));
        assert_eq!(ranges.end(0), Some(secs(3)));
    }

    #[test]
    fn test_add_ignores_empty_input() {
        let mut ranges = TimeRanges::new();
        ranges.add(secs(3), secs(3));
        ranges.add(secs(4), secs(1));
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_invert_over_unbounded_domain() {
        let mut ranges = TimeRanges::from_iter([(secs(1), secs(2)), (secs(4), secs(5))]);
        ranges.invert();

        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges.start(0), Some(secs(0)));
        assert_eq!(ranges.end(0), Some(secs(1)));
        assert_eq!(ranges.end(2), Some(MediaTime::POSITIVE_INFINITY));
    }

    #[test]
    fn test_empty_set_queries() {
        let ranges = TimeRanges::new();
        assert_eq!(ranges.nearest(secs(3)), None);
        assert_eq!(ranges.find(secs(3)), None);
        assert_eq!(ranges.maximum_buffered_time(), None);
        assert_eq!(ranges.total_duration(), MediaTime::ZERO);
    }

    #[test]
    fn test_find_includes_range_end() {
        let ranges = TimeRanges::from_range(secs(1), secs(2));
        assert_eq!(ranges.find(secs(2)), Some(0));
        assert!(!ranges.contains(secs(2)));
    }
}
