//! Bounded, append-only logs of timestamped records.
//!
//! Appending past capacity silently evicts the oldest entry. Snapshots borrow
//! the buffer and iterate in arrival order; the iterator is `Clone`, so a
//! caller can restart it without touching the buffer again.

use std::collections::VecDeque;

use crate::models::{DetectionEvent, TimestampMs};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

pub trait Timestamped {
    fn timestamp(&self) -> TimestampMs;
}

impl Timestamped for DetectionEvent {
    fn timestamp(&self) -> TimestampMs {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Timestamped> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Returns the evicted entry when the buffer was already full.
    pub fn append(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, entries: I) {
        for entry in entries {
            self.append(entry);
        }
    }

    /// Entries with `timestamp >= since` (all of them when `since` is `None`),
    /// oldest first.
    pub fn snapshot(
        &self,
        since: Option<TimestampMs>,
    ) -> impl Iterator<Item = &T> + Clone + '_ {
        self.entries
            .iter()
            .filter(move |entry| since.map_or(true, |cutoff| entry.timestamp() >= cutoff))
    }

    /// The `count` most recent entries, oldest first.
    pub fn latest(&self, count: usize) -> impl Iterator<Item = &T> + Clone + '_ {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip)
    }

    pub fn oldest_timestamp(&self) -> Option<TimestampMs> {
        self.entries.front().map(|entry| entry.timestamp())
    }

    pub fn newest_timestamp(&self) -> Option<TimestampMs> {
        self.entries.back().map(|entry| entry.timestamp())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Timestamped> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Modality, RawDetection};

    fn event(label: &str, timestamp: TimestampMs) -> DetectionEvent {
        let raw = RawDetection::new(label, 0.5, BoundingBox::default());
        DetectionEvent::from_raw(Modality::Object, &raw, timestamp)
    }

    #[test]
    fn holds_min_of_appends_and_capacity() {
        for appends in [0usize, 1, 4, 5, 6, 17] {
            let mut buffer = HistoryBuffer::new(5);
            for i in 0..appends {
                buffer.append(event("car", i as i64));
            }
            assert_eq!(buffer.len(), appends.min(5));

            let kept: Vec<i64> = buffer.snapshot(None).map(|e| e.timestamp).collect();
            let expected: Vec<i64> = (appends.saturating_sub(5)..appends).map(|i| i as i64).collect();
            assert_eq!(kept, expected, "appends={appends}");
        }
    }

    #[test]
    fn append_reports_evicted_entry() {
        let mut buffer = HistoryBuffer::new(2);
        assert!(buffer.append(event("a", 1)).is_none());
        assert!(buffer.append(event("b", 2)).is_none());
        let evicted = buffer.append(event("c", 3)).unwrap();
        assert_eq!(evicted.label, "a");
        assert_eq!(buffer.oldest_timestamp(), Some(2));
        assert_eq!(buffer.newest_timestamp(), Some(3));
    }

    #[test]
    fn snapshot_filters_by_since_and_restarts() {
        let mut buffer = HistoryBuffer::new(10);
        buffer.extend([event("a", 10), event("b", 20), event("c", 30)]);

        let recent = buffer.snapshot(Some(20));
        let first: Vec<_> = recent.clone().map(|e| e.label.as_str()).collect();
        let second: Vec<_> = recent.map(|e| e.label.as_str()).collect();
        assert_eq!(first, vec!["b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn latest_keeps_arrival_order() {
        let mut buffer = HistoryBuffer::new(10);
        buffer.extend((0..6).map(|i| event("x", i)));
        let tail: Vec<i64> = buffer.latest(3).map(|e| e.timestamp).collect();
        assert_eq!(tail, vec![3, 4, 5]);
        assert_eq!(buffer.latest(50).count(), 6);
    }

    #[test]
    fn huge_capacity_does_not_preallocate() {
        let mut buffer = HistoryBuffer::new(usize::MAX);
        buffer.extend((0..3).map(|i| event("x", i)));
        assert_eq!(buffer.capacity(), usize::MAX);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buffer = HistoryBuffer::new(0);
        buffer.append(event("a", 1));
        buffer.append(event("b", 2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.len(), 1);
    }
}
