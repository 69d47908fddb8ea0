//! In-memory record of the object keys this process has already scheduled.
//!
//! A key is marked seen the first time it shows up in a listing, before any processing
//! happens. A key that later fails is therefore not retried until the process restarts.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker pre-populated with keys that must never be scheduled
    pub fn with_seen<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            seen: keys.into_iter().map(|key| -> String { key.into() }).collect(),
        }
    }

    /// Return the keys not seen before, in input order, and mark all of them seen
    ///
    /// A key repeated within `keys` is returned once.
    pub fn filter_new<I, K>(&mut self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        keys.into_iter()
            .map(|key| -> String { key.into() })
            .filter(|key| self.seen.insert(key.clone()))
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_new_marks_keys_seen() {
        let mut tracker = DedupTracker::new();
        let fresh = tracker.filter_new(["01. Video/a.mp4", "01. Video/b.mp4"]);

        assert_eq!(fresh, vec!["01. Video/a.mp4", "01. Video/b.mp4"]);
        assert!(tracker.contains("01. Video/a.mp4"));
        assert!(tracker.contains("01. Video/b.mp4"));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_overlapping_batches_never_repeat_a_key() {
        let mut tracker = DedupTracker::new();
        let batches = [
            vec!["a.mp4", "b.mp4"],
            vec!["b.mp4", "c.mp4", "a.mp4"],
            vec!["c.mp4", "d.mp4", "d.mp4"],
            vec!["a.mp4", "b.mp4", "c.mp4", "d.mp4"],
        ];

        let mut returned = Vec::new();
        for batch in batches {
            returned.extend(tracker.filter_new(batch));
        }

        assert_eq!(returned, vec!["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
    }

    #[test]
    fn test_duplicates_within_one_batch_keep_first_position() {
        let mut tracker = DedupTracker::new();
        let fresh = tracker.filter_new(["x.mov", "y.mov", "x.mov"]);
        assert_eq!(fresh, vec!["x.mov", "y.mov"]);
    }

    #[test]
    fn test_seeded_keys_are_filtered_out() {
        let mut tracker = DedupTracker::with_seen(["old.mkv"]);
        let fresh = tracker.filter_new(["old.mkv", "new.mkv"]);

        assert_eq!(fresh, vec!["new.mkv"]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.filter_new(Vec::<String>::new()).is_empty());
        assert!(tracker.is_empty());
    }
}
