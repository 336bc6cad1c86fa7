//! Active-line lookup over a loaded track.

use crate::lyrics::types::{LyricEvent, LyricTrack};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Steps the forward scan may take before falling back to binary search.
const FORWARD_SCAN_LIMIT: usize = 8;
const NO_ANCHOR: usize = usize::MAX;

/// Wraps exactly one `LyricTrack` and answers "which line is active at T".
///
/// Lookups remember the last result and scan forward from it, which makes the
/// common case (monotonic ~100ms ticks) O(1). Anything else goes through a
/// binary search; either way the answer is the last event with `time <= T`.
#[derive(Debug)]
pub struct LyricIndex {
    track: Arc<LyricTrack>,
    /// Last lookup result, `NO_ANCHOR` when there is none to reuse.
    anchor: AtomicUsize,
}

impl Default for LyricIndex {
    fn default() -> Self {
        Self::new(LyricTrack::default())
    }
}

impl LyricIndex {
    pub fn new(track: LyricTrack) -> Self {
        Self {
            track: Arc::new(track),
            anchor: AtomicUsize::new(NO_ANCHOR),
        }
    }

    /// Swap in a new track. Drops the cached anchor.
    pub fn load(&mut self, track: LyricTrack) {
        self.track = Arc::new(track);
        self.anchor.store(NO_ANCHOR, Ordering::Relaxed);
    }

    pub fn invalidate_anchor(&self) {
        self.anchor.store(NO_ANCHOR, Ordering::Relaxed);
    }

    pub fn track(&self) -> &Arc<LyricTrack> {
        &self.track
    }

    pub fn events(&self) -> &[LyricEvent] {
        self.track.events()
    }

    pub fn get(&self, index: usize) -> Option<&LyricEvent> {
        self.track.events().get(index)
    }

    /// Index of the last event whose time is `<= time`, or `None` before the
    /// first event (and for a NaN query).
    pub fn lookup(&self, time: f64) -> Option<usize> {
        let events = self.track.events();
        if events.is_empty() || time.is_nan() {
            return None;
        }
        let found = self
            .scan_from_anchor(events, time)
            .unwrap_or_else(|| bisect(events, time));
        self.anchor.store(found.unwrap_or(NO_ANCHOR), Ordering::Relaxed);
        found
    }

    /// Walk forward from the previous result. `None` means "no answer from
    /// the fast path", not "no line".
    fn scan_from_anchor(&self, events: &[LyricEvent], time: f64) -> Option<Option<usize>> {
        let start = self.anchor.load(Ordering::Relaxed);
        if events.get(start)?.time() > time {
            return None;
        }
        let mut idx = start;
        for _ in 0..FORWARD_SCAN_LIMIT {
            match events.get(idx + 1) {
                Some(next) if next.time() <= time => idx += 1,
                _ => return Some(Some(idx)),
            }
        }
        None
    }
}

fn bisect(events: &[LyricEvent], time: f64) -> Option<usize> {
    events.partition_point(|e| e.time() <= time).checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(times: &[f64]) -> LyricIndex {
        let events = times
            .iter()
            .enumerate()
            .map(|(i, t)| LyricEvent::new(*t, format!("line {}", i)).unwrap())
            .collect();
        LyricIndex::new(LyricTrack::timed(events))
    }

    #[test]
    fn test_lookup_contract() {
        let idx = index_of(&[1.0, 2.0, 4.0]);
        assert_eq!(idx.lookup(0.5), None);
        assert_eq!(idx.lookup(1.0), Some(0));
        assert_eq!(idx.lookup(1.99), Some(0));
        assert_eq!(idx.lookup(2.0), Some(1));
        assert_eq!(idx.lookup(3.0), Some(1));
        assert_eq!(idx.lookup(4.0), Some(2));
        assert_eq!(idx.lookup(1000.0), Some(2));
    }

    #[test]
    fn test_lookup_is_idempotent_and_order_independent() {
        let idx = index_of(&[0.0, 3.0, 6.0, 9.0]);
        for q in [7.0, 0.5, 7.0, 3.0, 3.0, -1.0, 100.0, 6.0] {
            let first = idx.lookup(q);
            assert_eq!(first, idx.lookup(q));
            let fresh = index_of(&[0.0, 3.0, 6.0, 9.0]);
            assert_eq!(first, fresh.lookup(q), "query {}", q);
        }
    }

    #[test]
    fn test_monotonic_queries_never_decrease() {
        let times: Vec<f64> = (0..200).map(|i| i as f64 * 0.7).collect();
        let idx = index_of(&times);
        let mut last: Option<usize> = None;
        let mut q = -0.5;
        while q < 150.0 {
            let got = idx.lookup(q);
            assert!(got >= last, "{:?} < {:?} at {}", got, last, q);
            assert_eq!(got, bisect(idx.events(), q));
            last = got;
            q += 0.1;
        }
    }

    #[test]
    fn test_large_forward_jump_falls_back_to_bisect() {
        let times: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let idx = index_of(&times);
        assert_eq!(idx.lookup(1.5), Some(1));
        assert_eq!(idx.lookup(80.2), Some(80));
        assert_eq!(idx.lookup(10.0), Some(10));
    }

    #[test]
    fn test_duplicate_times_pick_last() {
        let idx = index_of(&[1.0, 1.0, 2.0]);
        assert_eq!(idx.lookup(1.0), Some(1));
    }

    #[test]
    fn test_load_resets_anchor() {
        let mut idx = index_of(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(idx.lookup(3.5), Some(3));
        idx.load(LyricTrack::timed(vec![LyricEvent::new(10.0, "only").unwrap()]));
        assert_eq!(idx.lookup(3.5), None);
        assert_eq!(idx.lookup(10.0), Some(0));
    }

    #[test]
    fn test_empty_track_and_nan() {
        let idx = LyricIndex::default();
        assert_eq!(idx.lookup(5.0), None);
        let idx = index_of(&[0.0]);
        assert_eq!(idx.lookup(f64::NAN), None);
    }
}
