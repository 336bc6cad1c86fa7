use std::time::Instant;

/// Drifts at or below this many seconds are left alone.
pub const DRIFT_TOLERANCE: f64 = 0.2;
/// Fraction of an out-of-tolerance drift applied per correction.
pub const DRIFT_GAIN: f64 = 0.3;

/// Secondary, free-running playback clock reconciled against the
/// authoritative transport position.
///
/// The estimate is `anchor_position + elapsed + correction`, floored at zero.
/// `elapsed` only accrues while an anchor instant is set (running).
#[derive(Debug, PartialEq, Default)]
pub struct PlaybackClock {
    /// Anchor position in seconds, with the correction term already removed.
    anchor_position: f64,
    /// Monotonic instant corresponding to `anchor_position`; `None` while paused.
    anchor_instant: Option<Instant>,
    correction: f64,
    /// Optional clamp for `correction` (typically the track duration).
    correction_bound: Option<f64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-anchor so the estimate equals `reference` at `now`. Resets the
    /// correction term.
    pub fn start_at(&mut self, reference: f64, now: Instant) {
        self.correction = 0.0;
        self.anchor_position = sanitize_position(reference);
        self.anchor_instant = Some(now);
    }

    /// Freeze the estimate at `reference`, keeping the correction term.
    pub fn pause(&mut self, reference: f64) {
        self.anchor_position = sanitize_position(reference) - self.correction;
        self.anchor_instant = None;
    }

    /// Like `start_at`, but the correction term survives.
    pub fn resume_at(&mut self, reference: f64, now: Instant) {
        self.anchor_position = sanitize_position(reference) - self.correction;
        self.anchor_instant = Some(now);
    }

    /// Current estimate as of `now`.
    pub fn estimate_at(&self, now: Instant) -> f64 {
        let elapsed = self
            .anchor_instant
            .map(|inst| now.saturating_duration_since(inst).as_secs_f64())
            .unwrap_or(0.0);
        let val = self.anchor_position + elapsed + self.correction;
        if val.is_finite() { val.max(0.0) } else { 0.0 }
    }

    /// Proportional drift correction. Returns the drift that was applied, or
    /// `None` when it was within tolerance (or not a number).
    pub fn correct_drift(&mut self, authoritative: f64, estimated: f64) -> Option<f64> {
        let drift = authoritative - estimated;
        if !drift.is_finite() || drift.abs() <= DRIFT_TOLERANCE {
            return None;
        }
        self.correction += drift * DRIFT_GAIN;
        if let Some(bound) = self.correction_bound {
            self.correction = self.correction.clamp(-bound, bound);
        }
        Some(drift)
    }

    /// Drop the correction term without moving the estimate at `now`.
    pub fn clear_correction(&mut self, now: Instant) {
        let position = self.estimate_at(now);
        self.correction = 0.0;
        self.anchor_position = position;
        if self.anchor_instant.is_some() {
            self.anchor_instant = Some(now);
        }
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    /// Bound `|correction|`. Non-positive or non-finite bounds are ignored.
    pub fn set_correction_bound(&mut self, bound: Option<f64>) {
        self.correction_bound = bound.filter(|b| b.is_finite() && *b > 0.0);
        if let Some(bound) = self.correction_bound {
            self.correction = self.correction.clamp(-bound, bound);
        }
    }
}

pub fn sanitize_position(p: f64) -> f64 {
    if p.is_nan() || !p.is_finite() {
        0.0
    } else if p < 0.0 {
        // Negative positions are not meaningful; clamp to zero.
        0.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_start_sets_epoch() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(12.0, t0);
        assert!(close(clock.estimate_at(t0), 12.0));
        assert!(close(clock.estimate_at(t0 + Duration::from_millis(1500)), 13.5));
    }

    #[test]
    fn test_pause_freezes_position() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(0.0, t0);
        clock.pause(4.0);
        assert!(close(clock.estimate_at(t0 + Duration::from_secs(30)), 4.0));
    }

    #[test]
    fn test_drift_within_tolerance_is_ignored() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.correct_drift(10.2, 10.0), None);
        assert_eq!(clock.correct_drift(9.8, 10.0), None);
        assert_eq!(clock.correction(), 0.0);
    }

    #[test]
    fn test_drift_correction_is_proportional() {
        let mut clock = PlaybackClock::new();
        assert!(clock.correct_drift(11.0, 10.0).is_some());
        assert!(close(clock.correction(), 0.3));
        clock.correct_drift(10.0, 11.0);
        assert!(close(clock.correction(), 0.0));
        clock.correct_drift(5.0, 5.5);
        assert!(close(clock.correction(), -0.15));
    }

    #[test]
    fn test_repeated_correction_converges() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(0.0, t0);
        let authoritative = 2.0;
        let mut last_gap = f64::MAX;
        for _ in 0..20 {
            let est = clock.estimate_at(t0);
            clock.correct_drift(authoritative, est);
            let gap = (authoritative - clock.estimate_at(t0)).abs();
            assert!(gap <= last_gap);
            last_gap = gap;
        }
        assert!(last_gap <= DRIFT_TOLERANCE);
    }

    #[test]
    fn test_correction_bound_clamps() {
        let mut clock = PlaybackClock::new();
        clock.set_correction_bound(Some(1.0));
        clock.correct_drift(100.0, 0.0);
        assert!(close(clock.correction(), 1.0));
        clock.set_correction_bound(Some(-3.0));
        clock.correct_drift(100.0, 0.0);
        assert!(close(clock.correction(), 31.0));
    }

    #[test]
    fn test_estimate_floors_at_zero() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(0.1, t0);
        clock.correct_drift(0.0, 2.0);
        assert_eq!(clock.estimate_at(t0), 0.0);
    }

    #[test]
    fn test_resume_keeps_correction() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(0.0, t0);
        clock.correct_drift(1.0, 0.0);
        clock.pause(5.0);
        assert!(close(clock.estimate_at(t0), 5.0));
        clock.resume_at(5.0, t0);
        assert!(close(clock.correction(), 0.3));
        assert!(close(clock.estimate_at(t0 + Duration::from_secs(1)), 6.0));
        clock.start_at(5.0, t0);
        assert_eq!(clock.correction(), 0.0);
    }

    #[test]
    fn test_clear_correction_keeps_estimate() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.start_at(10.0, t0);
        clock.correct_drift(11.0, 10.0);
        let t1 = t0 + Duration::from_secs(2);
        let before = clock.estimate_at(t1);
        clock.clear_correction(t1);
        assert_eq!(clock.correction(), 0.0);
        assert!(close(clock.estimate_at(t1), before));
        assert!(close(clock.estimate_at(t1 + Duration::from_secs(1)), before + 1.0));

        clock.correct_drift(20.0, 19.0);
        clock.pause(15.0);
        clock.clear_correction(t1);
        assert_eq!(clock.correction(), 0.0);
        assert!(close(clock.estimate_at(t1 + Duration::from_secs(5)), 15.0));
    }

    #[test]
    fn test_sanitize_position() {
        assert_eq!(sanitize_position(f64::NAN), 0.0);
        assert_eq!(sanitize_position(f64::INFINITY), 0.0);
        assert_eq!(sanitize_position(-3.0), 0.0);
        assert_eq!(sanitize_position(2.5), 2.5);
    }
}
