//! The polling step: sample, correct drift, look up, notify.

use crate::clock::{PlaybackClock, sanitize_position};
use crate::lyrics::LyricIndex;
use crate::state::{LoopPhase, SyncEvent, SyncState, progress_fraction};
use crate::transport::known_duration;
use std::time::Instant;

/// A disagreement this large is a jump on the surface, not drift.
pub const SEEK_THRESHOLD: f64 = 2.0;

/// One reading of the authoritative transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub duration: Option<f64>,
}

/// Drives `SyncState` from transport samples. Holds no reference to the
/// transport or the index; both are passed in per call.
#[derive(Debug, Default)]
pub struct SyncLoop {
    phase: LoopPhase,
    state: SyncState,
    clock: PlaybackClock,
    /// Added to the estimate before lookup; positive shows lyrics earlier.
    offset: f64,
    /// Line that was showing when a seek happened, reported as `old` by the
    /// first tick after it.
    seek_origin: Option<Option<usize>>,
}

impl SyncLoop {
    pub fn new(offset: f64) -> Self {
        Self {
            offset: if offset.is_finite() { offset } else { 0.0 },
            ..Self::default()
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    #[cfg(test)]
    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Idle → Running (fresh epoch) or Paused → Running (keeps correction).
    /// Returns whether the phase changed.
    pub fn start_at(&mut self, reference: f64, now: Instant) -> bool {
        match self.phase {
            LoopPhase::Running => false,
            LoopPhase::Idle => {
                self.clock.start_at(reference, now);
                self.phase = LoopPhase::Running;
                true
            }
            LoopPhase::Paused => {
                self.clock.resume_at(reference, now);
                self.phase = LoopPhase::Running;
                true
            }
        }
    }

    /// Running → Paused. Index and correction are preserved.
    pub fn pause(&mut self, reference: f64) -> bool {
        if self.phase != LoopPhase::Running {
            return false;
        }
        self.clock.pause(reference);
        self.phase = LoopPhase::Paused;
        true
    }

    /// Any → Idle with a fresh state.
    pub fn stop(&mut self) -> bool {
        let changed = self.phase != LoopPhase::Idle;
        self.phase = LoopPhase::Idle;
        self.state.reset();
        self.clock = PlaybackClock::new();
        self.seek_origin = None;
        changed
    }

    /// New track attached: state and drift correction start over, phase is
    /// kept.
    pub fn reset_for_track(&mut self, now: Instant) {
        self.state.reset();
        self.clock.clear_correction(now);
        self.seek_origin = None;
    }

    /// Re-anchor at `target` and force the next tick to look up from scratch.
    pub fn seek_at(&mut self, index: &LyricIndex, target: f64, now: Instant) {
        let target = sanitize_position(target);
        if self.seek_origin.is_none() {
            self.seek_origin = Some(self.state.current_index);
        }
        self.state.reset();
        index.invalidate_anchor();
        self.clock.start_at(target, now);
        if self.phase != LoopPhase::Running {
            self.clock.pause(target);
        }
    }

    /// One polling step. Does nothing unless Running.
    pub fn advance(&mut self, index: &LyricIndex, sample: Sample, now: Instant) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if self.phase != LoopPhase::Running {
            return events;
        }

        let authoritative = sanitize_position(sample.time);
        let estimate = self.clock.estimate_at(now);
        if (authoritative - estimate).abs() > SEEK_THRESHOLD {
            tracing::debug!(authoritative, estimate, "position jump, re-anchoring");
            self.seek_at(index, authoritative, now);
        } else {
            self.clock.correct_drift(authoritative, estimate);
        }
        self.clock.set_correction_bound(known_duration(sample.duration));

        let position = self.clock.estimate_at(now);
        self.state.last_sampled_time = authoritative;
        self.state.drift_correction = self.clock.correction();

        // Plain tracks carry placeholder times; never sync against them.
        let new = if index.track().has_timing() {
            index.lookup(position + self.offset)
        } else {
            None
        };
        let old = self.seek_origin.take().unwrap_or(self.state.current_index);
        self.state.current_index = new;
        if new != old {
            let text = new.and_then(|i| index.get(i)).map(|e| e.text().to_string());
            events.push(SyncEvent::LineChanged { old, new, text });
        }

        events.push(SyncEvent::Progress {
            position,
            duration: sample.duration,
            fraction: progress_fraction(position, sample.duration),
        });
        events
    }
}
