// state.rs: Sync state and the notifications handed to presentation

use crate::lyrics::LyricTrack;
use std::sync::Arc;

/// Per-session sync bookkeeping, owned and mutated only by the sync loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncState {
    /// Active line, `None` before the first line (or with no lyrics).
    pub current_index: Option<usize>,
    pub last_sampled_time: f64,
    pub drift_correction: f64,
}

impl SyncState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Lifecycle of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Notifications emitted to presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A new track was attached (timed or plain).
    TrackLoaded(Arc<LyricTrack>),
    LineChanged {
        old: Option<usize>,
        new: Option<usize>,
        text: Option<String>,
    },
    /// `fraction` is `None` while the duration is unknown.
    Progress {
        position: f64,
        duration: Option<f64>,
        fraction: Option<f64>,
    },
    PhaseChanged(LoopPhase),
}

/// Playback progress in `[0, 1]`, skipped when the duration is unusable.
pub fn progress_fraction(position: f64, duration: Option<f64>) -> Option<f64> {
    let duration = crate::transport::known_duration(duration)?;
    if !position.is_finite() {
        return None;
    }
    Some((position / duration).clamp(0.0, 1.0))
}
