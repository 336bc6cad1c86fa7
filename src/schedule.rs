//! Cancellable fixed-cadence tick source.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};

pub const DEFAULT_CADENCE: Duration = Duration::from_millis(100);

/// Stops a `TickSchedule`. Cheap to clone; `stop` is synchronous and
/// idempotent.
#[derive(Debug, Clone)]
pub struct TickHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl TickHandle {
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// The receiving half: yields ticks until stopped.
#[derive(Debug)]
pub struct TickSchedule {
    interval: Interval,
    stop_rx: watch::Receiver<bool>,
}

impl TickSchedule {
    /// Wait for the next tick. Resolves `false` once the handle is stopped
    /// (or dropped). With `ticking == false` only the stop is awaited.
    pub async fn next(&mut self, ticking: bool) -> bool {
        if *self.stop_rx.borrow_and_update() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.stop_rx.changed() => false,
            _ = self.interval.tick(), if ticking => true,
        }
    }

    /// Restart the cadence so the next tick fires immediately.
    pub fn reset(&mut self) {
        self.interval.reset_immediately();
    }
}

pub fn schedule(cadence: Duration) -> (TickHandle, TickSchedule) {
    let cadence = if cadence.is_zero() { DEFAULT_CADENCE } else { cadence };
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    (
        TickHandle {
            stop_tx: Arc::new(stop_tx),
        },
        TickSchedule { interval, stop_rx },
    )
}
