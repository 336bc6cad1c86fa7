//! In-process playback surface driven by the wall clock.

use super::{PlaybackState, Transport, TransportError};
use crate::clock::sanitize_position;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::watch;

#[derive(Debug)]
struct SimState {
    position: f64,
    /// Set while playing; position advances from here.
    anchor: Option<Instant>,
    duration: Option<f64>,
    ready: bool,
}

/// A fake video surface. In realtime mode the position advances with the
/// wall clock while playing; in manual mode it only moves on `seek_to` /
/// `set_position`. Reported times are floored to `granularity` seconds to
/// mimic a coarse surface.
#[derive(Debug)]
pub struct SimulatedTransport {
    inner: Mutex<SimState>,
    state_tx: watch::Sender<PlaybackState>,
    granularity: f64,
    realtime: bool,
}

impl SimulatedTransport {
    pub fn realtime(duration: Option<f64>, granularity: f64) -> Self {
        Self::build(duration, granularity, true)
    }

    #[cfg(test)]
    pub fn manual(duration: Option<f64>) -> Self {
        Self::build(duration, 0.0, false)
    }

    fn build(duration: Option<f64>, granularity: f64, realtime: bool) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Unstarted);
        Self {
            inner: Mutex::new(SimState {
                position: 0.0,
                anchor: None,
                duration,
                ready: false,
            }),
            state_tx,
            granularity: if granularity.is_finite() { granularity.max(0.0) } else { 0.0 },
            realtime,
        }
    }

    /// Surface finished loading.
    pub fn mark_ready(&self) {
        self.lock().ready = true;
    }

    /// Move the playhead without going through `seek_to`, the way a user
    /// scrubbing on the surface itself would.
    pub fn set_position(&self, position: f64) {
        let mut st = self.lock();
        st.position = sanitize_position(position);
        if st.anchor.is_some() {
            st.anchor = Some(Instant::now());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A poisoned lock only means a panicking test thread; the data is plain.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live_position(&self, st: &SimState) -> f64 {
        let mut pos = st.position;
        if self.realtime
            && let Some(anchor) = st.anchor
        {
            pos += anchor.elapsed().as_secs_f64();
        }
        match st.duration {
            Some(d) if d.is_finite() && d > 0.0 => pos.min(d),
            _ => pos,
        }
    }

    fn publish(&self, state: PlaybackState) {
        self.state_tx.send_if_modified(|cur| {
            if *cur == state {
                false
            } else {
                *cur = state;
                true
            }
        });
    }
}

#[async_trait::async_trait]
impl Transport for SimulatedTransport {
    async fn current_time(&self) -> Result<f64, TransportError> {
        let ended;
        let pos = {
            let mut st = self.lock();
            let pos = self.live_position(&st);
            ended = st.anchor.is_some() && st.duration.is_some_and(|d| d > 0.0 && pos >= d);
            if ended {
                st.position = pos;
                st.anchor = None;
            }
            pos
        };
        if ended {
            self.publish(PlaybackState::Ended);
        }
        if self.granularity > 0.0 {
            Ok((pos / self.granularity).floor() * self.granularity)
        } else {
            Ok(pos)
        }
    }

    async fn duration(&self) -> Result<Option<f64>, TransportError> {
        Ok(self.lock().duration)
    }

    async fn play(&self) -> Result<(), TransportError> {
        {
            let mut st = self.lock();
            if st.anchor.is_none() {
                st.anchor = Some(Instant::now());
            }
        }
        self.publish(PlaybackState::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        {
            let mut st = self.lock();
            st.position = self.live_position(&st);
            st.anchor = None;
        }
        self.publish(PlaybackState::Paused);
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<(), TransportError> {
        self.set_position(seconds);
        Ok(())
    }

    async fn state(&self) -> Result<PlaybackState, TransportError> {
        Ok(*self.state_tx.borrow())
    }

    async fn is_ready(&self) -> bool {
        self.lock().ready
    }

    fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }
}
