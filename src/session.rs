//! One playback session: a transport, the loaded lyrics and the sync loop.
//!
//! Created when a video is loaded and torn down before the next one, so no
//! tick can ever reach a transport that has gone away.

use crate::lyrics::{LyricIndex, LyricTrack};
use crate::schedule::{TickHandle, TickSchedule};
use crate::state::{LoopPhase, SyncEvent};
use crate::sync::{Sample, SyncLoop};
use crate::transport::{PlaybackState, Transport, TransportError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("transport is not ready")]
    TransportUnavailable,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Requests from the outside world (user input, a new search result).
#[derive(Debug)]
pub enum SessionCommand {
    Seek(f64),
    SeekToLine(usize),
    TogglePause,
    LoadTrack(LyricTrack),
}

pub struct Session<T: Transport> {
    transport: Arc<T>,
    index: LyricIndex,
    sync: SyncLoop,
    events: mpsc::Sender<SyncEvent>,
    tick_handle: Option<TickHandle>,
    /// The surface reported Playing before it was ready; retried every tick.
    pending_start: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: Arc<T>, events: mpsc::Sender<SyncEvent>, offset: f64) -> Self {
        Self {
            transport,
            index: LyricIndex::default(),
            sync: SyncLoop::new(offset),
            events,
            tick_handle: None,
            pending_start: false,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> LoopPhase {
        self.sync.phase()
    }

    #[cfg(test)]
    pub fn sync_state(&self) -> &crate::state::SyncState {
        self.sync.state()
    }

    #[cfg(test)]
    pub fn index(&self) -> &LyricIndex {
        &self.index
    }

    /// Replace the lyrics wholesale. Only called between ticks.
    pub async fn load_track(&mut self, track: LyricTrack) {
        self.index.load(track);
        self.sync.reset_for_track(Instant::now());
        tracing::info!(
            lines = self.index.events().len(),
            timed = self.index.track().has_timing(),
            "track loaded"
        );
        self.emit(SyncEvent::TrackLoaded(self.index.track().clone())).await;
    }

    /// Start polling if the transport is ready; refused otherwise.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if !self.transport.is_ready().await {
            return Err(SyncError::TransportUnavailable);
        }
        let reference = self.transport.current_time().await?;
        self.pending_start = false;
        if self.sync.start_at(reference, Instant::now()) {
            tracing::debug!(reference, "sync loop running");
            self.emit(SyncEvent::PhaseChanged(LoopPhase::Running)).await;
        }
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), SyncError> {
        self.pending_start = false;
        let reference = self.transport.current_time().await?;
        if self.sync.pause(reference) {
            tracing::debug!(reference, "sync loop paused");
            self.emit(SyncEvent::PhaseChanged(LoopPhase::Paused)).await;
        }
        Ok(())
    }

    /// Seek the transport and re-anchor; the next tick looks up from scratch.
    pub async fn seek_to(&mut self, seconds: f64) -> Result<(), SyncError> {
        if !self.transport.is_ready().await {
            return Err(SyncError::TransportUnavailable);
        }
        self.transport.seek_to(seconds).await?;
        self.sync.seek_at(&self.index, seconds, Instant::now());
        tracing::debug!(seconds, "seek");
        Ok(())
    }

    /// Seek to the start of a line. Out-of-range lines are ignored.
    pub async fn seek_to_line(&mut self, line: usize) -> Result<(), SyncError> {
        match self.index.get(line).map(|e| e.time()) {
            Some(time) => self.seek_to(time).await,
            None => {
                tracing::debug!(line, "seek to missing line ignored");
                Ok(())
            }
        }
    }

    /// One polling step: sample the transport, then advance the loop. A
    /// deferred start is retried first.
    pub async fn tick(&mut self) -> Result<(), SyncError> {
        if self.pending_start {
            match self.start().await {
                Err(SyncError::TransportUnavailable) => return Ok(()),
                other => other?,
            }
        }
        if self.sync.phase() != LoopPhase::Running {
            return Ok(());
        }
        let time = self.transport.current_time().await?;
        let duration = self.transport.duration().await?;
        let events = self.sync.advance(&self.index, Sample { time, duration }, Instant::now());
        for event in events {
            self.emit(event).await;
        }
        Ok(())
    }

    async fn on_transport_state(&mut self, state: PlaybackState) -> Result<(), SyncError> {
        match state {
            PlaybackState::Playing => match self.start().await {
                Err(SyncError::TransportUnavailable) => {
                    tracing::debug!("play reported before transport ready, deferring");
                    self.pending_start = true;
                    Ok(())
                }
                other => other,
            },
            PlaybackState::Paused | PlaybackState::Ended => self.pause().await,
            PlaybackState::Unstarted => Ok(()),
        }
    }

    async fn on_command(&mut self, command: SessionCommand) -> Result<(), SyncError> {
        match command {
            SessionCommand::Seek(seconds) => self.seek_to(seconds).await,
            SessionCommand::SeekToLine(line) => self.seek_to_line(line).await,
            SessionCommand::TogglePause => {
                match self.transport.state().await? {
                    PlaybackState::Playing => self.transport.pause().await?,
                    _ => self.transport.play().await?,
                }
                Ok(())
            }
            SessionCommand::LoadTrack(track) => {
                self.load_track(track).await;
                Ok(())
            }
        }
    }

    /// Drive the session until the schedule is stopped. Transport state
    /// changes and commands are handled between ticks.
    pub async fn run(&mut self, mut schedule: TickSchedule, mut commands: mpsc::Receiver<SessionCommand>) {
        let mut states = self.transport.subscribe();
        let initial = *states.borrow_and_update();
        if let Err(e) = self.on_transport_state(initial).await {
            tracing::warn!("initial transport state: {}", e);
        }
        let mut commands_open = true;

        loop {
            let ticking = self.pending_start || self.sync.phase() == LoopPhase::Running;
            tokio::select! {
                keep = schedule.next(ticking) => {
                    if !keep {
                        break;
                    }
                    if let Err(e) = self.tick().await {
                        tracing::warn!("tick failed: {}", e);
                    }
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        tracing::debug!("transport closed its state channel");
                        break;
                    }
                    let state = *states.borrow_and_update();
                    let was_running = self.sync.phase() == LoopPhase::Running;
                    if let Err(e) = self.on_transport_state(state).await {
                        tracing::warn!("transport state {:?}: {}", state, e);
                    }
                    if !was_running && self.sync.phase() == LoopPhase::Running {
                        schedule.reset();
                    }
                }
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => {
                        if let Err(e) = self.on_command(cmd).await {
                            tracing::warn!("command failed: {}", e);
                        }
                    }
                    None => commands_open = false,
                },
            }
        }
        tracing::debug!("session loop exited");
    }

    /// Keep a handle so `teardown` can stop the schedule driving this session.
    pub fn set_tick_handle(&mut self, handle: TickHandle) {
        self.tick_handle = Some(handle);
    }

    /// Stop polling synchronously and return to Idle with a fresh state.
    pub fn teardown(&mut self) {
        self.pending_start = false;
        if let Some(handle) = self.tick_handle.take() {
            handle.stop();
        }
        if self.sync.stop() {
            // Presentation may already be gone during shutdown.
            let _ = self.events.try_send(SyncEvent::PhaseChanged(LoopPhase::Idle));
        }
        self.index.invalidate_anchor();
        tracing::debug!("session torn down");
    }

    async fn emit(&self, event: SyncEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("presentation receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::LyricEvent;
    use crate::schedule::schedule;
    use crate::state::SyncState;
    use crate::transport::SimulatedTransport;
    use std::time::Duration;

    fn abc_track() -> LyricTrack {
        LyricTrack::timed(vec![
            LyricEvent::new(0.0, "Line A").unwrap(),
            LyricEvent::new(3.0, "Line B").unwrap(),
            LyricEvent::new(6.0, "Line C").unwrap(),
        ])
    }

    fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    fn line_changes(events: &[SyncEvent]) -> Vec<(Option<usize>, Option<usize>)> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::LineChanged { old, new, .. } => Some((*old, *new)),
                _ => None,
            })
            .collect()
    }

    async fn ready_session() -> (Session<SimulatedTransport>, Arc<SimulatedTransport>, mpsc::Receiver<SyncEvent>) {
        let transport = Arc::new(SimulatedTransport::manual(Some(9.0)));
        transport.mark_ready();
        let (tx, rx) = mpsc::channel(64);
        let mut session = Session::new(transport.clone(), tx, 0.0);
        session.load_track(abc_track()).await;
        (session, transport, rx)
    }

    #[tokio::test]
    async fn test_start_refused_until_ready() {
        let transport = Arc::new(SimulatedTransport::manual(None));
        let (tx, _rx) = mpsc::channel(8);
        let mut session = Session::new(transport.clone(), tx, 0.0);
        assert!(matches!(session.start().await, Err(SyncError::TransportUnavailable)));
        assert!(matches!(session.seek_to(3.0).await, Err(SyncError::TransportUnavailable)));
        assert_eq!(session.phase(), LoopPhase::Idle);

        transport.mark_ready();
        session.start().await.unwrap();
        assert_eq!(session.phase(), LoopPhase::Running);
    }

    async fn wait_for_event(rx: &mut mpsc::Receiver<SyncEvent>, want: impl Fn(&SyncEvent) -> bool) -> bool {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            if want(&event) {
                return true;
            }
        }
        false
    }

    #[tokio::test]
    async fn test_play_before_ready_starts_once_ready() {
        let transport = Arc::new(SimulatedTransport::manual(Some(9.0)));
        let (tx, mut rx) = mpsc::channel(64);
        let mut session = Session::new(transport.clone(), tx, 0.0);
        session.load_track(abc_track()).await;
        let (handle, sched) = schedule(Duration::from_millis(5));
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);

        transport.set_position(3.5);
        transport.play().await.unwrap();
        let task = tokio::spawn(async move {
            session.run(sched, cmd_rx).await;
            session
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        transport.mark_ready();
        assert!(wait_for_event(&mut rx, |e| *e == SyncEvent::PhaseChanged(LoopPhase::Running)).await);
        assert!(wait_for_event(&mut rx, |e| matches!(e, SyncEvent::LineChanged { new: Some(1), .. })).await);

        handle.stop();
        let session = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.phase(), LoopPhase::Running);
    }

    #[tokio::test]
    async fn test_pause_cancels_deferred_start() {
        let transport = Arc::new(SimulatedTransport::manual(None));
        let (tx, _rx) = mpsc::channel(64);
        let mut session = Session::new(transport.clone(), tx, 0.0);
        session.on_transport_state(PlaybackState::Playing).await.unwrap();
        assert!(session.pending_start);
        session.on_transport_state(PlaybackState::Paused).await.unwrap();
        assert!(!session.pending_start);

        transport.mark_ready();
        session.tick().await.unwrap();
        assert_eq!(session.phase(), LoopPhase::Idle);
    }

    #[tokio::test]
    async fn test_seek_then_tick_matches_lookup() {
        let (mut session, _transport, mut rx) = ready_session().await;
        session.start().await.unwrap();
        session.seek_to(7.0).await.unwrap();
        session.tick().await.unwrap();
        assert_eq!(session.sync_state().current_index, session.index().lookup(7.0));

        session.seek_to(1.0).await.unwrap();
        session.tick().await.unwrap();
        assert_eq!(session.sync_state().current_index, Some(0));
        assert_eq!(
            line_changes(&drain(&mut rx)),
            vec![(None, Some(2)), (Some(2), Some(0))]
        );
    }

    #[tokio::test]
    async fn test_seek_to_line() {
        let (mut session, transport, _rx) = ready_session().await;
        session.start().await.unwrap();
        session.seek_to_line(1).await.unwrap();
        assert_eq!(transport.current_time().await.unwrap(), 3.0);
        session.tick().await.unwrap();
        assert_eq!(session.sync_state().current_index, Some(1));

        session.seek_to_line(99).await.unwrap();
        assert_eq!(transport.current_time().await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_load_track_resets_state() {
        let (mut session, transport, mut rx) = ready_session().await;
        session.start().await.unwrap();
        transport.set_position(6.5);
        session.tick().await.unwrap();
        assert_eq!(session.sync_state().current_index, Some(2));

        session
            .load_track(LyricTrack::timed(vec![LyricEvent::new(8.0, "later").unwrap()]))
            .await;
        assert_eq!(session.sync_state().current_index, None);
        assert_eq!(session.sync.clock().correction(), 0.0);
        session.tick().await.unwrap();
        assert_eq!(session.sync_state().current_index, None);
        assert!(drain(&mut rx).iter().any(|e| matches!(e, SyncEvent::TrackLoaded(t) if t.len() == 1)));
    }

    #[tokio::test]
    async fn test_load_track_clears_drift_correction() {
        let (mut session, transport, _rx) = ready_session().await;
        session.start().await.unwrap();
        // Surface a second ahead of a clock that cannot move in this test.
        for pos in [1.0, 1.5, 2.0] {
            transport.set_position(pos);
            session.tick().await.unwrap();
        }
        assert!(session.sync.clock().correction() != 0.0);

        session.load_track(abc_track()).await;
        assert_eq!(session.sync.clock().correction(), 0.0);
        assert_eq!(session.sync_state().drift_correction, 0.0);
    }

    #[tokio::test]
    async fn test_load_track_command_replaces_lyrics() {
        let (mut session, _transport, mut rx) = ready_session().await;
        drain(&mut rx);
        let (handle, sched) = schedule(Duration::from_millis(5));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            session.run(sched, cmd_rx).await;
            session
        });

        let next = LyricTrack::timed(vec![LyricEvent::new(1.0, "next video").unwrap()]);
        cmd_tx.send(SessionCommand::LoadTrack(next)).await.unwrap();
        assert!(wait_for_event(&mut rx, |e| matches!(e, SyncEvent::TrackLoaded(t) if t.len() == 1)).await);

        handle.stop();
        let session = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.index().events()[0].text(), "next video");
    }

    #[tokio::test]
    async fn test_teardown_stops_schedule() {
        let (mut session, _transport, mut rx) = ready_session().await;
        let (handle, _sched) = schedule(Duration::from_millis(10));
        session.set_tick_handle(handle.clone());
        session.start().await.unwrap();
        session.teardown();
        assert!(handle.is_stopped());
        assert_eq!(session.phase(), LoopPhase::Idle);
        assert_eq!(*session.sync_state(), SyncState::default());
        assert!(drain(&mut rx).contains(&SyncEvent::PhaseChanged(LoopPhase::Idle)));
    }

    #[tokio::test]
    async fn test_run_follows_transport_state() {
        let (mut session, transport, mut rx) = ready_session().await;
        let (handle, sched) = schedule(Duration::from_millis(5));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        transport.set_position(3.5);
        transport.play().await.unwrap();
        let task = tokio::spawn(async move {
            session.run(sched, cmd_rx).await;
            session
        });

        let mut saw_line = false;
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            if let SyncEvent::LineChanged { new: Some(1), .. } = event {
                saw_line = true;
                break;
            }
        }
        assert!(saw_line);

        cmd_tx.send(SessionCommand::TogglePause).await.unwrap();
        let mut paused = false;
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            if event == SyncEvent::PhaseChanged(LoopPhase::Paused) {
                paused = true;
                break;
            }
        }
        assert!(paused);

        handle.stop();
        let mut session = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.phase(), LoopPhase::Paused);
        assert_eq!(session.sync_state().current_index, Some(1));
        session.teardown();
        assert_eq!(session.phase(), LoopPhase::Idle);
    }
}
