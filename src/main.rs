mod clock;
mod lyrics;
mod schedule;
mod session;
mod state;
mod sync;
mod text_utils;
mod transport;
mod ui;

use crate::lyrics::LyricTrack;
use crate::lyrics::providers::{TrackQuery, first_success, sources_from_names};
use crate::session::{Session, SessionCommand};
use crate::transport::mpris::{MprisTransport, TrackMetadata};
use crate::transport::{PlaybackState, SimulatedTransport, Transport};
use clap::{Parser, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Seconds of silence the simulated surface plays after the last line.
const SIMULATED_TAIL: f64 = 5.0;
/// Reporting granularity of the simulated surface.
const SIMULATED_GRANULARITY: f64 = 0.25;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// In-process wall-clock player
    Simulated,
    /// An MPRIS player on the session bus
    Mpris,
}

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Local LRC file to sync (skips lyric search)
    #[arg(long)]
    lrc: Option<PathBuf>,
    /// Artist to search lyrics for
    #[arg(long)]
    artist: Option<String>,
    /// Song title to search lyrics for
    #[arg(long)]
    title: Option<String>,
    /// Raw video title, split as "Artist - Song"
    #[arg(long)]
    video_title: Option<String>,
    /// Comma-separated list of lyric providers in preferred order (e.g. "local,lrclib").
    /// If empty, the LYRIC_PROVIDERS env var will be used as a fallback.
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,
    /// Directory of "<artist> - <title>.lrc|.txt" files for the local provider
    #[arg(long)]
    lyrics_dir: Option<PathBuf>,
    /// Playback surface to sync against
    #[arg(long, value_enum, default_value_t = TransportKind::Simulated)]
    transport: TransportKind,
    /// Blocklist for MPRIS player service names (comma-separated, case-insensitive)
    #[arg(
        long = "block",
        value_name = "SERVICE1,SERVICE2",
        value_delimiter = ','
    )]
    block: Vec<String>,
    /// Polling cadence in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Lyric offset in seconds (positive shows lines earlier)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset: f64,
    /// Track length for the simulated player (defaults to the last line plus a few seconds)
    #[arg(long)]
    duration: Option<f64>,
    /// Enable backend debug logging to stderr
    #[arg(long)]
    debug_log: bool,
}

fn providers_from_env_if_empty(cli: &mut Config) {
    if cli.providers.is_empty() {
        let parts: Vec<String> = std::env::var("LYRIC_PROVIDERS")
            .unwrap_or_default()
            .split(',')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        cli.providers = if parts.is_empty() {
            vec!["local".to_string(), "lrclib".to_string()]
        } else {
            parts
        };
    }
}

fn init_tracing(debug_log: bool) {
    let filter = if debug_log {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit --artist/--title win, then --video-title, then player metadata.
fn build_query(cfg: &Config, meta: Option<&TrackMetadata>) -> Option<TrackQuery> {
    if let Some(title) = cfg.title.as_deref().filter(|t| !t.is_empty()) {
        return Some(TrackQuery::new(cfg.artist.clone().unwrap_or_default(), title));
    }
    if let Some(raw) = cfg.video_title.as_deref().filter(|t| !t.is_empty()) {
        let (artist, title) = text_utils::split_artist_title(raw);
        return Some(TrackQuery::new(artist, title));
    }
    let meta = meta.filter(|m| !m.title.is_empty())?;
    let mut query = if meta.artist.is_empty() {
        let (artist, title) = text_utils::split_artist_title(&meta.title);
        TrackQuery::new(artist, title)
    } else {
        TrackQuery::new(meta.artist.clone(), meta.title.clone())
    };
    query.album = meta.album.clone();
    query.duration = meta.length;
    Some(query)
}

async fn resolve_track(cfg: &Config, meta: Option<&TrackMetadata>) -> LyricTrack {
    if let Some(path) = &cfg.lrc {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => return LyricTrack::timed(lyrics::parse_synced_lyrics(&text)),
            Err(e) => tracing::warn!(path = %path.display(), "cannot read LRC file: {}", e),
        }
    }
    let Some(query) = build_query(cfg, meta) else {
        tracing::warn!("nothing to search for; pass --lrc, --title or --video-title");
        return LyricTrack::default();
    };
    let sources = sources_from_names(&cfg.providers, cfg.lyrics_dir.clone());
    match first_success(&sources, &query).await {
        Ok(track) => track,
        Err(e) => {
            tracing::warn!("{}", e);
            LyricTrack::default()
        }
    }
}

/// Whether lyrics should follow the player's metadata. Explicit sources pin
/// the lyrics for the whole run.
fn follows_player(cfg: &Config) -> bool {
    cfg.lrc.is_none() && cfg.title.is_none() && cfg.video_title.is_none()
}

/// Re-resolve lyrics whenever the player moves to a different song.
async fn follow_tracks(
    mut tracks: watch::Receiver<TrackMetadata>,
    cfg: Config,
    commands: mpsc::Sender<SessionCommand>,
) {
    tracks.borrow_and_update();
    while tracks.changed().await.is_ok() {
        let meta = tracks.borrow_and_update().clone();
        let track = resolve_track(&cfg, Some(&meta)).await;
        if commands.send(SessionCommand::LoadTrack(track)).await.is_err() {
            break;
        }
    }
}

/// Resolves on an `Ended` published after this call; the state the surface
/// already had at attach time does not count.
async fn playback_ended(mut states: watch::Receiver<PlaybackState>) {
    states.borrow_and_update();
    while states.changed().await.is_ok() {
        if *states.borrow_and_update() == PlaybackState::Ended {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Run one session against `transport` until quit, Ctrl-C or end of playback.
async fn run_pipe<T: Transport + 'static>(
    transport: Arc<T>,
    track: LyricTrack,
    cfg: &Config,
    cmd_tx: mpsc::Sender<SessionCommand>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (event_tx, event_rx) = mpsc::channel(32);
    let ui = tokio::spawn(ui::pipe::display_lyrics_pipe(event_rx));

    let (handle, sched) = schedule::schedule(Duration::from_millis(cfg.tick_ms));
    ui::input::spawn_command_reader(cmd_tx, handle.clone());

    let mut session = Session::new(transport.clone(), event_tx, cfg.offset);
    session.set_tick_handle(handle.clone());
    session.load_track(track).await;

    let states = transport.subscribe();
    let mut task = tokio::spawn(async move {
        session.run(sched, cmd_rx).await;
        session
    });

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("interrupted");
            None
        }
        _ = playback_ended(states) => {
            tracing::debug!("playback ended");
            None
        }
        joined = &mut task => Some(joined),
    };

    handle.stop();
    let mut session = match finished {
        Some(joined) => joined?,
        None => task.await?,
    };
    session.teardown();
    drop(session);

    ui.await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    providers_from_env_if_empty(&mut cfg);
    init_tracing(cfg.debug_log);

    let result = match cfg.transport {
        TransportKind::Simulated => {
            let track = resolve_track(&cfg, None).await;
            let duration = cfg.duration.or_else(|| {
                track
                    .events()
                    .last()
                    .map(|e| e.time() + SIMULATED_TAIL)
            });
            let transport = Arc::new(SimulatedTransport::realtime(duration, SIMULATED_GRANULARITY));
            transport.mark_ready();
            transport.play().await?;
            let (cmd_tx, cmd_rx) = mpsc::channel(8);
            run_pipe(transport, track, &cfg, cmd_tx, cmd_rx).await
        }
        TransportKind::Mpris => {
            let transport = Arc::new(MprisTransport::connect(&cfg.block).await?);
            tracing::info!(service = transport.service(), "using MPRIS player");
            let meta = match transport.metadata().await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!("D-Bus error getting metadata: {}", e);
                    None
                }
            };
            let track = resolve_track(&cfg, meta.as_ref()).await;
            let (cmd_tx, cmd_rx) = mpsc::channel(8);
            let follower = follows_player(&cfg).then(|| {
                tokio::spawn(follow_tracks(transport.track_changes(), cfg.clone(), cmd_tx.clone()))
            });
            let result = run_pipe(transport, track, &cfg, cmd_tx, cmd_rx).await;
            if let Some(follower) = follower {
                follower.abort();
            }
            result
        }
    };

    // Print error if any, for better diagnostics
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}
