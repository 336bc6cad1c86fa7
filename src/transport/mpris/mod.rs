//! MPRIS adapter: any D-Bus media player (including browsers playing an
//! embedded video) as a `Transport`.

pub mod connection;
pub mod metadata;

use crate::transport::{PlaybackState, Transport, TransportError};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use zbus::{Proxy, proxy};
use zvariant::OwnedValue;

pub use connection::pick_player;
pub use metadata::TrackMetadata;

const PLAYER_PATH: &str = "/org/mpris/MediaPlayer2";
const PLAYER_IFACE: &str = "org.mpris.MediaPlayer2.Player";

/// MPRIS MediaPlayer2.Player interface proxy
#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait MediaPlayer2Player {
    fn play(&self) -> zbus::Result<()>;

    fn pause(&self) -> zbus::Result<()>;

    fn seek(&self, offset: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;
}

pub fn parse_playback_status(status: &str) -> PlaybackState {
    match status {
        "Playing" => PlaybackState::Playing,
        "Paused" => PlaybackState::Paused,
        "Stopped" => PlaybackState::Ended,
        _ => PlaybackState::Unstarted,
    }
}

pub struct MprisTransport {
    service: String,
    conn: Arc<zbus::Connection>,
    player: MediaPlayer2PlayerProxy<'static>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    track_tx: Arc<watch::Sender<TrackMetadata>>,
    watcher: JoinHandle<()>,
}

impl MprisTransport {
    /// Attach to the first non-blocked active player.
    pub async fn connect(block_list: &[String]) -> Result<Self, TransportError> {
        let service = pick_player(block_list).await?;
        Self::attach(service).await
    }

    pub async fn attach(service: String) -> Result<Self, TransportError> {
        let conn = connection::get_dbus_conn().await?;
        let player = MediaPlayer2PlayerProxy::builder(&conn)
            .destination(service.clone())?
            .build()
            .await?;

        let initial = player
            .playback_status()
            .await
            .map(|s| parse_playback_status(&s))
            .unwrap_or_default();
        let (state_tx, _) = watch::channel(initial);
        let state_tx = Arc::new(state_tx);
        let current = player
            .metadata()
            .await
            .map(|m| metadata::extract_metadata(&m))
            .unwrap_or_default();
        let (track_tx, _) = watch::channel(current);
        let track_tx = Arc::new(track_tx);

        let watcher = tokio::spawn(watch_player(player.clone(), state_tx.clone(), track_tx.clone()));
        tracing::debug!(%service, ?initial, "attached to MPRIS player");

        Ok(Self {
            service,
            conn,
            player,
            state_tx,
            track_tx,
            watcher,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Fires when the player moves on to a different song or video.
    pub fn track_changes(&self) -> watch::Receiver<TrackMetadata> {
        self.track_tx.subscribe()
    }

    pub async fn metadata(&self) -> Result<TrackMetadata, TransportError> {
        let map = self.player.metadata().await?;
        Ok(metadata::extract_metadata(&map))
    }

    /// Targeted Properties.Get so the position is never served from the
    /// proxy's property cache (players do not signal Position changes).
    async fn get_property(&self, name: &str) -> Result<OwnedValue, TransportError> {
        let props = Proxy::new(
            &self.conn,
            self.service.as_str(),
            PLAYER_PATH,
            "org.freedesktop.DBus.Properties",
        )
        .await?;
        let reply = props.call_method("Get", &(PLAYER_IFACE, name)).await?;
        Ok(reply.body().deserialize::<OwnedValue>()?)
    }
}

impl Drop for MprisTransport {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

async fn watch_player(
    player: MediaPlayer2PlayerProxy<'static>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    track_tx: Arc<watch::Sender<TrackMetadata>>,
) {
    let mut status_stream = player.receive_playback_status_changed().await;
    let mut metadata_stream = player.receive_metadata_changed().await;
    loop {
        tokio::select! {
            Some(change) = status_stream.next() => match change.get().await {
                Ok(status) => {
                    let state = parse_playback_status(&status);
                    tracing::debug!(?state, "MPRIS playback status changed");
                    state_tx.send_replace(state);
                }
                Err(e) => tracing::warn!("failed to read MPRIS playback status: {}", e),
            },
            Some(change) = metadata_stream.next() => match change.get().await {
                Ok(map) => publish_track(&track_tx, metadata::extract_metadata(&map)),
                Err(e) => tracing::warn!("failed to read MPRIS metadata: {}", e),
            },
            else => break,
        }
    }
}

fn publish_track(track_tx: &watch::Sender<TrackMetadata>, new: TrackMetadata) {
    track_tx.send_if_modified(|cur| {
        let changed = metadata::is_new_track(cur, &new);
        if changed {
            tracing::info!(title = %new.title, artist = %new.artist, "MPRIS track changed");
        }
        *cur = new;
        changed
    });
}

#[async_trait::async_trait]
impl Transport for MprisTransport {
    async fn current_time(&self) -> Result<f64, TransportError> {
        let val = self.get_property("Position").await?;
        Ok(metadata::micros_to_secs(&val).unwrap_or(0.0))
    }

    async fn duration(&self) -> Result<Option<f64>, TransportError> {
        Ok(self.metadata().await?.length)
    }

    async fn play(&self) -> Result<(), TransportError> {
        Ok(self.player.play().await?)
    }

    async fn pause(&self) -> Result<(), TransportError> {
        Ok(self.player.pause().await?)
    }

    /// MPRIS `Seek` is relative, so the offset from the current position is sent.
    async fn seek_to(&self, seconds: f64) -> Result<(), TransportError> {
        let current = self.current_time().await?;
        let mut micros = ((seconds - current) * 1_000_000.0).round();
        if !micros.is_finite() {
            micros = 0.0;
        }
        Ok(self.player.seek(micros as i64).await?)
    }

    async fn state(&self) -> Result<PlaybackState, TransportError> {
        Ok(parse_playback_status(&self.player.playback_status().await?))
    }

    async fn is_ready(&self) -> bool {
        self.get_property("Position").await.is_ok()
    }

    fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }
}
