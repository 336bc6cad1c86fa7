//! Transport adapters: the external playback surface the sync core samples.

pub mod mpris;
pub mod simulated;

use thiserror::Error;
use tokio::sync::watch;

pub use simulated::SimulatedTransport;

/// Playback state as reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Unstarted,
    Playing,
    Paused,
    Ended,
}

/// Errors that can occur while talking to a playback surface
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("D-Bus error: {0}")]
    ZBus(#[from] zbus::Error),
    #[error("D-Bus fdo error: {0}")]
    Fdo(#[from] zbus::fdo::Error),
    #[error("Failed to establish D-Bus connection")]
    NoConnection,
    #[error("no active player found")]
    NoPlayer,
}

/// The playback surface: position, duration, transport controls and a
/// state-change channel.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Authoritative position in seconds.
    async fn current_time(&self) -> Result<f64, TransportError>;
    /// `None` while the duration is unknown (e.g. still buffering).
    async fn duration(&self) -> Result<Option<f64>, TransportError>;
    async fn play(&self) -> Result<(), TransportError>;
    async fn pause(&self) -> Result<(), TransportError>;
    async fn seek_to(&self, seconds: f64) -> Result<(), TransportError>;
    async fn state(&self) -> Result<PlaybackState, TransportError>;
    /// Whether the surface can be sampled and controlled yet.
    async fn is_ready(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<PlaybackState>;
}

/// Usable duration, or `None` if it is zero, negative or not a number.
pub fn known_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}
