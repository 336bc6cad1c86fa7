//! D-Bus connection management and player discovery for MPRIS.

use crate::transport::TransportError;
use std::sync::Arc;
use tokio::sync::OnceCell;
use zbus::proxy;

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Global D-Bus connection singleton
static DBUS_CONNECTION: OnceCell<Arc<zbus::Connection>> = OnceCell::const_new();

/// Get or create a shared D-Bus session connection
pub async fn get_dbus_conn() -> Result<Arc<zbus::Connection>, TransportError> {
    DBUS_CONNECTION
        .get_or_try_init(|| async {
            let conn = zbus::Connection::session()
                .await
                .map_err(|_| TransportError::NoConnection)?;
            Ok(Arc::new(conn))
        })
        .await
        .cloned()
}

/// Proxy interface for playerctld to get active MPRIS players
#[proxy(
    interface = "com.github.altdesktop.playerctld",
    default_service = "org.mpris.MediaPlayer2.playerctld",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait Playerctld {
    #[zbus(property)]
    fn player_names(&self) -> zbus::Result<Vec<String>>;
}

/// Get list of active MPRIS player service names, most recent first.
///
/// Asks playerctld when it is running, otherwise lists every
/// `org.mpris.MediaPlayer2.*` name on the bus.
pub async fn get_active_player_names() -> Result<Vec<String>, TransportError> {
    let conn = get_dbus_conn().await?;

    if let Ok(proxy) = PlayerctldProxy::new(&conn).await
        && let Ok(names) = proxy.player_names().await
        && !names.is_empty()
    {
        return Ok(names);
    }

    let dbus = zbus::fdo::DBusProxy::new(&conn).await?;
    let names = dbus
        .list_names()
        .await?
        .into_iter()
        .map(|n| n.to_string())
        .filter(|n| n.starts_with(MPRIS_PREFIX) && !n.ends_with(".playerctld"))
        .collect();
    Ok(names)
}

/// Check if a player service name should be blocked
///
/// Returns true if the service name (case-insensitive) contains any blocked string.
pub fn is_blocked(service: &str, block_list: &[String]) -> bool {
    let service_lower = service.to_lowercase();
    block_list
        .iter()
        .any(|blocked| service_lower.contains(&blocked.to_lowercase()))
}

/// First active player that is not blocked.
pub async fn pick_player(block_list: &[String]) -> Result<String, TransportError> {
    get_active_player_names()
        .await?
        .into_iter()
        .find(|name| !is_blocked(name, block_list))
        .ok_or(TransportError::NoPlayer)
}
