//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_settings::ServerSettings;

/// Host page served at `/`.
pub const HOST_PAGE: &str = "host.html";
/// Player page served at `/join/{token}`.
pub const PLAYER_PAGE: &str = "player.html";

/// Runtime configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port to bind; `0` picks a free one.
    pub port: u16,
    /// Directory with the host and player pages and `/build` assets.
    pub static_dir: PathBuf,
    /// Outbound frames buffered per connection.
    pub send_queue_size: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for tasks.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Path of the host page.
    pub fn host_page(&self) -> PathBuf {
        self.static_dir.join(HOST_PAGE)
    }

    /// Path of the player page.
    pub fn player_page(&self) -> PathBuf {
        self.static_dir.join(PLAYER_PAGE)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            static_dir: settings.static_dir.clone(),
            send_queue_size: settings.send_queue_size,
            max_message_size: settings.max_message_size,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}
