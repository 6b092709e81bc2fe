//! Settings types.

use std::path::PathBuf;

use relay_core::ChannelName;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and queue settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
    /// Channels registered on the bus at startup.
    pub channels: ChannelSettings,
}

impl RelaySettings {
    /// Check values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.server.send_queue_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueSize must be greater than 0".into(),
            ));
        }
        if self.server.channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.channelCapacity must be greater than 0".into(),
            ));
        }
        for name in &self.channels.names {
            if let Err(e) = ChannelName::parse(name) {
                return Err(SettingsError::InvalidValue(format!("channels.names: {e}")));
            }
        }
        Ok(())
    }
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port.
    pub port: u16,
    /// Directory holding `host.html`, `player.html`, and assets served under `/build`.
    pub static_dir: PathBuf,
    /// Outbound frames queued per connection before new ones are dropped.
    pub send_queue_size: usize,
    /// Buffered messages per bus channel.
    pub channel_capacity: usize,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Seconds to wait for tasks to drain on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("build"),
            send_queue_size: 256,
            channel_capacity: 1024,
            max_message_size: 1024 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Channel registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Channel names, each `recv_<Tag>` or `send_<Tag>`.
    pub names: Vec<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            names: [
                "recv_Message",
                "send_Message",
                "recv_PlayerMessage",
                "send_PlayerMessage",
                "send_PlayerLeft",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RelaySettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.static_dir, PathBuf::from("build"));
        assert_eq!(s.server.send_queue_size, 256);
        assert_eq!(s.server.channel_capacity, 1024);
        assert_eq!(s.server.max_message_size, 1024 * 1024);
        assert_eq!(s.logging.level, "info");
        assert!(s.channels.names.iter().any(|n| n == "send_PlayerLeft"));
    }

    #[test]
    fn defaults_validate() {
        RelaySettings::default().validate().unwrap();
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json["server"]["sendQueueSize"].is_number());
        assert!(json["server"]["staticDir"].is_string());
        assert!(json["channels"]["names"].is_array());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RelaySettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn zero_queue_is_invalid() {
        let mut s = RelaySettings::default();
        s.server.send_queue_size = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn zero_channel_capacity_is_invalid() {
        let mut s = RelaySettings::default();
        s.server.channel_capacity = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn bad_channel_name_is_invalid() {
        let mut s = RelaySettings::default();
        s.channels.names.push("server_PlayerLeft".into());
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("server_PlayerLeft"));
    }
}
