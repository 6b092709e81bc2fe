//! # relay
//!
//! Relay binary: loads settings, builds the channel bus, attaches the
//! built-in forwarding core, and serves host and player sockets.

#![deny(unsafe_code)]

mod forward;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::{ChannelBusBuilder, RelayServer, ServerConfig};
use relay_settings::RelaySettings;

/// Tagged message relay between one host group and many players.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Tagged WebSocket message relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory with `host.html`, `player.html`, and `/build` assets.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply CLI flags over loaded settings.
    fn apply(self, settings: &mut RelaySettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = self.static_dir {
            settings.server.static_dir = dir;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(relay_settings::settings_path);
    let mut settings = relay_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    relay_core::logging::init_subscriber(&settings.logging.level);
    tracing::debug!(path = %settings_path.display(), "settings loaded");

    let (bus, core) = ChannelBusBuilder::new(settings.server.channel_capacity)
        .register_all(&settings.channels.names)
        .context("Failed to register channels")?
        .build();

    let mut server = RelayServer::new(ServerConfig::from(&settings.server), bus);
    match relay_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let forwarders = forward::spawn(core, &server.shutdown().token());

    let addr = server
        .listen()
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    tracing::info!(
        channels = settings.channels.names.len(),
        "relay listening on http://{addr} (host: /host, players: /join/<token>)"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown_gracefully(forwarders).await;
    Ok(())
}
