//! # relay-server
//!
//! Axum HTTP + `WebSocket` relay between one host group and many players.
//!
//! - `/host` and `/join/{token}` upgrade to host and player sockets
//! - Frames are `{tag, msg}` JSON; `recv_<Tag>` channels carry them to the core
//! - `send_<Tag>` channels carry the core's replies back, broadcast to hosts or
//!   targeted at one player
//! - When a host leaves, every player is closed and reported on the
//!   player-left channel
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use bus::{ChannelBus, ChannelBusBuilder, CoreChannels, Outlet};
pub use config::ServerConfig;
pub use errors::RouteError;
pub use router::MessageRouter;
pub use server::{IdSource, RelayServer};
