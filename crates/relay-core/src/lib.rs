//! # relay-core
//!
//! Shared vocabulary for the tagged message relay.
//!
//! - **Connection ids**: [`ConnectionId`], 128 random bits, hex-encoded
//! - **Wire envelope**: [`Envelope`] `{ "tag", "msg" }` frames
//! - **Channel names**: [`ChannelName`] (`recv_<Tag>` / `send_<Tag>`)
//! - **Bus payloads**: [`Inbound`] (relay → core) and [`Outbound`] with an
//!   explicit [`Delivery`] mode (core → relay)
//! - **Errors**: [`RelayError`] via `thiserror`
//! - **Logging**: subscriber setup and an in-memory capture layer for tests

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;

pub use envelope::{ChannelName, Delivery, Envelope, Inbound, Outbound};
pub use errors::{RelayError, Result};
pub use ids::ConnectionId;
