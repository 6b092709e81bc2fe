//! Wire frames and channel payloads.
//!
//! Both directions of the WebSocket carry the same text frame:
//! `{"tag": <string>, "msg": <any>}`. The relay never looks inside `msg`.
//!
//! Between the relay and the application core, messages travel on named
//! channels. Inbound channels are `recv_<Tag>`, outbound channels are
//! `send_<Tag>`. Every [`Outbound`] value states its own [`Delivery`] mode;
//! the older convention of inferring the mode from a `Player` tag prefix is
//! still available through [`Outbound::from_legacy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RelayError, Result};
use crate::ids::ConnectionId;

/// Prefix of inbound (relay → core) channel names.
pub const RECV_PREFIX: &str = "recv_";
/// Prefix of outbound (core → relay) channel names.
pub const SEND_PREFIX: &str = "send_";
/// Tag prefix reserved for player-addressed messages in the legacy convention.
pub const PLAYER_PREFIX: &str = "Player";

/// A single wire frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind; selects the channel.
    pub tag: String,
    /// Opaque payload. Missing in the frame means `null`.
    #[serde(default)]
    pub msg: Value,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(tag: impl Into<String>, msg: Value) -> Self {
        Self {
            tag: tag.into(),
            msg,
        }
    }

    /// Parse a text frame.
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    /// Serialize to a text frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A registered channel name, split into direction and tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// `recv_<Tag>`: frames from connections, delivered to the core.
    Inbound(String),
    /// `send_<Tag>`: values emitted by the core, delivered to connections.
    Outbound(String),
}

impl ChannelName {
    /// Parse `recv_<Tag>` or `send_<Tag>`.
    pub fn parse(name: &str) -> Result<Self> {
        let parsed = if let Some(tag) = name.strip_prefix(RECV_PREFIX) {
            Self::Inbound(tag.to_owned())
        } else if let Some(tag) = name.strip_prefix(SEND_PREFIX) {
            Self::Outbound(tag.to_owned())
        } else {
            return Err(RelayError::InvalidChannelName(name.to_owned()));
        };
        if parsed.tag().is_empty() {
            return Err(RelayError::InvalidChannelName(name.to_owned()));
        }
        Ok(parsed)
    }

    /// The tag part of the name.
    pub fn tag(&self) -> &str {
        match self {
            Self::Inbound(tag) | Self::Outbound(tag) => tag,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound(tag) => write!(f, "{RECV_PREFIX}{tag}"),
            Self::Outbound(tag) => write!(f, "{SEND_PREFIX}{tag}"),
        }
    }
}

impl FromStr for ChannelName {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Whether a tag falls under the legacy player-addressed convention.
pub fn is_player_addressed(tag: &str) -> bool {
    tag.starts_with(PLAYER_PREFIX)
}

/// A message delivered to the core on a `recv_<Tag>` channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Sent by a player; carries the sender's id.
    Player {
        /// The sending connection.
        id: ConnectionId,
        /// Opaque payload.
        msg: Value,
    },
    /// Sent by a host. Hosts are not individually addressed.
    Host(Value),
}

impl Inbound {
    /// The opaque payload.
    pub fn msg(&self) -> &Value {
        match self {
            Self::Player { msg, .. } | Self::Host(msg) => msg,
        }
    }

    /// The sending player, if any.
    pub fn sender(&self) -> Option<&ConnectionId> {
        match self {
            Self::Player { id, .. } => Some(id),
            Self::Host(_) => None,
        }
    }

    /// Untyped shape for cores that consume raw JSON:
    /// `{ "id", "msg" }` from players, the bare payload from hosts.
    pub fn into_legacy_value(self) -> Value {
        match self {
            Self::Player { id, msg } => serde_json::json!({ "id": id, "msg": msg }),
            Self::Host(msg) => msg,
        }
    }
}

/// Where an outbound message goes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Every open host connection.
    Broadcast,
    /// One player, if still connected.
    ToPlayer(ConnectionId),
}

/// A message emitted by the core on a `send_<Tag>` channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    /// Delivery mode.
    pub delivery: Delivery,
    /// Opaque payload placed in the frame's `msg`.
    pub msg: Value,
}

#[derive(Deserialize)]
struct LegacyTargeted {
    id: ConnectionId,
    #[serde(default)]
    msg: Value,
}

impl Outbound {
    /// Broadcast to all hosts.
    pub fn broadcast(msg: Value) -> Self {
        Self {
            delivery: Delivery::Broadcast,
            msg,
        }
    }

    /// Send to one player.
    pub fn to_player(id: ConnectionId, msg: Value) -> Self {
        Self {
            delivery: Delivery::ToPlayer(id),
            msg,
        }
    }

    /// Interpret a value emitted on `send_<tag>` using the prefix convention.
    ///
    /// Tags starting with [`PLAYER_PREFIX`] expect `{ "id", "msg" }` and are
    /// targeted at that player; every other tag broadcasts `value` as is.
    pub fn from_legacy(tag: &str, value: Value) -> Result<Self> {
        if !is_player_addressed(tag) {
            return Ok(Self::broadcast(value));
        }
        let targeted: LegacyTargeted =
            serde_json::from_value(value).map_err(|e| RelayError::InvalidLegacyPayload {
                tag: tag.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self::to_player(targeted.id, targeted.msg))
    }
}
