//! Named channels between the relay and the application core.
//!
//! The relay publishes on `recv_<Tag>` channels and the special player-left
//! channel; the core publishes on `send_<Tag>` channels through [`Outlet`]s.
//! Channels are registered once at startup by [`ChannelBusBuilder`] and are
//! fixed afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use relay_core::{ChannelName, ConnectionId, Inbound, Outbound, RelayError, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::RouteError;

/// Registers channels before the relay starts.
pub struct ChannelBusBuilder {
    capacity: usize,
    inbound: Vec<String>,
    outbound: Vec<String>,
    seen: HashSet<ChannelName>,
}

impl ChannelBusBuilder {
    /// Start a builder whose channels each buffer `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inbound: Vec::new(),
            outbound: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Register a channel by its full name (`recv_<Tag>` or `send_<Tag>`).
    pub fn register(mut self, name: &str) -> Result<Self> {
        let parsed = ChannelName::parse(name)?;
        if !self.seen.insert(parsed.clone()) {
            return Err(RelayError::DuplicateChannel(name.to_owned()));
        }
        match parsed {
            ChannelName::Inbound(tag) => self.inbound.push(tag),
            ChannelName::Outbound(tag) => self.outbound.push(tag),
        }
        Ok(self)
    }

    /// Register every name in order, stopping at the first error.
    pub fn register_all<I, S>(self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_fold(self, |builder, name| builder.register(name.as_ref()))
    }

    /// Register `recv_<tag>`.
    pub fn inbound(self, tag: &str) -> Result<Self> {
        self.register(&format!("{}{tag}", relay_core::envelope::RECV_PREFIX))
    }

    /// Register `send_<tag>`.
    pub fn outbound(self, tag: &str) -> Result<Self> {
        self.register(&format!("{}{tag}", relay_core::envelope::SEND_PREFIX))
    }

    /// Create the channels.
    ///
    /// The [`ChannelBus`] half belongs to the relay, the [`CoreChannels`]
    /// half to the application core.
    pub fn build(self) -> (ChannelBus, CoreChannels) {
        let mut inbound_tx = HashMap::new();
        let mut inbound_rx = HashMap::new();
        for tag in self.inbound {
            let (tx, rx) = mpsc::channel(self.capacity);
            let _ = inbound_tx.insert(tag.clone(), tx);
            let _ = inbound_rx.insert(tag, rx);
        }

        let mut outlets = HashMap::new();
        let mut subscriptions = Vec::new();
        for tag in self.outbound {
            let (tx, rx) = mpsc::channel(self.capacity);
            let _ = outlets.insert(
                tag.clone(),
                Outlet {
                    tag: Arc::from(tag.as_str()),
                    tx,
                },
            );
            subscriptions.push(Subscription { tag, rx });
        }

        let (left_tx, left_rx) = mpsc::unbounded_channel();

        let bus = ChannelBus {
            inbound: inbound_tx,
            player_left: left_tx,
            subscriptions: Mutex::new(Some(subscriptions)),
        };
        let core = CoreChannels {
            inbound: inbound_rx,
            player_left: Some(left_rx),
            outlets,
        };
        (bus, core)
    }
}

/// One outbound channel's receiving end, consumed by the router.
pub struct Subscription {
    /// Channel tag without the `send_` prefix.
    pub tag: String,
    /// Messages the core emitted on `send_<tag>`.
    pub rx: mpsc::Receiver<Outbound>,
}

/// The relay's half of the bus.
pub struct ChannelBus {
    inbound: HashMap<String, mpsc::Sender<Inbound>>,
    // Unbounded so a player's teardown never waits on the core.
    player_left: mpsc::UnboundedSender<ConnectionId>,
    subscriptions: Mutex<Option<Vec<Subscription>>>,
}

impl ChannelBus {
    /// Whether `recv_<tag>` is registered.
    pub fn has_inbound(&self, tag: &str) -> bool {
        self.inbound.contains_key(tag)
    }

    /// Registered inbound tags.
    pub fn inbound_tags(&self) -> Vec<String> {
        self.inbound.keys().cloned().collect()
    }

    /// Publish on `recv_<tag>`.
    ///
    /// Waits while the channel is full, which preserves per-connection order.
    pub async fn publish(&self, tag: &str, message: Inbound) -> std::result::Result<(), RouteError> {
        let Some(tx) = self.inbound.get(tag) else {
            return Err(RouteError::UnknownTag(tag.to_owned()));
        };
        tx.send(message)
            .await
            .map_err(|_| RouteError::ChannelClosed(tag.to_owned()))
    }

    /// Publish a player id on the player-left channel.
    ///
    /// Returns `false` if the core has dropped the receiver.
    pub fn notify_player_left(&self, id: ConnectionId) -> bool {
        match self.player_left.send(id) {
            Ok(()) => true,
            Err(mpsc::error::SendError(id)) => {
                debug!(player = %id, "player-left receiver dropped, notification discarded");
                false
            }
        }
    }

    /// Hand the outbound receivers to their single subscriber.
    ///
    /// Only the first call gets them; later calls return an empty list.
    pub fn take_subscriptions(&self) -> Vec<Subscription> {
        match self.subscriptions.lock().take() {
            Some(subs) => subs,
            None => {
                warn!("outbound subscriptions already taken");
                Vec::new()
            }
        }
    }
}

/// The application core's half of the bus.
pub struct CoreChannels {
    inbound: HashMap<String, mpsc::Receiver<Inbound>>,
    player_left: Option<mpsc::UnboundedReceiver<ConnectionId>>,
    outlets: HashMap<String, Outlet>,
}

impl CoreChannels {
    /// Take the receiver for `recv_<tag>`. Each receiver can be taken once.
    pub fn take_inbound(&mut self, tag: &str) -> Option<mpsc::Receiver<Inbound>> {
        self.inbound.remove(tag)
    }

    /// Take the player-left receiver. It can be taken once.
    pub fn take_player_left(&mut self) -> Option<mpsc::UnboundedReceiver<ConnectionId>> {
        self.player_left.take()
    }

    /// Outlet for `send_<tag>`.
    pub fn outlet(&self, tag: &str) -> Option<Outlet> {
        self.outlets.get(tag).cloned()
    }

    /// Outlet for `send_<tag>`, or [`RelayError::UnknownChannel`].
    pub fn require_outlet(&self, tag: &str) -> Result<Outlet> {
        self.outlet(tag).ok_or_else(|| {
            RelayError::UnknownChannel(format!("{}{tag}", relay_core::envelope::SEND_PREFIX))
        })
    }

    /// Inbound tags whose receivers have not been taken.
    pub fn inbound_tags(&self) -> Vec<String> {
        self.inbound.keys().cloned().collect()
    }

    /// Registered outbound tags.
    pub fn outlet_tags(&self) -> Vec<String> {
        self.outlets.keys().cloned().collect()
    }
}

/// Sending end of one `send_<tag>` channel.
#[derive(Clone)]
pub struct Outlet {
    tag: Arc<str>,
    tx: mpsc::Sender<Outbound>,
}

impl Outlet {
    /// Channel tag without the `send_` prefix.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Emit a message with an explicit delivery mode.
    pub async fn emit(&self, message: Outbound) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| RelayError::ChannelClosed(format!("send_{}", self.tag)))
    }

    /// Broadcast `msg` to every host.
    pub async fn broadcast(&self, msg: Value) -> Result<()> {
        self.emit(Outbound::broadcast(msg)).await
    }

    /// Send `msg` to one player.
    pub async fn to_player(&self, id: ConnectionId, msg: Value) -> Result<()> {
        self.emit(Outbound::to_player(id, msg)).await
    }

    /// Emit a raw value, inferring the delivery mode from this outlet's tag.
    pub async fn emit_legacy(&self, value: Value) -> Result<()> {
        let message = Outbound::from_legacy(&self.tag, value)?;
        self.emit(message).await
    }
}
