//! Moves messages between sockets and the channel bus.
//!
//! Inbound: a parsed frame `{tag, msg}` is published on `recv_<tag>`, with
//! the sender's id attached for players. Outbound: one subscriber task per
//! `send_<tag>` channel serializes each message once and queues it on the
//! target sockets.

use std::sync::Arc;

use metrics::counter;
use relay_core::{ConnectionId, Delivery, Envelope, Inbound, Outbound};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{ChannelBus, Subscription};
use crate::errors::RouteError;
use crate::metrics::{FRAMES_IN_TOTAL, FRAMES_OUT_TOTAL, TARGETED_DROPS_TOTAL};
use crate::registry::PlayerRegistry;
use crate::websocket::hosts::HostGroup;

/// Shared routing state: the bus plus both sides' connections.
pub struct MessageRouter {
    bus: Arc<ChannelBus>,
    players: Arc<PlayerRegistry>,
    hosts: Arc<HostGroup>,
}

impl MessageRouter {
    /// Create a router over `bus` with empty connection sets.
    pub fn new(bus: ChannelBus) -> Self {
        Self::with_parts(
            Arc::new(bus),
            Arc::new(PlayerRegistry::new()),
            Arc::new(HostGroup::new()),
        )
    }

    /// Create a router from existing parts.
    pub fn with_parts(bus: Arc<ChannelBus>, players: Arc<PlayerRegistry>, hosts: Arc<HostGroup>) -> Self {
        Self { bus, players, hosts }
    }

    /// The channel bus.
    pub fn bus(&self) -> &Arc<ChannelBus> {
        &self.bus
    }

    /// Connected players.
    pub fn players(&self) -> &Arc<PlayerRegistry> {
        &self.players
    }

    /// Connected hosts.
    pub fn hosts(&self) -> &Arc<HostGroup> {
        &self.hosts
    }

    /// Route a text frame from player `id` to `recv_<tag>` as `{id, msg}`.
    pub async fn route_player_frame(&self, id: &ConnectionId, frame: &str) -> Result<(), RouteError> {
        let envelope = parse(frame)?;
        let tag = envelope.tag;
        self.publish(
            &tag,
            Inbound::Player {
                id: id.clone(),
                msg: envelope.msg,
            },
        )
        .await
    }

    /// Route a text frame from a host to `recv_<tag>` as the bare payload.
    pub async fn route_host_frame(&self, frame: &str) -> Result<(), RouteError> {
        let envelope = parse(frame)?;
        let tag = envelope.tag;
        self.publish(&tag, Inbound::Host(envelope.msg)).await
    }

    async fn publish(&self, tag: &str, message: Inbound) -> Result<(), RouteError> {
        self.bus.publish(tag, message).await?;
        counter!(FRAMES_IN_TOTAL, "tag" => tag.to_owned()).increment(1);
        Ok(())
    }

    /// Deliver one message emitted on `send_<tag>`.
    ///
    /// The wire frame is `{tag, msg}`. Broadcasts go to every open host;
    /// targeted sends go to the player only while it is registered and open,
    /// and are silently dropped otherwise. Returns the number of sockets the
    /// frame was queued on.
    pub async fn deliver(&self, tag: &str, outbound: Outbound) -> usize {
        let frame = match Envelope::new(tag, outbound.msg).to_frame() {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                warn!(tag, error = %e, "failed to serialize outbound frame");
                return 0;
            }
        };

        match outbound.delivery {
            Delivery::Broadcast => {
                let sent = self.hosts.broadcast(frame).await;
                counter!(FRAMES_OUT_TOTAL, "delivery" => "broadcast").increment(sent as u64);
                sent
            }
            Delivery::ToPlayer(id) => {
                let Some(conn) = self.players.get(&id).filter(|conn| conn.is_open()) else {
                    debug!(player = %id, tag, "target player not connected, frame dropped");
                    counter!(TARGETED_DROPS_TOTAL).increment(1);
                    return 0;
                };
                if conn.send(frame) {
                    counter!(FRAMES_OUT_TOTAL, "delivery" => "player").increment(1);
                    1
                } else {
                    warn!(player = %id, tag, dropped = conn.drop_count(), "failed to queue frame for player");
                    0
                }
            }
        }
    }

    /// Start one delivery task per outbound channel.
    ///
    /// Tasks stop when `shutdown` is cancelled or the core drops the outlet.
    pub fn spawn_subscribers(self: &Arc<Self>, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        self.bus
            .take_subscriptions()
            .into_iter()
            .map(|sub| {
                let router = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { router.run_subscription(sub, shutdown).await })
            })
            .collect()
    }

    async fn run_subscription(&self, mut sub: Subscription, shutdown: CancellationToken) {
        debug!(tag = %sub.tag, "outbound subscriber started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = sub.rx.recv() => match next {
                    Some(outbound) => {
                        let _ = self.deliver(&sub.tag, outbound).await;
                    }
                    None => {
                        debug!(tag = %sub.tag, "outlet dropped, subscriber stopping");
                        break;
                    }
                },
            }
        }
    }
}

fn parse(frame: &str) -> Result<Envelope, RouteError> {
    Envelope::parse(frame).map_err(|e| RouteError::Malformed(e.to_string()))
}
