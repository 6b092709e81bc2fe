//! Built-in forwarding core.
//!
//! Lets the relay run without an application attached:
//! - player messages on `recv_<Tag>` are broadcast to hosts on `send_<Tag>` as `{id, msg}`
//! - host messages on `recv_<Tag>` are re-emitted on `send_<Tag>` with the
//!   `Player` prefix convention, so `{id, msg}` on a `Player*` tag reaches that player
//! - departures are broadcast on `send_PlayerLeft` as the player's id

use relay_core::{ConnectionId, Inbound};
use relay_server::{CoreChannels, Outlet};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outbound tag announcing departures.
pub const PLAYER_LEFT_TAG: &str = "PlayerLeft";

/// Spawn one forwarding task per inbound channel, plus one for departures.
pub fn spawn(mut core: CoreChannels, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for tag in core.inbound_tags() {
        let Some(rx) = core.take_inbound(&tag) else {
            continue;
        };
        let outlet = match core.require_outlet(&tag) {
            Ok(outlet) => Some(outlet),
            Err(e) => {
                warn!(tag = %tag, error = %e, "inbound messages on this tag will be dropped");
                None
            }
        };
        handles.push(tokio::spawn(forward_inbound(tag, rx, outlet, shutdown.clone())));
    }

    if let Some(left) = core.take_player_left() {
        handles.push(tokio::spawn(forward_departures(
            left,
            core.outlet(PLAYER_LEFT_TAG),
            shutdown.clone(),
        )));
    }

    info!(tasks = handles.len(), "forwarding core started");
    handles
}

async fn forward_inbound(
    tag: String,
    mut rx: mpsc::Receiver<Inbound>,
    outlet: Option<Outlet>,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        let Some(outlet) = &outlet else {
            debug!(tag = %tag, "dropping inbound message");
            continue;
        };
        let result = match message {
            player @ Inbound::Player { .. } => outlet.broadcast(player.into_legacy_value()).await,
            Inbound::Host(value) => outlet.emit_legacy(value).await,
        };
        if let Err(e) = result {
            warn!(tag = %tag, error = %e, "forwarding failed");
        }
    }
    debug!(tag = %tag, "forwarder stopped");
}

async fn forward_departures(
    mut left: mpsc::UnboundedReceiver<ConnectionId>,
    outlet: Option<Outlet>,
    shutdown: CancellationToken,
) {
    loop {
        let id = tokio::select! {
            () = shutdown.cancelled() => break,
            next = left.recv() => match next {
                Some(id) => id,
                None => break,
            },
        };
        info!(player = %id, "player left");
        if let Some(outlet) = &outlet {
            if let Err(e) = outlet.broadcast(Value::String(id.into_inner())).await {
                warn!(error = %e, "failed to announce departure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Delivery, Outbound};
    use relay_server::ChannelBusBuilder;
    use relay_server::bus::{ChannelBus, Subscription};
    use serde_json::json;
    use std::time::Duration;

    fn start(names: &[&str]) -> (ChannelBus, Vec<Subscription>, CancellationToken) {
        let (bus, core) = ChannelBusBuilder::new(8).register_all(names).unwrap().build();
        let subs = bus.take_subscriptions();
        let shutdown = CancellationToken::new();
        let _ = spawn(core, &shutdown);
        (bus, subs, shutdown)
    }

    async fn next(subs: &mut [Subscription], tag: &str) -> Outbound {
        let sub = subs.iter_mut().find(|s| s.tag == tag).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sub.rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn player_messages_are_broadcast_with_sender() {
        let (bus, mut subs, _shutdown) = start(&["recv_Message", "send_Message"]);
        bus.publish(
            "Message",
            Inbound::Player {
                id: "p1".into(),
                msg: json!("hi"),
            },
        )
        .await
        .unwrap();

        let out = next(&mut subs, "Message").await;
        assert_eq!(out.delivery, Delivery::Broadcast);
        assert_eq!(out.msg, json!({"id": "p1", "msg": "hi"}));
    }

    #[tokio::test]
    async fn host_messages_on_player_tags_are_targeted() {
        let (bus, mut subs, _shutdown) = start(&["recv_PlayerMessage", "send_PlayerMessage"]);
        bus.publish("PlayerMessage", Inbound::Host(json!({"id": "p7", "msg": 42})))
            .await
            .unwrap();

        let out = next(&mut subs, "PlayerMessage").await;
        assert_eq!(out.delivery, Delivery::ToPlayer("p7".into()));
        assert_eq!(out.msg, json!(42));
    }

    #[tokio::test]
    async fn departures_are_announced() {
        let (bus, mut subs, _shutdown) = start(&["send_PlayerLeft"]);
        assert!(bus.notify_player_left("p3".into()));

        let out = next(&mut subs, PLAYER_LEFT_TAG).await;
        assert_eq!(out.delivery, Delivery::Broadcast);
        assert_eq!(out.msg, json!("p3"));
    }

    #[tokio::test]
    async fn inbound_without_outlet_is_dropped() {
        let (bus, subs, _shutdown) = start(&["recv_Ping"]);
        assert!(subs.is_empty());
        bus.publish("Ping", Inbound::Host(json!(1))).await.unwrap();
    }

    #[tokio::test]
    async fn tasks_stop_on_shutdown() {
        let (_bus, core) = ChannelBusBuilder::new(8)
            .register_all(["recv_Message", "send_Message"])
            .unwrap()
            .build();
        let shutdown = CancellationToken::new();
        let handles = spawn(core, &shutdown);
        assert_eq!(handles.len(), 2);

        shutdown.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
