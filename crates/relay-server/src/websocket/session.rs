//! Socket lifecycle for hosts and players, from upgrade through teardown.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, Role};
use crate::errors::RouteError;
use crate::metrics::{
    CASCADE_CLOSES_TOTAL, FRAMES_REJECTED_TOTAL, PLAYER_LEFT_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::router::MessageRouter;

/// What a session needs from the server.
#[derive(Clone)]
pub struct SessionContext {
    /// Routing state shared by every socket.
    pub router: Arc<MessageRouter>,
    /// Relay-wide shutdown signal.
    pub shutdown: CancellationToken,
    /// Outbound frames buffered per socket.
    pub send_queue_size: usize,
}

/// Why a socket's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    Transport(String),
    /// The relay closed the connection (host cascade or failed writer).
    ClosedByRelay,
    /// The relay is shutting down.
    Shutdown,
}

/// Run a player socket until it closes.
///
/// The player is registered under `id` for the whole session. On teardown it
/// is removed, and the player-left channel fires only if this call was the
/// one that removed it.
#[instrument(skip_all, fields(player = %id))]
pub async fn run_player_session(socket: WebSocket, id: ConnectionId, session_token: String, ctx: SessionContext) {
    let (tx, rx) = mpsc::channel(ctx.send_queue_size.max(1));
    let conn = Arc::new(ClientConnection::new(Role::Player(id.clone()), tx));
    ctx.router.players().put(id.clone(), Arc::clone(&conn));

    info!(session_token = %session_token, "player connected");
    opened("player");

    let reason = pump(socket, &conn, rx, &ctx).await;
    log_close(&reason, "player");

    if ctx.router.players().remove(&id).is_some() {
        counter!(PLAYER_LEFT_TOTAL).increment(1);
        let _ = ctx.router.bus().notify_player_left(id);
    }
    closed("player", &conn);
}

/// Run a host socket until it closes.
///
/// When a host leaves, every player is signalled to close.
#[instrument(skip_all, fields(role = "host"))]
pub async fn run_host_session(socket: WebSocket, ctx: SessionContext) {
    let (tx, rx) = mpsc::channel(ctx.send_queue_size.max(1));
    let conn = Arc::new(ClientConnection::new(Role::Host, tx));
    let ticket = ctx.router.hosts().add(Arc::clone(&conn)).await;

    info!("host connected");
    opened("host");

    let reason = pump(socket, &conn, rx, &ctx).await;
    log_close(&reason, "host");

    ctx.router.hosts().remove(ticket).await;
    let players = ctx.router.players().close_all();
    if players > 0 {
        info!(players, "host left, closing all players");
        counter!(CASCADE_CLOSES_TOTAL).increment(players as u64);
    }
    closed("host", &conn);
}

/// Drive one socket: a writer task drains the send queue while this task
/// reads frames and routes them in receipt order.
async fn pump(
    socket: WebSocket,
    conn: &Arc<ClientConnection>,
    mut rx: mpsc::Receiver<Arc<String>>,
    ctx: &SessionContext,
) -> CloseReason {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_token = conn.close_token();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = writer_token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                            writer_token.cancel();
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let reason = loop {
        let frame = tokio::select! {
            () = conn.closed() => break CloseReason::ClosedByRelay,
            () = ctx.shutdown.cancelled() => break CloseReason::Shutdown,
            frame = ws_rx.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break CloseReason::PeerClosed,
                Some(Err(e)) => break CloseReason::Transport(e.to_string()),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(frame)) => frame,
            },
        };
        let text = match &frame {
            Message::Text(text) => text.as_str(),
            Message::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    reject(&RouteError::Malformed(format!("{} bytes of non-UTF-8 binary", data.len())));
                    continue;
                }
            },
            _ => continue,
        };
        // A full recv_ channel must not hide a close signal.
        tokio::select! {
            biased;
            () = route(&ctx.router, &conn.role, text) => {}
            () = conn.closed() => break CloseReason::ClosedByRelay,
            () = ctx.shutdown.cancelled() => break CloseReason::Shutdown,
        }
    };

    conn.close();
    let _ = writer.await;
    reason
}

async fn route(router: &MessageRouter, role: &Role, frame: &str) {
    let result = match role {
        Role::Player(id) => router.route_player_frame(id, frame).await,
        Role::Host => router.route_host_frame(frame).await,
    };
    if let Err(e) = result {
        reject(&e);
    }
}

fn reject(err: &RouteError) {
    counter!(FRAMES_REJECTED_TOTAL, "reason" => err.kind()).increment(1);
    match err {
        RouteError::Malformed(_) => warn!(error = %err, "ignoring malformed frame"),
        RouteError::UnknownTag(tag) => warn!(tag = %tag, "ignoring frame with unregistered tag"),
        RouteError::ChannelClosed(tag) => warn!(tag = %tag, "core stopped listening, frame dropped"),
    }
}

fn log_close(reason: &CloseReason, role: &'static str) {
    match reason {
        CloseReason::Transport(error) => warn!(role, error = %error, "connection lost"),
        CloseReason::PeerClosed => info!(role, "peer closed connection"),
        CloseReason::ClosedByRelay => info!(role, "connection closed by relay"),
        CloseReason::Shutdown => debug!(role, "connection closed for shutdown"),
    }
}

fn opened(role: &'static str) {
    counter!(WS_CONNECTIONS_TOTAL, "role" => role).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role).increment(1.0);
}

fn closed(role: &'static str, conn: &ClientConnection) {
    counter!(WS_DISCONNECTIONS_TOTAL, "role" => role).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "role" => role).record(conn.age().as_secs_f64());
    info!(role, dropped_frames = conn.drop_count(), "disconnected");
}
