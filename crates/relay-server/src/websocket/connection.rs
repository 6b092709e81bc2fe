//! Live WebSocket connection handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use relay_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Which side of the relay a connection belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// A host viewer. Hosts share one broadcast group and have no id.
    Host,
    /// A player, addressed by its id.
    Player(ConnectionId),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Player(id) => write!(f, "player:{id}"),
        }
    }
}

/// Handle to one connected socket.
///
/// Frames are queued on a bounded channel drained by the socket's writer
/// task. [`close`](Self::close) signals both the reader loop and the writer.
pub struct ClientConnection {
    /// Role assigned at upgrade.
    pub role: Role,
    tx: mpsc::Sender<Arc<String>>,
    closer: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection around the writer's queue.
    pub fn new(role: Role, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            role,
            tx,
            closer: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the connection is closing, or its queue is full or
    /// gone. A full queue counts as a dropped message.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether frames can still be delivered.
    pub fn is_open(&self) -> bool {
        !self.closer.is_cancelled() && !self.tx.is_closed()
    }

    /// Ask the connection to close. Idempotent.
    pub fn close(&self) {
        self.closer.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closer.cancelled()
    }

    /// Token observed by the connection's tasks.
    pub fn close_token(&self) -> CancellationToken {
        self.closer.clone()
    }

    /// Frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
