//! Host connections, treated as one broadcast group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Opaque membership ticket returned by [`HostGroup::add`].
///
/// Hosts have no identity on the wire; the ticket only exists so a host can
/// leave the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostTicket(u64);

/// Every open host connection.
#[derive(Default)]
pub struct HostGroup {
    hosts: RwLock<HashMap<HostTicket, Arc<ClientConnection>>>,
    next_ticket: AtomicU64,
}

impl HostGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) -> HostTicket {
        let ticket = HostTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let _ = self.hosts.write().await.insert(ticket, connection);
        ticket
    }

    /// Remove a host connection. Unknown tickets are ignored.
    pub async fn remove(&self, ticket: HostTicket) {
        let _ = self.hosts.write().await.remove(&ticket);
    }

    /// Send one frame to every open host.
    ///
    /// Hosts that closed since the last membership change are skipped.
    /// Returns the number of hosts the frame was queued for.
    pub async fn broadcast(&self, frame: Arc<String>) -> usize {
        let hosts = self.hosts.read().await;
        let mut delivered = 0;
        for conn in hosts.values() {
            if !conn.is_open() {
                continue;
            }
            if conn.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                warn!(dropped = conn.drop_count(), "failed to queue frame for host");
            }
        }
        debug!(recipients = delivered, total = hosts.len(), "broadcast to hosts");
        delivered
    }

    /// Number of hosts in the group.
    pub async fn len(&self) -> usize {
        self.hosts.read().await.len()
    }

    /// Whether the group is empty.
    pub async fn is_empty(&self) -> bool {
        self.hosts.read().await.is_empty()
    }
}
