//! Player connection registry.
//!
//! The registry is the single source of truth for "is this player still
//! connected". Entries are added when a player's upgrade completes and
//! removed in that player's own teardown. Removal returns the entry, which
//! lets the caller fire the "player left" notification exactly once.

use std::sync::Arc;

use dashmap::DashMap;
use relay_core::ConnectionId;

use crate::websocket::connection::ClientConnection;

/// Concurrent map of player id → live connection.
#[derive(Default)]
pub struct PlayerRegistry {
    players: DashMap<ConnectionId, Arc<ClientConnection>>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection for `id`.
    pub fn put(&self, id: ConnectionId, conn: Arc<ClientConnection>) {
        let _ = self.players.insert(id, conn);
    }

    /// Look up a player's connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.players.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a player. Removing an absent id is a no-op returning `None`.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.players.remove(id).map(|(_, conn)| conn)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.players.contains_key(id)
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no players are registered.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Signal every registered player to close.
    ///
    /// Entries stay in the map; each player's teardown removes itself.
    /// Returns how many connections were signalled.
    pub fn close_all(&self) -> usize {
        let conns: Vec<Arc<ClientConnection>> = self
            .players
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for conn in &conns {
            conn.close();
        }
        conns.len()
    }
}
