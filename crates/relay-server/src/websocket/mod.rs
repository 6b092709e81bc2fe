//! WebSocket connections: per-socket handles, the host group, and session loops.

pub mod connection;
pub mod hosts;
pub mod session;
