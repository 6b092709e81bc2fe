//! Routing errors.
//!
//! None of these close a connection. The session loop logs them and moves on
//! to the next frame.

use thiserror::Error;

/// Why an inbound frame was not delivered to the core.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The frame is not a `{"tag", "msg"}` object (or not UTF-8).
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// No `recv_<tag>` channel is registered.
    #[error("no inbound channel registered for tag `{0}`")]
    UnknownTag(String),

    /// The core dropped the receiving end of `recv_<tag>`.
    #[error("inbound channel for tag `{0}` is closed")]
    ChannelClosed(String),
}

impl RouteError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownTag(_) => "unknown_tag",
            Self::ChannelClosed(_) => "channel_closed",
        }
    }
}
