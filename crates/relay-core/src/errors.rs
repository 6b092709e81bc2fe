//! Relay error types.

use thiserror::Error;

/// Errors raised by the relay's shared types and the channel bus.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The operating system's randomness source could not be read.
    ///
    /// Without it no player can be issued an id, so callers must surface
    /// this instead of retrying silently.
    #[error("randomness source unavailable: {0}")]
    Entropy(String),

    /// A channel name did not start with `recv_` or `send_`, or had an empty tag.
    #[error("invalid channel name `{0}`: expected `recv_<Tag>` or `send_<Tag>`")]
    InvalidChannelName(String),

    /// The same channel was registered twice.
    #[error("channel `{0}` is already registered")]
    DuplicateChannel(String),

    /// No channel is registered under this name.
    #[error("no channel registered for `{0}`")]
    UnknownChannel(String),

    /// The other end of a channel has been dropped.
    #[error("channel `{0}` is closed")]
    ChannelClosed(String),

    /// A player-addressed payload did not carry `{ "id", "msg" }`.
    #[error("payload on `{tag}` must be an object with `id` and `msg`: {reason}")]
    InvalidLegacyPayload {
        /// Tag of the channel the payload was emitted on.
        tag: String,
        /// Why the payload was rejected.
        reason: String,
    },
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_display() {
        let err = RelayError::Entropy("getrandom failed".into());
        assert_eq!(err.to_string(), "randomness source unavailable: getrandom failed");
    }

    #[test]
    fn invalid_channel_name_display() {
        let err = RelayError::InvalidChannelName("server_PlayerLeft".into());
        assert!(err.to_string().contains("server_PlayerLeft"));
        assert!(err.to_string().contains("recv_<Tag>"));
    }

    #[test]
    fn legacy_payload_display() {
        let err = RelayError::InvalidLegacyPayload {
            tag: "PlayerMove".into(),
            reason: "missing field `id`".into(),
        };
        let text = err.to_string();
        assert!(text.contains("PlayerMove"));
        assert!(text.contains("missing field `id`"));
    }
}
