//! Player connection identifiers.
//!
//! A [`ConnectionId`] is [`CONNECTION_ID_BYTES`] bytes read from the
//! operating system's randomness source and hex-encoded. Generation keeps no
//! sequence state, so ids are unguessable and never need coordination.

use std::fmt::{self, Write as _};

use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, Result};

/// Random bytes per connection id (128 bits).
pub const CONNECTION_ID_BYTES: usize = 16;

/// Opaque identifier of one player connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Draw a fresh id from the OS randomness source.
    ///
    /// Fails with [`RelayError::Entropy`] if the source is unavailable.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; CONNECTION_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RelayError::Entropy(e.to_string()))?;
        Ok(Self(encode_hex(&bytes)))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

impl std::ops::Deref for ConnectionId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}
