//! # relay-settings
//!
//! Configuration for the relay, loaded in layers (lowest priority first):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.relay/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `RELAY_*` overrides
//!
//! Command-line flags in the binary are applied on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::{ChannelSettings, LoggingSettings, RelaySettings, ServerSettings};
