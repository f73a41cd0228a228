//! # relay-settings
//!
//! Layered configuration for the relay server.
//!
//! Settings are resolved from four layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.relay/settings.json` or an explicit path (deep-merged)
//! 3. **Environment variables**: `PORT` and `RELAY_*` overrides
//! 4. **Command-line flags**: applied by the binary on top of the result

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
