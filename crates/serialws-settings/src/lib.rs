//! # serialws-settings
//!
//! Layered configuration for the bridge.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SerialWsSettings::default()`]
//! 2. **Settings file**: `~/.serialws/settings.json` or an explicit path (deep-merged)
//! 3. **Environment variables**: `SERIALWS_*` overrides
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```no_run
//! use serialws_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on {}", settings.server.bind_address());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;
