//! # stul-settings
//!
//! Configuration for the relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: optional JSON file, deep-merged over defaults
//! 3. **Environment variables**: `BIND`, `AUTH` and `STUL_*` overrides
//!
//! The relay core only consumes the resulting `name → secret` map and the
//! session timings; where they came from is this crate's concern.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings_with, normalize_bind, parse_auth_keys,
    validate_session,
};
pub use types::*;
