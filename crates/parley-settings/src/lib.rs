//! # parley-settings
//!
//! Layered configuration for the parley call bridge.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`ParleySettings::default()`]
//! 2. **User file** — `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `PARLEY_*` overrides (highest priority)
//!
//! Secrets (the generative backend API key) are never part of the settings
//! file; they are read from the environment at start-up.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
