//! Configuration types and path resolution for gepetto.
//!
//! Settings are stored as TOML at the platform's XDG config path
//! (e.g. `~/.config/gepetto/config.toml` on Linux). The loaded [`Config`]
//! is turned into [`ApiSettings`] once at startup; changing the API
//! configuration means building new settings, never mutating shared state.

mod loader;
mod paths;
mod resolve;
mod types;

pub use resolve::ApiSettings;
pub use types::{Config, OpenAiConfig};

use anyhow::Result;
use std::path::Path;

impl Config {
    /// Load config from the default XDG location.
    /// Creates a default config file if none exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit path, creating a default file there if missing.
    /// `{env:VAR}` placeholders are substituted from the process environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_create(path)?;
        config.resolve_substitutions(|var| std::env::var(var).ok());
        Ok(config)
    }
}
