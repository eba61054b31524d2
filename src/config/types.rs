//! Struct definitions and serde defaults for gepetto configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for gepetto, deserialized from `config.toml`.
///
/// Fields use serde defaults so the plugin can start from an empty file.
/// Empty strings are treated the same as absent values.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Model used for queries until the user picks another one.
    #[serde(default = "default_model")]
    pub model: String,
    /// Connection settings for the chat-completion API.
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// Returns the default model identifier.
///
/// Used by serde's `#[serde(default)]` attribute during deserialization.
pub(super) fn default_model() -> String {
    crate::constants::DEFAULT_MODEL.to_string()
}

/// Connection details for the OpenAI-compatible endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OpenAiConfig {
    /// API key. Falls back to `OPENAI_API_KEY` when empty.
    pub api_key: Option<String>,
    /// Proxy URL applied to every request (e.g. `http://127.0.0.1:8080`).
    pub proxy: Option<String>,
    /// Custom base URL, including the version segment (e.g. `http://localhost:1234/v1`).
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            openai: OpenAiConfig::default(),
        }
    }
}
