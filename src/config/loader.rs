//! File loading and persistence for gepetto configuration.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use toml_edit::{DocumentMut, Item};

use super::types::{default_model, Config};

/// Renders the config file written on first start.
fn default_toml() -> String {
    format!(
        r#"model = "{}"

[openai]
api_key = "{{env:{}}}"
proxy = ""
base_url = ""
"#,
        default_model(),
        crate::constants::API_KEY_ENV,
    )
}

impl Config {
    /// Parses a config document without substituting placeholders.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    /// Reads the config at `path`.
    ///
    /// If no file exists, creates one with sensible defaults (including an
    /// `{env:OPENAI_API_KEY}` placeholder for the API key) and returns it.
    pub(super) fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_toml = default_toml();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            tracing::info!(path = %path.display(), "wrote default config");
            return Self::parse(&default_toml);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config at {:?}", path))
    }

    /// Records `model` as the selected model in the file at `path`.
    ///
    /// Edits the raw document in place, so `{env:VAR}` placeholders, comments,
    /// unknown keys and key order all survive. The resolved in-memory config
    /// is never written back.
    pub fn persist_model(path: &Path, model: &str) -> Result<()> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        let mut value = toml_edit::Value::from(model);
        if let Some(old) = doc.get("model").and_then(Item::as_value) {
            *value.decor_mut() = old.decor().clone();
        }
        doc["model"] = Item::Value(value);
        fs::write(path, doc.to_string())
            .with_context(|| format!("Failed to write config to {:?}", path))
    }
}
