//! Environment variable substitution and API settings resolution.

use std::fmt;

use super::types::Config;
use crate::constants::{API_KEY_ENV, DEFAULT_BASE_URL};
use crate::error::ConfigError;

/// Everything needed to talk to the chat-completion endpoint.
///
/// Built once from a [`Config`]; at most one is active at a time.
#[derive(Clone)]
pub struct ApiSettings {
    pub api_key: String,
    pub proxy: Option<String>,
    /// Base URL without a trailing slash.
    pub base_url: String,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &"<redacted>")
            .field("proxy", &self.proxy)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Returns the trimmed value when it is present and not blank.
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.model = Self::resolve_str(&self.model, &lookup);
        for field in [
            &mut self.openai.api_key,
            &mut self.openai.proxy,
            &mut self.openai.base_url,
        ] {
            if let Some(value) = field {
                *value = Self::resolve_str(value, &lookup);
            }
        }
    }

    /// Replace {env:VAR} with the variable's value, or nothing when unset.
    fn resolve_str<F>(s: &str, lookup: &F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find("{env:") {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            result.push_str(&rest[..start]);
            let var_name = &rest[start + 5..start + end];
            // Substituted values are not scanned again.
            result.push_str(&lookup(var_name).unwrap_or_default());
            rest = &rest[start + end + 1..];
        }
        result.push_str(rest);
        result
    }

    /// Builds [`ApiSettings`], falling back to `OPENAI_API_KEY` for the key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when neither the config nor
    /// the environment provides a key.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        self.api_settings_with(|var| std::env::var(var).ok())
    }

    /// Like [`Config::api_settings`] with an explicit environment lookup.
    pub fn api_settings_with<F>(&self, env: F) -> Result<ApiSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Config file first, environment second.
        let api_key = non_empty(&self.openai.api_key)
            .or_else(|| non_empty(&env(API_KEY_ENV)))
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = non_empty(&self.openai.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(ApiSettings {
            api_key,
            proxy: non_empty(&self.openai.proxy),
            base_url,
        })
    }
}
