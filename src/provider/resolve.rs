//! Model selection precedence.

use crate::config::Config;
use crate::models::ModelDescriptor;

/// Resolve which model to use.
/// Priority: CLI flag > config.toml > default.
pub fn resolve_model(cli_model: Option<&str>, config: &Config) -> ModelDescriptor {
    let name = cli_model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| Some(config.model.trim()).filter(|m| !m.is_empty()))
        .unwrap_or(crate::constants::DEFAULT_MODEL);
    ModelDescriptor::new(name)
}
