//! Model registry and descriptors.
//!
//! [`KNOWN_MODELS`] is the single source of truth for the "Select model"
//! submenu and the `models` command. A [`ModelDescriptor`] names the remote
//! model a client talks to; it may also name a model outside the registry.

use std::fmt;

/// Information about a known LLM model.
pub struct ModelInfo {
    /// The model identifier string (e.g., "gpt-4o").
    pub name: &'static str,
    /// Context window size in tokens.
    pub context_window: usize,
}

/// Models offered in the selection menu.
pub const KNOWN_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "gpt-3.5-turbo-0125",
        context_window: 16_385,
    },
    ModelInfo {
        name: "gpt-4-turbo",
        context_window: 128_000,
    },
    ModelInfo {
        name: "gpt-4o",
        context_window: 128_000,
    },
];

/// Identifies which remote model to call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelDescriptor {
    name: String,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry entry for this model, if it is a known one.
    pub fn info(&self) -> Option<&'static ModelInfo> {
        KNOWN_MODELS.iter().find(|m| m.name == self.name)
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Models to offer for selection: the registry, plus `current` when it is
/// not part of it.
pub fn available_models(current: &ModelDescriptor) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = KNOWN_MODELS
        .iter()
        .map(|m| ModelDescriptor::new(m.name))
        .collect();
    if current.info().is_none() {
        models.push(current.clone());
    }
    models
}
