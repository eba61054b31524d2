//! LLM provider abstraction for gepetto.
//!
//! A [`LanguageModel`] performs one blocking chat-completion call. The
//! [`ModelClient`] wraps it with the user-facing behavior: announcing the
//! request, running it on a worker thread, classifying and reporting
//! failures, and delivering completions on the host's UI thread.
//! [`ActiveModel`] holds the client for the currently selected model and
//! rebuilds it when the user switches models.

mod active;
mod classify;
mod client;
mod openai;
mod resolve;

pub use active::ActiveModel;
pub use classify::{classify_error, user_message};
pub(crate) use classify::general_failure;
pub use client::{InFlightGuard, ModelClient};
pub use openai::{OpenAiFactory, OpenAiModel};
pub use resolve::resolve_model;

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{ConfigError, QueryError};
use crate::models::ModelDescriptor;

/// A prompt plus provider-specific options merged into the request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub prompt: String,
    pub options: Map<String, Value>,
}

impl Query {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: Map::new(),
        }
    }

    /// Adds a top-level request field such as `temperature`.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Asks the provider for a JSON object response.
    pub fn json_response(self) -> Self {
        self.with_option("response_format", json!({ "type": "json_object" }))
    }
}

/// A remote model that turns a prompt into a completion.
pub trait LanguageModel: Send + Sync {
    fn descriptor(&self) -> &ModelDescriptor;

    /// Sends `query` and blocks until the first completion's text arrives.
    fn complete(&self, query: &Query) -> Result<String, QueryError>;
}

/// Builds a [`LanguageModel`] for a descriptor from the active API settings.
pub trait ModelFactory: Send + Sync {
    fn build(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LanguageModel>, ConfigError>;
}

#[cfg(test)]
mod tests;
