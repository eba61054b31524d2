//! Chat-completion client for OpenAI-compatible endpoints.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::classify::classify_error;
use super::{LanguageModel, ModelFactory, Query};
use crate::config::ApiSettings;
use crate::constants::REQUEST_TIMEOUT;
use crate::error::{ConfigError, QueryError};
use crate::models::ModelDescriptor;

/// Request fields owned by the client; options cannot override them.
const RESERVED_FIELDS: &[&str] = &["model", "messages"];

/// Builds [`OpenAiModel`]s that share one HTTP client.
///
/// The HTTP client (with its proxy) is constructed once per API
/// configuration and is read-only afterwards.
pub struct OpenAiFactory {
    http: reqwest::blocking::Client,
    settings: Arc<ApiSettings>,
}

impl OpenAiFactory {
    /// # Errors
    ///
    /// Fails if the proxy URL is invalid or the HTTP client cannot be built.
    pub fn new(settings: ApiSettings) -> Result<Self, ConfigError> {
        Self::with_timeout(settings, REQUEST_TIMEOUT)
    }

    /// Like [`OpenAiFactory::new`] with an explicit per-request timeout.
    pub fn with_timeout(settings: ApiSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        if let Some(url) = &settings.proxy {
            let proxy = reqwest::Proxy::all(url.as_str()).map_err(|source| {
                ConfigError::InvalidProxy {
                    url: url.clone(),
                    source,
                }
            })?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().map_err(ConfigError::HttpClient)?;
        debug!(
            base_url = %settings.base_url,
            proxied = settings.proxy.is_some(),
            timeout_secs = timeout.as_secs(),
            "http client ready"
        );
        Ok(Self {
            http,
            settings: Arc::new(settings),
        })
    }
}

impl ModelFactory for OpenAiFactory {
    fn build(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        Ok(Arc::new(OpenAiModel {
            http: self.http.clone(),
            settings: Arc::clone(&self.settings),
            descriptor: descriptor.clone(),
        }))
    }
}

/// One model reachable through the chat-completion API.
pub struct OpenAiModel {
    http: reqwest::blocking::Client,
    settings: Arc<ApiSettings>,
    descriptor: ModelDescriptor,
}

impl OpenAiModel {
    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

impl LanguageModel for OpenAiModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn complete(&self, query: &Query) -> Result<String, QueryError> {
        let url = self.chat_completions_url();
        let body = build_request(self.descriptor.name(), query);
        debug!(
            model = %self.descriptor,
            %url,
            prompt_chars = query.prompt.len(),
            "sending chat completion"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            let err = classify_error(status.as_u16(), &text);
            warn!(
                model = %self.descriptor,
                status = status.as_u16(),
                error = %err,
                "chat completion failed"
            );
            return Err(err);
        }
        parse_completion(&text)
    }
}

/// Request body: the model, a single user message, and the query's options.
fn build_request(model: &str, query: &Query) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [
            { "role": "user", "content": query.prompt }
        ],
    });
    if let Value::Object(fields) = &mut body {
        for (key, value) in &query.options {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                warn!(option = %key, "ignoring option that would replace a request field");
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
    }
    body
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Extracts the first choice's content from a success body.
fn parse_completion(body: &str) -> Result<String, QueryError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| QueryError::InvalidResponse(format!("failed to parse response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| QueryError::InvalidResponse("no choices in response".into()))?
        .message
        .content
        .ok_or_else(|| QueryError::InvalidResponse("completion has no content".into()))
}
