//! Error types shared across the model client and plugin shell.

use thiserror::Error;

/// Failure to build a model client from the current configuration.
///
/// Raised before any network traffic and fatal to plugin initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No valid OpenAI API key found. Set OPENAI_API_KEY or add api_key to the [openai] section of the config file")]
    MissingApiKey,

    #[error("Invalid proxy URL {url}: {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Classified failure of a single chat-completion request.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The prompt did not fit in the model's context window.
    #[error("{0}")]
    ContextLengthExceeded(String),

    /// HTTP 400 for any other reason.
    #[error("{0}")]
    BadRequest(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// A success status whose body could not be interpreted.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}
