//! Classification of provider failures and the messages shown for them.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::constants::FUNCTION_TOO_BIG_MSG;
use crate::error::QueryError;
use crate::models::ModelDescriptor;

/// Matches both the legacy and the current context-window wording.
static CONTEXT_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)maximum context length is \d+ tokens[.,]?\s*however,?\s*(?:you requested|your messages resulted in) \d+ tokens",
    )
    .expect("context length pattern is valid")
});

const CONTEXT_LENGTH_CODE: &str = "context_length_exceeded";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Turns a non-success HTTP response into a [`QueryError`].
///
/// Context-length failures are recognized from the error text (or the
/// `context_length_exceeded` code); other 400s are bad requests; anything
/// else is a provider error carrying the status.
pub fn classify_error(status: u16, body: &str) -> QueryError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .code
                .and_then(|c| c.as_str().map(String::from)),
        ),
        Err(_) => (body.trim().to_string(), None),
    };
    let message = if message.is_empty() {
        format!("HTTP {status} with empty body")
    } else {
        message
    };

    if code.as_deref() == Some(CONTEXT_LENGTH_CODE) || CONTEXT_LENGTH.is_match(&message) {
        return QueryError::ContextLengthExceeded(message);
    }
    if status == 400 {
        return QueryError::BadRequest(message);
    }
    QueryError::Provider { status, message }
}

/// Message printed in the host's output window for a failed query.
pub fn user_message(err: &QueryError, model: &ModelDescriptor) -> String {
    match err {
        QueryError::ContextLengthExceeded(_) => FUNCTION_TOO_BIG_MSG.to_string(),
        QueryError::Provider { .. } | QueryError::Transport(_) => {
            format!("{model} could not complete the request: {err}")
        }
        QueryError::BadRequest(_) | QueryError::InvalidResponse(_) => general_failure(err),
    }
}

/// Message for failures that fit no other category.
pub(crate) fn general_failure(error: impl std::fmt::Display) -> String {
    format!("General exception encountered while running the query: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn openai_error(message: &str, code: Option<&str>) -> String {
        json!({
            "error": {
                "message": message,
                "type": "invalid_request_error",
                "param": "messages",
                "code": code,
            }
        })
        .to_string()
    }

    #[test]
    fn test_legacy_context_length_wording() {
        let body = openai_error(
            "This model's maximum context length is 4097 tokens, however you requested 5360 tokens \
             (5104 in your prompt; 256 for the completion).",
            None,
        );
        assert!(matches!(
            classify_error(400, &body),
            QueryError::ContextLengthExceeded(_)
        ));
    }

    #[test]
    fn test_current_context_length_wording() {
        let body = openai_error(
            "This model's maximum context length is 8192 tokens. However, your messages resulted in 9120 tokens. \
             Please reduce the length of the messages.",
            None,
        );
        assert!(matches!(
            classify_error(400, &body),
            QueryError::ContextLengthExceeded(_)
        ));
    }

    #[test]
    fn test_context_length_code() {
        let body = openai_error("Too long.", Some("context_length_exceeded"));
        assert!(matches!(
            classify_error(400, &body),
            QueryError::ContextLengthExceeded(_)
        ));
    }

    #[test]
    fn test_other_bad_request() {
        let body = openai_error("'messages' must contain the word 'json'", None);
        match classify_error(400, &body) {
            QueryError::BadRequest(msg) => assert!(msg.contains("json")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_provider_error_keeps_status_and_raw_body() {
        match classify_error(502, "upstream connect error") {
            QueryError::Provider { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream connect error");
            }
            other => panic!("unexpected {other:?}"),
        }
        match classify_error(429, "") {
            QueryError::Provider { message, .. } => assert!(message.contains("429")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_messages() {
        let model = ModelDescriptor::new("gpt-4o");
        let too_big = QueryError::ContextLengthExceeded("x".into());
        assert_eq!(user_message(&too_big, &model), FUNCTION_TOO_BIG_MSG);

        let provider = QueryError::Provider {
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(
            user_message(&provider, &model),
            "gpt-4o could not complete the request: HTTP 401: Incorrect API key provided"
        );

        let bad = QueryError::BadRequest("invalid option".into());
        assert_eq!(
            user_message(&bad, &model),
            "General exception encountered while running the query: invalid option"
        );
    }
}
