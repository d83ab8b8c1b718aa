//! Error types for codecheck-llm

use codecheck_core::GenerationError;
use thiserror::Error;

/// Errors that can occur while talking to a chat-completions endpoint
#[derive(Error, Debug)]
pub enum LlmError {
    /// Client could not be built from the configuration
    #[error("LLM client is misconfigured: {0}")]
    Config(String),

    /// Endpoint could not be reached
    #[error("cannot connect to {0}")]
    Connect(String),

    /// Request exceeded the configured timeout
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Endpoint answered with no message content
    #[error("empty response from model")]
    EmptyResponse,

    /// Response text carried no JSON value
    #[error("no JSON found in model output: {0}")]
    Extract(String),

    /// Other transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response envelope did not parse
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) | Self::EmptyResponse | Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Config(_) | Self::Extract(_) | Self::Json(_) => false,
        }
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Config(_) | LlmError::Connect(_) => GenerationError::Unavailable(err.to_string()),
            LlmError::Status { status: 401 | 403, .. } => GenerationError::Unavailable(err.to_string()),
            LlmError::Timeout(ms) => GenerationError::Timeout(ms),
            LlmError::Extract(_) => GenerationError::Malformed(err.to_string()),
            other => GenerationError::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_unavailable() {
        let err: GenerationError = LlmError::Status {
            status: 401,
            body: "bad key".to_string(),
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_server_errors_are_retryable_but_not_fatal() {
        let err = LlmError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
        assert!(!GenerationError::from(err).is_fatal());
        assert!(!LlmError::Status {
            status: 400,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_extraction_failure_is_malformed() {
        let err: GenerationError = LlmError::Extract("plain prose".to_string()).into();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }
}
