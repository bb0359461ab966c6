//! Error types for model collaborators.

use curator_core::error::CuratorError;

/// Errors from scoring and embedding collaborators.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("empty input")]
    EmptyInput,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::Unavailable(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::Config(_) | LlmError::EmptyInput => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::InvalidResponse(err.to_string())
    }
}

impl From<LlmError> for CuratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Config(message) => CuratorError::Config(message),
            other => CuratorError::Provider(other.to_string()),
        }
    }
}
