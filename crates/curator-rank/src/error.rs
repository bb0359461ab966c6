use curator_core::error::CuratorError;
use curator_llm::LlmError;
use thiserror::Error;

/// Errors raised inside the ranking engine.
///
/// Only `Config` leaves the public pipeline operations; the rest drive
/// fallback paths and are logged where they are recovered.
#[derive(Error, Debug)]
pub enum RankError {
    #[error("batch scoring failed: {0}")]
    BatchScoring(String),
    #[error("item scoring failed: {0}")]
    ItemScoring(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("config error: {0}")]
    Config(String),
}

impl From<CuratorError> for RankError {
    fn from(err: CuratorError) -> Self {
        match err {
            CuratorError::Config(message) => RankError::Config(message),
            other => RankError::Config(other.to_string()),
        }
    }
}

impl From<RankError> for CuratorError {
    fn from(err: RankError) -> Self {
        match err {
            RankError::Config(message) => CuratorError::Config(message),
            other => CuratorError::Ranking(other.to_string()),
        }
    }
}

impl RankError {
    /// Wrap a collaborator error raised while embedding.
    pub fn embedding(err: LlmError) -> Self {
        RankError::Embedding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = RankError::BatchScoring("expected 20 scores, got 19".to_string());
        assert_eq!(e.to_string(), "batch scoring failed: expected 20 scores, got 19");

        let e = RankError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            e.to_string(),
            "embedding dimension mismatch: expected 768, got 384"
        );
    }

    #[test]
    fn test_config_roundtrip_through_curator_error() {
        let core = CuratorError::Config("top_n must be positive".to_string());
        let rank: RankError = core.into();
        assert!(matches!(rank, RankError::Config(ref m) if m == "top_n must be positive"));

        let back: CuratorError = rank.into();
        assert!(matches!(back, CuratorError::Config(_)));
    }

    #[test]
    fn test_runtime_failures_keep_their_label() {
        let err: CuratorError = RankError::Embedding("connection refused".into()).into();
        assert!(matches!(err, CuratorError::Ranking(_)));
        assert!(err.to_string().starts_with("Ranking error: embedding failed"));
    }

    #[test]
    fn test_embedding_from_llm_error() {
        let e = RankError::embedding(LlmError::Unavailable("connection refused".into()));
        assert!(matches!(e, RankError::Embedding(_)));
        assert!(e.to_string().contains("connection refused"));
    }
}
