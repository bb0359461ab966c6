use thiserror::Error;

/// Top-level error type for the curator workspace.
///
/// Subsystem crates define their own error types and convert into this one
/// at the binary boundary, so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CuratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// A scoring or embedding provider failed (transport, API, bad response).
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Ranking error: {0}")]
    Ranking(String),
}

impl From<toml::de::Error> for CuratorError {
    fn from(err: toml::de::Error) -> Self {
        CuratorError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CuratorError {
    fn from(err: toml::ser::Error) -> Self {
        CuratorError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CuratorError {
    fn from(err: serde_json::Error) -> Self {
        CuratorError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for curator operations.
pub type Result<T> = std::result::Result<T, CuratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CuratorError::Config("batch_size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: batch_size must be positive"
        );
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(CuratorError, &str)> = vec![
            (
                CuratorError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                CuratorError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
            (
                CuratorError::InvalidItem("missing id".to_string()),
                "Invalid item: missing id",
            ),
            (
                CuratorError::Provider("connection refused".to_string()),
                "Provider error: connection refused",
            ),
            (
                CuratorError::Ranking("embedding failed".to_string()),
                "Ranking error: embedding failed",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "items.json");
        let err: CuratorError = io_err.into();
        assert!(matches!(err, CuratorError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("items.json"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("ranking = [[[");
        let err: CuratorError = parsed.unwrap_err().into();
        assert!(matches!(err, CuratorError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: CuratorError = parsed.unwrap_err().into();
        assert!(matches!(err, CuratorError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
