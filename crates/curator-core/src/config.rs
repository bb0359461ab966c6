use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CuratorError, Result};
use crate::types::{DEFAULT_SCORE, MAX_SCORE, MIN_SCORE};

/// Top-level configuration for the curator.
///
/// Loaded from `~/.curator/config.toml` by default. Each section is passed
/// explicitly to the component that needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuratorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl CuratorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CuratorConfig = toml::from_str(&content)?;
        config.ranking.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Scoring, buffering, and deduplication parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Items per scoring request.
    pub batch_size: usize,
    /// Scoring batches in flight at once.
    pub max_concurrent: usize,
    /// Score given to items the collaborator could not score.
    pub default_score: u8,
    /// Number of items in the final digest.
    pub top_n: usize,
    /// Whether near-duplicates are collapsed before truncation.
    pub deduplicate: bool,
    /// Candidate buffer size as a multiple of `top_n`.
    pub buffer_ratio: f64,
    /// Cosine similarity at or above which two items are linked.
    pub similarity_threshold: f64,
    /// Body characters per item in batch prompts.
    pub snippet_chars: usize,
    /// Body characters in single-item prompts.
    pub single_snippet_chars: usize,
    /// Body characters appended to the title for embeddings.
    pub embed_snippet_chars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_concurrent: 3,
            default_score: DEFAULT_SCORE,
            top_n: 20,
            deduplicate: true,
            buffer_ratio: 2.5,
            similarity_threshold: 0.85,
            snippet_chars: 300,
            single_snippet_chars: 500,
            embed_snippet_chars: 200,
        }
    }
}

impl RankingConfig {
    /// Reject values that indicate a programming or configuration mistake.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CuratorError::Config(
                "ranking.batch_size must be positive".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(CuratorError::Config(
                "ranking.max_concurrent must be positive".to_string(),
            ));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.default_score) {
            return Err(CuratorError::Config(format!(
                "ranking.default_score must be within {}..={}, got {}",
                MIN_SCORE, MAX_SCORE, self.default_score
            )));
        }
        validate_selection(self.top_n, self.buffer_ratio, self.similarity_threshold)
    }
}

/// Validate the per-call selection parameters.
pub fn validate_selection(top_n: usize, buffer_ratio: f64, similarity_threshold: f64) -> Result<()> {
    if top_n == 0 {
        return Err(CuratorError::Config("top_n must be positive".to_string()));
    }
    if !buffer_ratio.is_finite() || buffer_ratio < 1.0 {
        return Err(CuratorError::Config(format!(
            "buffer_ratio must be a finite value >= 1.0, got {}",
            buffer_ratio
        )));
    }
    if !(0.0..=1.0).contains(&similarity_threshold) {
        return Err(CuratorError::Config(format!(
            "similarity_threshold must be within [0, 1], got {}",
            similarity_threshold
        )));
    }
    Ok(())
}

/// Exponential backoff settings for collaborator calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

/// Scoring model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Provider name: "ollama", "openai", "gemini" or "mock".
    pub provider: String,
    /// Model name; the provider default is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Endpoint override, e.g. a self-hosted gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key; the provider default is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            base_url: None,
            api_key_env: None,
            request_timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

/// Embedding model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama", "openai", "gemini" or "mock".
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Maximum texts per embedding request.
    pub max_batch: usize,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            base_url: None,
            api_key_env: None,
            max_batch: 64,
            request_timeout_secs: 60,
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1000,
                max_delay_ms: 4000,
            },
        }
    }
}
