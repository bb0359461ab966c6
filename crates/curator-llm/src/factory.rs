//! Build collaborators from configuration.

use std::sync::Arc;
use std::time::Duration;

use curator_core::config::{EmbeddingConfig, ScoringConfig};
use tracing::info;

use crate::client::{EmbeddingClient, ScoringClient};
use crate::error::LlmError;
use crate::http::JsonHttp;
use crate::mock::{MockEmbeddingClient, MockScoringClient};
use crate::provider::ProviderKind;
use crate::providers::{GeminiClient, OllamaClient, OpenAiClient};
use crate::retry::RetryPolicy;

/// Connection details resolved from a config section and the environment.
#[derive(Debug, Clone)]
struct Resolved {
    kind: ProviderKind,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

fn resolve(
    provider: &str,
    model: Option<&str>,
    base_url: Option<&str>,
    api_key_env: Option<&str>,
    default_model: fn(&ProviderKind) -> &'static str,
) -> Result<Resolved, LlmError> {
    let kind = ProviderKind::parse(provider)
        .ok_or_else(|| LlmError::Config(format!("unknown provider: {provider}")))?;

    let model = model
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_model(&kind).to_string());
    let base_url = base_url
        .filter(|u| !u.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| kind.default_base_url().to_string());

    let api_key = match kind.api_key_env_var() {
        Some(default_var) => {
            let var = api_key_env.unwrap_or(default_var);
            match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Some(value),
                _ => {
                    return Err(LlmError::Config(format!(
                        "{var} is not set (required by the {kind} provider)"
                    )));
                }
            }
        }
        None => api_key_env
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.trim().is_empty()),
    };

    Ok(Resolved {
        kind,
        model,
        base_url,
        api_key,
    })
}

fn required_key(resolved: &Resolved) -> Result<String, LlmError> {
    resolved
        .api_key
        .clone()
        .ok_or_else(|| LlmError::Config(format!("{} provider needs an API key", resolved.kind)))
}

/// Create the scoring client named by `config.provider`.
pub fn build_scoring_client(config: &ScoringConfig) -> Result<Arc<dyn ScoringClient>, LlmError> {
    let resolved = resolve(
        &config.provider,
        config.model.as_deref(),
        config.base_url.as_deref(),
        config.api_key_env.as_deref(),
        ProviderKind::default_scoring_model,
    )?;
    info!(provider = %resolved.kind, model = %resolved.model, "Scoring client configured");

    let http = JsonHttp::new(
        Duration::from_secs(config.request_timeout_secs),
        RetryPolicy::from(&config.retry),
    )?;

    let client: Arc<dyn ScoringClient> = match resolved.kind {
        ProviderKind::Ollama => Arc::new(OllamaClient::new(http, resolved.base_url, resolved.model)),
        ProviderKind::OpenAi => {
            let key = required_key(&resolved)?;
            Arc::new(OpenAiClient::new(http, resolved.base_url, resolved.model, key))
        }
        ProviderKind::Gemini => {
            let key = required_key(&resolved)?;
            Arc::new(GeminiClient::new(http, resolved.base_url, resolved.model, key))
        }
        ProviderKind::Mock => Arc::new(MockScoringClient::hashed()),
    };
    Ok(client)
}

/// Create the embedding client named by `config.provider`.
pub fn build_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingClient>, LlmError> {
    let resolved = resolve(
        &config.provider,
        config.model.as_deref(),
        config.base_url.as_deref(),
        config.api_key_env.as_deref(),
        ProviderKind::default_embedding_model,
    )?;
    info!(
        provider = %resolved.kind,
        model = %resolved.model,
        max_batch = config.max_batch,
        "Embedding client configured"
    );

    let http = JsonHttp::new(
        Duration::from_secs(config.request_timeout_secs),
        RetryPolicy::from(&config.retry),
    )?;

    let client: Arc<dyn EmbeddingClient> = match resolved.kind {
        ProviderKind::Ollama => Arc::new(
            OllamaClient::new(http, resolved.base_url, resolved.model)
                .with_max_batch(config.max_batch),
        ),
        ProviderKind::OpenAi => {
            let key = required_key(&resolved)?;
            Arc::new(
                OpenAiClient::new(http, resolved.base_url, resolved.model, key)
                    .with_max_batch(config.max_batch),
            )
        }
        ProviderKind::Gemini => {
            let key = required_key(&resolved)?;
            Arc::new(
                GeminiClient::new(http, resolved.base_url, resolved.model, key)
                    .with_max_batch(config.max_batch),
            )
        }
        ProviderKind::Mock => Arc::new(MockEmbeddingClient::hashed().with_max_batch(config.max_batch)),
    };
    Ok(client)
}
