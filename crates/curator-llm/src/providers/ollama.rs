//! Ollama chat and embedding endpoints.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{EmbeddingClient, ScoringClient, ScoringRequest};
use crate::error::LlmError;
use crate::http::{join_url, Auth, JsonHttp};
use crate::provider::ProviderKind;

use super::{SCORING_TEMPERATURE, SYSTEM_PROMPT};

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    http: JsonHttp,
    base_url: String,
    model: String,
    max_batch: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    pub fn new(http: JsonHttp, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            max_batch: 64,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    fn chat_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "format": "json",
            "stream": false,
            "options": { "temperature": SCORING_TEMPERATURE },
        })
    }

    fn embed_body(&self, texts: &[String]) -> serde_json::Value {
        json!({ "model": self.model, "input": texts })
    }
}

#[async_trait]
impl ScoringClient for OllamaClient {
    async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        let url = join_url(&self.base_url, "/api/chat");
        let response: ChatResponse = self
            .http
            .post_json(&url, &Auth::None, &self.chat_body(&request.prompt))
            .await?;
        debug!(
            model = %self.model,
            chars = response.message.content.len(),
            "Ollama scoring response"
        );
        Ok(response.message.content)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = join_url(&self.base_url, "/api/embed");
        let response: EmbedResponse = self
            .http
            .post_json(&url, &Auth::None, &self.embed_body(texts))
            .await?;
        Ok(response.embeddings)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }
}
