//! OpenAI-compatible chat completions and embeddings.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{EmbeddingClient, ScoringClient, ScoringRequest};
use crate::error::LlmError;
use crate::http::{join_url, Auth, JsonHttp};
use crate::provider::ProviderKind;

use super::{SCORING_TEMPERATURE, SYSTEM_PROMPT};

/// Client for the OpenAI API or any server exposing the same routes.
pub struct OpenAiClient {
    http: JsonHttp,
    base_url: String,
    model: String,
    auth: Auth,
    max_batch: usize,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingList {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiClient {
    pub fn new(
        http: JsonHttp,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            auth: Auth::Bearer(api_key.into()),
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
            "temperature": SCORING_TEMPERATURE,
            "response_format": { "type": "json_object" },
        })
    }

    fn embed_body(&self, texts: &[String]) -> serde_json::Value {
        json!({ "model": self.model, "input": texts })
    }
}

fn completion_text(completion: ChatCompletion) -> Result<String, LlmError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("completion has no content".to_string()))
}

/// Vectors in input order; the API reports an index per entry.
fn ordered_embeddings(list: EmbeddingList) -> Vec<Vec<f32>> {
    let mut data = list.data;
    data.sort_by_key(|entry| entry.index);
    data.into_iter().map(|entry| entry.embedding).collect()
}

#[async_trait]
impl ScoringClient for OpenAiClient {
    async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        let url = join_url(&self.base_url, "/v1/chat/completions");
        let completion: ChatCompletion = self
            .http
            .post_json(&url, &self.auth, &self.chat_body(&request.prompt))
            .await?;
        let text = completion_text(completion)?;
        debug!(model = %self.model, chars = text.len(), "OpenAI scoring response");
        Ok(text)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = join_url(&self.base_url, "/v1/embeddings");
        let list: EmbeddingList = self
            .http
            .post_json(&url, &self.auth, &self.embed_body(texts))
            .await?;
        Ok(ordered_embeddings(list))
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }
}
