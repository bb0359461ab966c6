//! Google Gemini generateContent and batchEmbedContents.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{EmbeddingClient, ScoringClient, ScoringRequest};
use crate::error::LlmError;
use crate::http::{join_url, Auth, JsonHttp};
use crate::provider::ProviderKind;

use super::{SCORING_TEMPERATURE, SYSTEM_PROMPT};

pub struct GeminiClient {
    http: JsonHttp,
    base_url: String,
    model: String,
    auth: Auth,
    max_batch: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiClient {
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
            auth: Auth::Header("x-goog-api-key", api_key.into()),
            // batchEmbedContents accepts at most 100 requests
            max_batch: 100,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.clamp(1, 100);
        self
    }

    fn generate_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": SCORING_TEMPERATURE,
                "responseMimeType": "application/json",
            },
        })
    }

    fn embed_body(&self, texts: &[String]) -> serde_json::Value {
        let model = format!("models/{}", self.model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| json!({ "model": model, "content": { "parts": [{ "text": text }] } }))
            .collect();
        json!({ "requests": requests })
    }
}

fn generated_text(response: GenerateResponse) -> Result<String, LlmError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse(
            "generateContent returned no text".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl ScoringClient for GeminiClient {
    async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        let path = format!("/v1beta/models/{}:generateContent", self.model);
        let url = join_url(&self.base_url, &path);
        let response: GenerateResponse = self
            .http
            .post_json(&url, &self.auth, &self.generate_body(&request.prompt))
            .await?;
        let text = generated_text(response)?;
        debug!(model = %self.model, chars = text.len(), "Gemini scoring response");
        Ok(text)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for GeminiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("/v1beta/models/{}:batchEmbedContents", self.model);
        let url = join_url(&self.base_url, &path);
        let response: BatchEmbedResponse = self
            .http
            .post_json(&url, &self.auth, &self.embed_body(texts))
            .await?;
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }
}
