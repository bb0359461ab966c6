//! Deterministic in-process collaborators for tests and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::client::{EmbeddingClient, ScoringClient, ScoringMode, ScoringRequest};
use crate::error::LlmError;
use crate::provider::ProviderKind;

type ScoreHandler = dyn Fn(&ScoringRequest) -> Result<String, LlmError> + Send + Sync;
type EmbedHandler = dyn Fn(&str) -> Result<Vec<f32>, LlmError> + Send + Sync;

/// Dimension of vectors produced by [`MockEmbeddingClient::hashed`].
pub const MOCK_EMBEDDING_DIM: usize = 384;

/// A scoring client whose answers come from a closure.
///
/// Every request is recorded so tests can assert on prompts and call counts.
pub struct MockScoringClient {
    handler: Arc<ScoreHandler>,
    requests: Mutex<Vec<ScoringRequest>>,
}

impl MockScoringClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ScoringRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same score for every item.
    pub fn uniform(score: u8) -> Self {
        Self::new(move |request| Ok(well_formed_response(request, |_| score)))
    }

    /// Pseudo-random but stable scores derived from the prompt text.
    pub fn hashed() -> Self {
        Self::new(|request| {
            Ok(well_formed_response(request, |index| {
                let mut hasher = DefaultHasher::new();
                request.prompt.hash(&mut hasher);
                index.hash(&mut hasher);
                (hasher.finish() % 10) as u8 + 1
            }))
        })
    }

    /// Fails every request.
    pub fn failing() -> Self {
        Self::new(|_| Err(LlmError::Unavailable("mock scorer is offline".to_string())))
    }

    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    pub fn calls_in_mode(&self, mode: ScoringMode) -> usize {
        self.lock_requests()
            .iter()
            .filter(|request| request.mode == mode)
            .count()
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<ScoringRequest> {
        self.lock_requests().clone()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<ScoringRequest>> {
        // A poisoned log only means a handler panicked mid-test; the data is still usable.
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Build a response in the shape the ranking engine expects for the request mode.
pub fn well_formed_response(request: &ScoringRequest, score_for: impl Fn(usize) -> u8) -> String {
    match request.mode {
        ScoringMode::Batch => {
            let results: Vec<_> = (0..request.item_count)
                .map(|index| json!({ "index": index, "score": score_for(index), "reason": "mock" }))
                .collect();
            json!({ "results": results }).to_string()
        }
        ScoringMode::Single => json!({ "score": score_for(0), "reason": "mock" }).to_string(),
    }
}

#[async_trait]
impl ScoringClient for MockScoringClient {
    async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        self.lock_requests().push(request.clone());
        (self.handler)(request)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn model(&self) -> &str {
        "mock-scorer"
    }
}

/// An embedding client mapping each text through a closure.
pub struct MockEmbeddingClient {
    handler: Arc<EmbedHandler>,
    max_batch: usize,
    calls: AtomicUsize,
    texts_seen: AtomicUsize,
}

impl MockEmbeddingClient {
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<f32>, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            max_batch: 64,
            calls: AtomicUsize::new(0),
            texts_seen: AtomicUsize::new(0),
        }
    }

    /// Unit vectors hashed from the text; identical texts embed identically.
    pub fn hashed() -> Self {
        Self::from_fn(|text| Ok(hash_to_vector(text)))
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self::from_fn(|_| Err(LlmError::Unavailable("mock embedder is offline".to_string())))
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts_seen(&self) -> usize {
        self.texts_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
        texts.iter().map(|text| (self.handler)(text)).collect()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn model(&self) -> &str {
        "mock-embedding"
    }
}

/// Deterministic L2-normalised vector for a text.
pub fn hash_to_vector(text: &str) -> Vec<f32> {
    let mut result = Vec::with_capacity(MOCK_EMBEDDING_DIM);
    for i in 0..MOCK_EMBEDDING_DIM {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        i.hash(&mut hasher);
        let h = hasher.finish();
        let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
        result.push(val as f32);
    }

    let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut result {
            *val /= norm;
        }
    }
    result
}
