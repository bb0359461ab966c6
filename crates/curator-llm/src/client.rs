//! Collaborator contracts consumed by the ranking engine.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::provider::ProviderKind;

/// Whether a scoring request covers a batch or a single item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringMode {
    Batch,
    Single,
}

/// A structured scoring prompt for one item or a batch of items.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringRequest {
    pub prompt: String,
    /// Number of items the prompt asks the model to score.
    pub item_count: usize,
    pub mode: ScoringMode,
}

impl ScoringRequest {
    pub fn batch(prompt: String, item_count: usize) -> Self {
        Self {
            prompt,
            item_count,
            mode: ScoringMode::Batch,
        }
    }

    pub fn single(prompt: String) -> Self {
        Self {
            prompt,
            item_count: 1,
            mode: ScoringMode::Single,
        }
    }
}

/// A model that answers scoring prompts with JSON text.
///
/// The returned string is the raw model output; interpreting it is the
/// caller's job.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError>;

    fn provider(&self) -> ProviderKind;

    fn model(&self) -> &str;
}

/// A model that turns texts into fixed-dimension vectors, one per input.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Largest number of texts accepted in one `embed` call.
    fn max_batch_size(&self) -> usize {
        64
    }

    fn provider(&self) -> ProviderKind;

    fn model(&self) -> &str;
}
