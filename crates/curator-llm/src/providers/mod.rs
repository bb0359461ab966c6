//! HTTP-backed provider implementations.

pub mod gemini;
pub mod ollama;
pub mod openai;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// System instruction sent alongside every scoring prompt.
pub(crate) const SYSTEM_PROMPT: &str =
    "You rate the importance of news items for a technical audience. Respond with JSON only.";

/// Sampling temperature for scoring; low so repeated runs agree.
pub(crate) const SCORING_TEMPERATURE: f32 = 0.1;
