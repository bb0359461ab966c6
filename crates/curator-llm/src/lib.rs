//! Model collaborators for the curator ranking engine.
//!
//! Provides:
//! - `ScoringClient` / `EmbeddingClient` capability traits
//! - Ollama, OpenAI, and Gemini implementations over HTTP
//! - A factory selecting a provider from configuration
//! - A bounded exponential-backoff retry policy
//! - Deterministic mock collaborators for tests and offline runs

pub mod client;
pub mod error;
pub mod factory;
pub mod http;
pub mod mock;
pub mod provider;
pub mod providers;
pub mod retry;

pub use client::{EmbeddingClient, ScoringClient, ScoringMode, ScoringRequest};
pub use error::LlmError;
pub use factory::{build_embedding_client, build_scoring_client};
pub use mock::{MockEmbeddingClient, MockScoringClient};
pub use provider::ProviderKind;
pub use retry::RetryPolicy;
