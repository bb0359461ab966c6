//! Importance ranking and near-duplicate removal for curated digests.
//!
//! Provides:
//! - `ScoreAggregator`: batched model scoring with per-item fallback
//! - `SimilarityClusterer`: embedding similarity clusters via union-find
//! - `RepresentativeSelector`: one highest-scored item per cluster
//! - `RankingPipeline`: score, oversample, deduplicate, truncate

pub mod cluster;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod score;
pub mod select;

pub use cluster::{cluster_embeddings, cosine_similarity, SimilarityClusterer, UnionFind};
pub use error::RankError;
pub use pipeline::{buffer_size, RankingPipeline, SelectOptions};
pub use score::ScoreAggregator;
pub use select::RepresentativeSelector;
