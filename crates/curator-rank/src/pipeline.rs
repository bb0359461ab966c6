//! Score, oversample, deduplicate, truncate.

use std::sync::Arc;

use chrono::Utc;
use curator_core::config::{validate_selection, RankingConfig};
use curator_core::types::{Item, RankingResult, TrendContext};
use curator_llm::{EmbeddingClient, ScoringClient};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cluster::SimilarityClusterer;
use crate::error::RankError;
use crate::score::ScoreAggregator;
use crate::select::RepresentativeSelector;

/// Per-call selection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    pub top_n: usize,
    pub deduplicate: bool,
    /// Oversampling factor for the candidate buffer fed into deduplication.
    pub buffer_ratio: f64,
    pub similarity_threshold: f64,
}

impl SelectOptions {
    pub fn validate(&self) -> Result<(), RankError> {
        validate_selection(self.top_n, self.buffer_ratio, self.similarity_threshold)?;
        Ok(())
    }
}

impl From<&RankingConfig> for SelectOptions {
    fn from(config: &RankingConfig) -> Self {
        Self {
            top_n: config.top_n,
            deduplicate: config.deduplicate,
            buffer_ratio: config.buffer_ratio,
            similarity_threshold: config.similarity_threshold,
        }
    }
}

/// Candidate buffer size: `floor(top_n * buffer_ratio)`, never below `top_n`,
/// never above the number of available items.
pub fn buffer_size(top_n: usize, buffer_ratio: f64, available: usize) -> usize {
    let oversampled = (top_n as f64 * buffer_ratio).floor();
    let oversampled = if oversampled.is_finite() && oversampled < usize::MAX as f64 {
        oversampled as usize
    } else {
        usize::MAX
    };
    oversampled.max(top_n).min(available)
}

/// Composes scoring, clustering and representative selection.
pub struct RankingPipeline {
    aggregator: ScoreAggregator,
    embedding: Arc<dyn EmbeddingClient>,
    selector: RepresentativeSelector,
    config: RankingConfig,
}

impl RankingPipeline {
    /// Build a pipeline; invalid configuration is rejected here rather than
    /// at run time.
    pub fn new(
        scoring: Arc<dyn ScoringClient>,
        embedding: Arc<dyn EmbeddingClient>,
        config: RankingConfig,
    ) -> Result<Self, RankError> {
        let aggregator = ScoreAggregator::new(scoring, config.clone())?;
        Ok(Self {
            aggregator,
            embedding,
            selector: RepresentativeSelector::new(),
            config,
        })
    }

    /// Score every item (with optional trend context), then select with the
    /// configured options.
    pub async fn run(
        &self,
        items: Vec<Item>,
        trends: Option<&TrendContext>,
    ) -> Result<RankingResult, RankError> {
        let options = SelectOptions::from(&self.config);
        options.validate()?;
        let scored = self.aggregator.rank_by_importance(items, trends).await;
        Ok(self.select_scored(scored, &options).await)
    }

    /// Select at most `top_n` items, non-increasing by score.
    ///
    /// Unscored items are scored first and preset scores are clamped into
    /// range. When deduplication is on but the
    /// embedding collaborator fails, the score-ordered buffer is used as is.
    pub async fn select_top(
        &self,
        items: Vec<Item>,
        options: &SelectOptions,
    ) -> Result<RankingResult, RankError> {
        options.validate()?;
        let items = self.aggregator.fill_missing_scores(items, None).await;
        Ok(self.select_scored(items, options).await)
    }

    async fn select_scored(&self, mut items: Vec<Item>, options: &SelectOptions) -> RankingResult {
        let candidates = items.len();

        // Stable: equal scores keep their original order.
        items.sort_by(|a, b| b.score_or_zero().cmp(&a.score_or_zero()));

        let buffer_len = buffer_size(options.top_n, options.buffer_ratio, candidates);
        items.truncate(buffer_len);
        let buffer = items;
        info!(
            candidates,
            buffer = buffer_len,
            top_n = options.top_n,
            deduplicate = options.deduplicate,
            "Selecting top items"
        );

        let (selected, clusters_collapsed) = if options.deduplicate && !buffer.is_empty() {
            match self.deduplicate(&buffer, options).await {
                Ok((selected, collapsed)) => (selected, Some(collapsed)),
                Err(e) => {
                    warn!(error = %e, "Embedding failed, skipping deduplication");
                    (truncated(buffer, options.top_n), None)
                }
            }
        } else {
            (truncated(buffer, options.top_n), None)
        };

        info!(
            selected = selected.len(),
            clusters_collapsed = clusters_collapsed.unwrap_or(0),
            top_score = selected.first().map(Item::score_or_zero).unwrap_or(0),
            bottom_score = selected.last().map(Item::score_or_zero).unwrap_or(0),
            "Selection complete"
        );

        RankingResult {
            run_id: Uuid::new_v4(),
            items: selected,
            candidates,
            buffer_size: buffer_len,
            deduplicated: clusters_collapsed.is_some(),
            clusters_collapsed,
            completed_at: Utc::now(),
        }
    }

    async fn deduplicate(
        &self,
        buffer: &[Item],
        options: &SelectOptions,
    ) -> Result<(Vec<Item>, usize), RankError> {
        let clusterer =
            SimilarityClusterer::new(Arc::clone(&self.embedding), options.similarity_threshold)?
                .with_snippet_chars(self.config.embed_snippet_chars);
        let clusters = clusterer.detect_duplicates(buffer).await?;
        let collapsed = clusters.iter().filter(|c| c.len() > 1).count();
        let selected = self.selector.select_representatives(clusters, options.top_n);
        Ok((selected, collapsed))
    }
}

fn truncated(mut items: Vec<Item>, top_n: usize) -> Vec<Item> {
    items.truncate(top_n);
    items
}
