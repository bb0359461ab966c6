//! Batched importance scoring with per-item fallback.

use std::sync::Arc;

use curator_core::config::RankingConfig;
use curator_core::types::{Item, ScoreDetails, ScoreSource, TrendContext};
use curator_llm::{ScoringClient, ScoringRequest};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::RankError;
use crate::parse::{parse_batch_scores, parse_single_score, ParsedScore};
use crate::prompt::{batch_prompt, single_prompt};

/// An item tagged with its position in the caller's list.
type Slot = (usize, Item);

/// Scores items through a [`ScoringClient`], one request per batch.
///
/// A batch whose response cannot be mapped back onto its items is rescored
/// one item at a time; an item that still fails gets the configured default
/// score. Nothing here is fatal: every returned item carries a score.
pub struct ScoreAggregator {
    client: Arc<dyn ScoringClient>,
    config: RankingConfig,
}

impl ScoreAggregator {
    /// Create an aggregator, rejecting invalid configuration up front.
    pub fn new(client: Arc<dyn ScoringClient>, config: RankingConfig) -> Result<Self, RankError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// Score every item, returning them in their original order.
    pub async fn rank_by_importance(
        &self,
        items: Vec<Item>,
        trends: Option<&TrendContext>,
    ) -> Vec<Item> {
        self.score(items, trends, true).await
    }

    /// Score only the items that do not carry a score yet.
    pub async fn fill_missing_scores(
        &self,
        items: Vec<Item>,
        trends: Option<&TrendContext>,
    ) -> Vec<Item> {
        self.score(items, trends, false).await
    }

    async fn score(
        &self,
        items: Vec<Item>,
        trends: Option<&TrendContext>,
        rescore: bool,
    ) -> Vec<Item> {
        let total = items.len();
        let mut finished: Vec<Slot> = Vec::with_capacity(total);
        let mut pending: Vec<Slot> = Vec::new();

        for (position, mut item) in items.into_iter().enumerate() {
            if !rescore && item.is_scored() {
                item.normalize_score();
                finished.push((position, item));
            } else if !item.has_content() {
                warn!(id = %item.id, "Item has no title or body, assigning default score");
                item.set_score(
                    self.config.default_score,
                    ScoreDetails::defaulted("item has no title or body"),
                );
                finished.push((position, item));
            } else {
                pending.push((position, item));
            }
        }

        if pending.is_empty() {
            return restore_order(finished);
        }

        let batches = partition(pending, self.config.batch_size);
        info!(
            items = total,
            to_score = batches.iter().map(Vec::len).sum::<usize>(),
            batches = batches.len(),
            batch_size = self.config.batch_size,
            max_concurrent = self.config.max_concurrent,
            "Scoring items"
        );

        // Admission gate for in-flight batches; each batch owns its items.
        let gate = Semaphore::new(self.config.max_concurrent);
        let tasks = batches.into_iter().enumerate().map(|(batch_no, batch)| {
            let gate = &gate;
            async move {
                let _permit = gate.acquire().await.ok();
                self.score_batch(batch_no, batch, trends).await
            }
        });

        for scored in join_all(tasks).await {
            finished.extend(scored);
        }

        let items = restore_order(finished);
        log_summary(&items);
        items
    }

    async fn score_batch(
        &self,
        batch_no: usize,
        batch: Vec<Slot>,
        trends: Option<&TrendContext>,
    ) -> Vec<Slot> {
        let (positions, mut items): (Vec<usize>, Vec<Item>) = batch.into_iter().unzip();

        match self.request_batch(&items, trends).await {
            Ok(scores) => {
                for (item, parsed) in items.iter_mut().zip(scores) {
                    apply(item, parsed, ScoreSource::Batch);
                }
                debug!(batch = batch_no, items = items.len(), "Batch scored");
            }
            Err(e) => {
                warn!(
                    batch = batch_no,
                    items = items.len(),
                    error = %e,
                    "Batch scoring failed, falling back to per-item scoring"
                );
                self.score_individually(&mut items, trends).await;
            }
        }

        positions.into_iter().zip(items).collect()
    }

    async fn request_batch(
        &self,
        items: &[Item],
        trends: Option<&TrendContext>,
    ) -> Result<Vec<ParsedScore>, RankError> {
        let prompt = batch_prompt(items, trends, self.config.snippet_chars);
        let request = ScoringRequest::batch(prompt, items.len());
        let raw = self
            .client
            .score(&request)
            .await
            .map_err(|e| RankError::BatchScoring(e.to_string()))?;
        parse_batch_scores(&raw, items.len())
    }

    /// Sequentially score each item on its own; failures get the default score.
    async fn score_individually(&self, items: &mut [Item], trends: Option<&TrendContext>) {
        for item in items.iter_mut() {
            match self.request_single(item, trends).await {
                Ok(parsed) => apply(item, parsed, ScoreSource::Single),
                Err(e) => {
                    warn!(
                        id = %item.id,
                        default_score = self.config.default_score,
                        error = %e,
                        "Item scoring failed, assigning default score"
                    );
                    item.set_score(
                        self.config.default_score,
                        ScoreDetails::defaulted(e.to_string()),
                    );
                }
            }
        }
    }

    async fn request_single(
        &self,
        item: &Item,
        trends: Option<&TrendContext>,
    ) -> Result<ParsedScore, RankError> {
        let prompt = single_prompt(item, trends, self.config.single_snippet_chars);
        let raw = self
            .client
            .score(&ScoringRequest::single(prompt))
            .await
            .map_err(|e| RankError::ItemScoring(e.to_string()))?;
        parse_single_score(&raw)
    }
}

fn apply(item: &mut Item, parsed: ParsedScore, source: ScoreSource) {
    debug!(id = %item.id, score = parsed.score, ?source, "Scored item");
    item.set_score(
        parsed.score,
        ScoreDetails {
            source,
            reason: parsed.reason,
            criteria: parsed.criteria,
        },
    );
}

/// Split into consecutive owned batches of at most `size` items.
fn partition(slots: Vec<Slot>, size: usize) -> Vec<Vec<Slot>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(slots.len().div_ceil(size));
    let mut slots = slots.into_iter().peekable();
    while slots.peek().is_some() {
        batches.push(slots.by_ref().take(size).collect());
    }
    batches
}

fn restore_order(mut slots: Vec<Slot>) -> Vec<Item> {
    slots.sort_by_key(|(position, _)| *position);
    slots.into_iter().map(|(_, item)| item).collect()
}

fn log_summary(items: &[Item]) {
    let scores: Vec<u8> = items.iter().filter_map(|i| i.importance_score).collect();
    let defaulted = items
        .iter()
        .filter(|i| {
            i.score_details
                .as_ref()
                .is_some_and(|d| d.source == ScoreSource::Default)
        })
        .count();
    info!(
        scored = scores.len(),
        defaulted,
        min_score = scores.iter().min().copied().unwrap_or(0),
        max_score = scores.iter().max().copied().unwrap_or(0),
        "Scoring complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use curator_llm::{LlmError, MockScoringClient, ProviderKind, ScoringMode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(format!("item-{i}"), format!("Title {i}"), format!("Body {i}")))
            .collect()
    }

    fn config(batch_size: usize) -> RankingConfig {
        RankingConfig {
            batch_size,
            ..RankingConfig::default()
        }
    }

    fn aggregator(client: Arc<dyn ScoringClient>, batch_size: usize) -> ScoreAggregator {
        ScoreAggregator::new(client, config(batch_size)).unwrap()
    }

    #[test]
    fn test_partition_sizes() {
        let slots: Vec<Slot> = items(25).into_iter().enumerate().collect();
        let sizes: Vec<usize> = partition(slots, 20).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 5]);
        assert!(partition(Vec::new(), 20).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let client: Arc<dyn ScoringClient> = Arc::new(MockScoringClient::uniform(5));
        let result = ScoreAggregator::new(client, config(0));
        assert!(matches!(result, Err(RankError::Config(_))));
    }

    #[tokio::test]
    async fn test_batches_scored_in_place() {
        let mock = Arc::new(MockScoringClient::uniform(8));
        let scored = aggregator(mock.clone(), 20)
            .rank_by_importance(items(25), None)
            .await;

        assert_eq!(scored.len(), 25);
        assert_eq!(mock.calls_in_mode(ScoringMode::Batch), 2);
        assert_eq!(mock.calls_in_mode(ScoringMode::Single), 0);
        for (i, item) in scored.iter().enumerate() {
            assert_eq!(item.id, format!("item-{i}"));
            assert_eq!(item.importance_score, Some(8));
            assert_eq!(
                item.score_details.as_ref().unwrap().source,
                ScoreSource::Batch
            );
        }
        let sizes: Vec<usize> = mock.requests().iter().map(|r| r.item_count).collect();
        assert!(sizes.contains(&20) && sizes.contains(&5));
    }

    #[tokio::test]
    async fn test_short_batch_falls_back_to_single() {
        let mock = Arc::new(MockScoringClient::new(|request| match request.mode {
            ScoringMode::Batch => Ok("[7, 7]".to_string()),
            ScoringMode::Single => Ok("{\"score\": 3, \"reason\": \"minor\"}".to_string()),
        }));
        let scored = aggregator(mock.clone(), 20)
            .rank_by_importance(items(4), None)
            .await;

        assert_eq!(mock.calls_in_mode(ScoringMode::Batch), 1);
        assert_eq!(mock.calls_in_mode(ScoringMode::Single), 4);
        for item in &scored {
            assert_eq!(item.importance_score, Some(3));
            let details = item.score_details.as_ref().unwrap();
            assert_eq!(details.source, ScoreSource::Single);
            assert_eq!(details.reason.as_deref(), Some("minor"));
        }
    }

    #[tokio::test]
    async fn test_single_failures_get_default_score() {
        let mock = Arc::new(MockScoringClient::new(|request| match request.mode {
            ScoringMode::Batch => Err(LlmError::Unavailable("down".into())),
            ScoringMode::Single if request.prompt.contains("Title 1") => {
                Ok("{\"score\": 9}".to_string())
            }
            ScoringMode::Single => Ok("I cannot rate this".to_string()),
        }));
        let scored = aggregator(mock, 20).rank_by_importance(items(3), None).await;

        assert_eq!(scored[0].importance_score, Some(5));
        assert_eq!(scored[1].importance_score, Some(9));
        assert_eq!(scored[2].importance_score, Some(5));
        assert_eq!(
            scored[0].score_details.as_ref().unwrap().source,
            ScoreSource::Default
        );
    }

    #[tokio::test]
    async fn test_default_score_is_configurable() {
        let client: Arc<dyn ScoringClient> = Arc::new(MockScoringClient::failing());
        let aggregator = ScoreAggregator::new(
            client,
            RankingConfig {
                default_score: 2,
                ..RankingConfig::default()
            },
        )
        .unwrap();
        let scored = aggregator.rank_by_importance(items(2), None).await;
        assert!(scored.iter().all(|i| i.importance_score == Some(2)));
    }

    #[tokio::test]
    async fn test_empty_items_are_not_sent() {
        let mock = Arc::new(MockScoringClient::uniform(9));
        let mut input = items(2);
        input.insert(1, Item::new("blank", "  ", ""));
        let scored = aggregator(mock.clone(), 20).rank_by_importance(input, None).await;

        assert_eq!(scored[1].id, "blank");
        assert_eq!(scored[1].importance_score, Some(5));
        assert_eq!(mock.requests()[0].item_count, 2);
        assert_eq!(scored[0].importance_score, Some(9));
        assert_eq!(scored[2].importance_score, Some(9));
    }

    #[tokio::test]
    async fn test_fill_missing_keeps_existing_scores() {
        let mock = Arc::new(MockScoringClient::uniform(4));
        let mut input = items(3);
        input[0].set_score(10, ScoreDetails::defaulted("preset"));
        let scored = aggregator(mock.clone(), 20)
            .fill_missing_scores(input, None)
            .await;

        assert_eq!(scored[0].importance_score, Some(10));
        assert_eq!(scored[1].importance_score, Some(4));
        assert_eq!(mock.requests()[0].item_count, 2);
    }

    #[tokio::test]
    async fn test_fill_missing_clamps_out_of_range_presets() {
        let mock = Arc::new(MockScoringClient::uniform(4));
        let mut input = items(2);
        input[0].importance_score = Some(0);
        input[1].importance_score = Some(200);
        let scored = aggregator(mock.clone(), 20)
            .fill_missing_scores(input, None)
            .await;

        assert_eq!(scored[0].importance_score, Some(1));
        assert_eq!(scored[1].importance_score, Some(10));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_items_no_calls() {
        let mock = Arc::new(MockScoringClient::uniform(4));
        let scored = aggregator(mock.clone(), 20).rank_by_importance(Vec::new(), None).await;
        assert!(scored.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_trends_reach_the_prompt() {
        let mock = Arc::new(MockScoringClient::uniform(6));
        let trends = TrendContext {
            summary: "Robotics funding surge".into(),
            topics: vec![],
        };
        aggregator(mock.clone(), 20)
            .rank_by_importance(items(1), Some(&trends))
            .await;
        assert!(mock.requests()[0].prompt.contains("Robotics funding surge"));
    }

    /// Sleeps longer for earlier batches and tracks peak concurrency.
    struct SlowClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ScoringClient for SlowClient {
        async fn score(&self, request: &ScoringRequest) -> Result<String, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = if request.prompt.contains("Title 0\n") { 40 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let score = if request.prompt.contains("Title 0\n") { 9 } else { 2 };
            Ok(curator_llm::mock::well_formed_response(request, |_| score))
        }

        fn provider(&self) -> ProviderKind {
            ProviderKind::Mock
        }

        fn model(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_concurrency_bounded_and_order_preserved() {
        let client = Arc::new(SlowClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let aggregator = ScoreAggregator::new(
            client.clone(),
            RankingConfig {
                batch_size: 2,
                max_concurrent: 2,
                ..RankingConfig::default()
            },
        )
        .unwrap();

        let scored = aggregator.rank_by_importance(items(10), None).await;

        assert!(client.peak.load(Ordering::SeqCst) <= 2);
        let ids: Vec<&str> = scored.iter().map(|i| i.id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("item-{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        // The slow first batch still lands at the front.
        assert_eq!(scored[0].importance_score, Some(9));
        assert_eq!(scored[1].importance_score, Some(9));
        assert_eq!(scored[2].importance_score, Some(2));
    }
}
