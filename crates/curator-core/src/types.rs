use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Lowest importance score an item can carry.
pub const MIN_SCORE: u8 = 1;
/// Highest importance score an item can carry.
pub const MAX_SCORE: u8 = 10;
/// Score assigned when a collaborator fails to score an item.
pub const DEFAULT_SCORE: u8 = 5;

// =============================================================================
// Enums
// =============================================================================

/// How an item's importance score was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Scored as part of a successful batch request.
    Batch,
    /// Scored individually after its batch failed.
    Single,
    /// No usable score; the default was assigned.
    Default,
}

// =============================================================================
// Items
// =============================================================================

/// A candidate content item (article or paper) flowing through the ranking engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier supplied by the collector.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Body or snippet used for scoring and embedding.
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Importance score in `MIN_SCORE..=MAX_SCORE`; unset until scored.
    #[serde(default, deserialize_with = "deserialize_score")]
    pub importance_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_details: Option<ScoreDetails>,
    /// Similarity cluster this item landed in; unset until deduplicated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<usize>,
    /// Size of the cluster this item represents (representatives only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<usize>,
}

impl Item {
    /// Create an unscored item.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            url: None,
            published_at: None,
            importance_score: None,
            score_details: None,
            cluster_id: None,
            duplicate_count: None,
        }
    }

    /// Give the item a random identifier if the collector supplied none.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
    }

    /// Whether the item has anything worth sending to a model.
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }

    pub fn is_scored(&self) -> bool {
        self.importance_score.is_some()
    }

    /// Pull an existing score back into the valid range.
    pub fn normalize_score(&mut self) {
        if let Some(score) = self.importance_score {
            self.importance_score = Some(score.clamp(MIN_SCORE, MAX_SCORE));
        }
    }

    /// Score used for ordering; unscored items sort last.
    pub fn score_or_zero(&self) -> u8 {
        self.importance_score.unwrap_or(0)
    }

    /// Assign a score, clamping it into the valid range.
    pub fn set_score(&mut self, score: u8, details: ScoreDetails) {
        self.importance_score = Some(score.clamp(MIN_SCORE, MAX_SCORE));
        self.score_details = Some(details);
    }

    /// Body truncated to at most `max_chars` characters.
    pub fn snippet(&self, max_chars: usize) -> &str {
        truncate_chars(self.body.trim(), max_chars)
    }

    /// Title plus the head of the body, the text used for similarity embeddings.
    ///
    /// Falls back to the id so every item yields a non-empty text.
    pub fn embedding_text(&self, max_body_chars: usize) -> String {
        let title = self.title.trim();
        let snippet = self.snippet(max_body_chars);
        let text = match (title.is_empty(), snippet.is_empty()) {
            (false, false) => format!("{}\n{}", title, snippet),
            (false, true) => title.to_string(),
            (true, false) => snippet.to_string(),
            (true, true) => self.id.clone(),
        };
        text.trim().to_string()
    }
}

/// Provenance and rubric breakdown of an importance score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub source: ScoreSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Per-criterion sub-scores, already clamped to the valid range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub criteria: BTreeMap<String, u8>,
}

impl ScoreDetails {
    /// Details for an item that received the default score.
    pub fn defaulted(reason: impl Into<String>) -> Self {
        Self {
            source: ScoreSource::Default,
            reason: Some(reason.into()),
            criteria: BTreeMap::new(),
        }
    }
}

/// Externally supplied trend signal folded into scoring prompts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendContext {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl TrendContext {
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty() && self.topics.is_empty()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Final output of one ranking invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankingResult {
    pub run_id: Uuid,
    /// At most `top_n` items, non-increasing by score.
    pub items: Vec<Item>,
    /// Number of items in the input pool.
    pub candidates: usize,
    /// Number of items fed into deduplication.
    pub buffer_size: usize,
    /// Whether deduplication actually ran (false when disabled or skipped).
    pub deduplicated: bool,
    /// Clusters with more than one member; `None` when deduplication did not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters_collapsed: Option<usize>,
    pub completed_at: DateTime<Utc>,
}

/// Clamp an arbitrary integer into the valid score range.
pub fn clamp_score(value: i64) -> u8 {
    value.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8
}

/// Numeric forms a collector may write for a preset score.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Int(i64),
    Float(f64),
}

/// Accept any JSON number for `importance_score`, clamped into range.
fn deserialize_score<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawScore>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        RawScore::Int(i) => clamp_score(i),
        RawScore::Float(f) => clamp_score(f.trunc() as i64),
    }))
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_unscored() {
        let item = Item::new("a1", "Title", "Body");
        assert!(!item.is_scored());
        assert_eq!(item.score_or_zero(), 0);
        assert!(item.cluster_id.is_none());
    }

    #[test]
    fn test_ensure_id_fills_only_missing_ids() {
        let mut item = Item::new("", "Title", "Body");
        item.ensure_id();
        assert!(Uuid::parse_str(&item.id).is_ok());

        let mut named = Item::new("kept", "Title", "Body");
        named.ensure_id();
        assert_eq!(named.id, "kept");
    }

    #[test]
    fn test_has_content() {
        assert!(Item::new("a", "Title", "").has_content());
        assert!(Item::new("a", "", "Body").has_content());
        assert!(!Item::new("a", "  ", "\n").has_content());
    }

    #[test]
    fn test_set_score_clamps() {
        let mut item = Item::new("a", "t", "b");
        item.set_score(42, ScoreDetails::defaulted("test"));
        assert_eq!(item.importance_score, Some(MAX_SCORE));
        item.set_score(0, ScoreDetails::defaulted("test"));
        assert_eq!(item.importance_score, Some(MIN_SCORE));
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-3), 1);
        assert_eq!(clamp_score(7), 7);
        assert_eq!(clamp_score(11), 10);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_embedding_text_variants() {
        let item = Item::new("id-1", "Title", "A long body text");
        assert_eq!(item.embedding_text(6), "Title\nA long");

        let title_only = Item::new("id-2", "Title", "");
        assert_eq!(title_only.embedding_text(200), "Title");

        let empty = Item::new("id-3", "", "");
        assert_eq!(empty.embedding_text(200), "id-3");
    }

    #[test]
    fn test_item_deserializes_with_minimal_fields() {
        let json = r#"{"id": "x1", "title": "Hello"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, "x1");
        assert_eq!(item.body, "");
        assert!(item.importance_score.is_none());
    }

    #[test]
    fn test_preset_score_is_clamped_on_deserialize() {
        let json = r#"[
            {"id": "a", "importance_score": 0},
            {"id": "b", "importance_score": 200},
            {"id": "c", "importance_score": -4},
            {"id": "d", "importance_score": 7.9},
            {"id": "e", "importance_score": 100000},
            {"id": "f", "importance_score": null}
        ]"#;
        let items: Vec<Item> = serde_json::from_str(json).unwrap();
        let scores: Vec<Option<u8>> = items.iter().map(|i| i.importance_score).collect();
        assert_eq!(
            scores,
            vec![Some(1), Some(10), Some(1), Some(7), Some(10), None]
        );
    }

    #[test]
    fn test_normalize_score() {
        let mut item = Item::new("a", "t", "b");
        item.normalize_score();
        assert!(item.importance_score.is_none());

        item.importance_score = Some(0);
        item.normalize_score();
        assert_eq!(item.importance_score, Some(MIN_SCORE));

        item.importance_score = Some(200);
        item.normalize_score();
        assert_eq!(item.importance_score, Some(MAX_SCORE));
    }

    #[test]
    fn test_score_source_serde_snake_case() {
        let json = serde_json::to_string(&ScoreSource::Default).unwrap();
        assert_eq!(json, r#""default""#);
    }

    #[test]
    fn test_score_details_skips_empty_criteria() {
        let details = ScoreDetails::defaulted("collaborator error");
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("criteria").is_none());
        assert_eq!(json["source"], "default");
    }

    #[test]
    fn test_trend_context_is_empty() {
        assert!(TrendContext::default().is_empty());
        let ctx = TrendContext {
            summary: String::new(),
            topics: vec!["agents".into()],
        };
        assert!(!ctx.is_empty());
    }
}
