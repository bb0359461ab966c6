//! Interpretation of raw scoring responses.
//!
//! Models answer with a bare number, a criteria object, an array of either,
//! or a `{"results": [...]}` envelope, sometimes wrapped in a markdown fence.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use curator_core::types::clamp_score;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::RankError;

/// Keys that carry bookkeeping rather than a criterion score.
const NON_CRITERIA_KEYS: [&str; 5] = ["index", "id", "reason", "title", "score"];

/// Envelope keys a batch array may be wrapped in.
const ENVELOPE_KEYS: [&str; 2] = ["results", "scores"];

/// One item's interpreted score.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    /// Final score in `1..=10`.
    pub score: u8,
    pub reason: Option<String>,
    /// Clamped criterion sub-scores that contributed to `score`.
    pub criteria: BTreeMap<String, u8>,
}

impl ParsedScore {
    fn bare(score: u8) -> Self {
        Self {
            score,
            reason: None,
            criteria: BTreeMap::new(),
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)\s*```").expect("Invalid code fence regex")
    })
}

/// Return the JSON inside the first markdown code fence, or the trimmed input.
pub fn strip_code_fences(raw: &str) -> &str {
    match fence_regex().captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Leniently read a score: integers, floats (truncated) and numeric strings,
/// clamped to the valid range. Anything else is rejected.
pub fn coerce_score(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(clamp_score(i))
            } else if let Some(u) = n.as_u64() {
                Some(clamp_score(i64::try_from(u).unwrap_or(i64::MAX)))
            } else {
                n.as_f64().and_then(coerce_float)
            }
        }
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(coerce_float),
        _ => None,
    }
}

fn coerce_float(f: f64) -> Option<u8> {
    if f.is_finite() {
        Some(clamp_score(f.trunc() as i64))
    } else {
        None
    }
}

/// Interpret one element of a response.
///
/// A bare value is the score itself. In an object an explicit `score` field
/// wins; otherwise the score is the rounded mean of every coercible criterion.
pub fn parse_entry(value: &Value) -> Option<ParsedScore> {
    match value {
        Value::Object(map) => parse_object(map),
        other => coerce_score(other).map(ParsedScore::bare),
    }
}

fn parse_object(map: &Map<String, Value>) -> Option<ParsedScore> {
    let criteria: BTreeMap<String, u8> = map
        .iter()
        .filter(|(key, _)| !NON_CRITERIA_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| coerce_score(value).map(|score| (key.clone(), score)))
        .collect();

    let explicit = map.get("score").and_then(coerce_score);
    let score = match explicit {
        Some(score) => score,
        None if criteria.is_empty() => return None,
        None => {
            let sum: u32 = criteria.values().map(|&s| u32::from(s)).sum();
            let mean = f64::from(sum) / criteria.len() as f64;
            clamp_score(mean.round() as i64)
        }
    };

    let reason = map
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Some(ParsedScore {
        score,
        reason,
        criteria,
    })
}

fn echoed_index(value: &Value) -> Option<Option<usize>> {
    let index = value.as_object()?.get("index")?;
    Some(
        index
            .as_u64()
            .or_else(|| index.as_str().and_then(|s| s.trim().parse().ok()))
            .and_then(|i| usize::try_from(i).ok()),
    )
}

fn unwrap_envelope(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(entries) => Some(entries),
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            }),
        _ => None,
    }
}

/// Parse a batch response into exactly `expected` scores in item order.
///
/// Fails when the response does not parse, has the wrong length, contains a
/// non-coercible element, or echoes indices that are not a permutation of
/// `0..expected`.
pub fn parse_batch_scores(raw: &str, expected: usize) -> Result<Vec<ParsedScore>, RankError> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| RankError::BatchScoring(format!("response is not JSON: {e}")))?;
    let entries = unwrap_envelope(value)
        .ok_or_else(|| RankError::BatchScoring("response is not a list of scores".to_string()))?;

    if entries.len() != expected {
        return Err(RankError::BatchScoring(format!(
            "expected {} scores, got {}",
            expected,
            entries.len()
        )));
    }

    let indices: Vec<Option<Option<usize>>> = entries.iter().map(echoed_index).collect();
    let echoes = indices.iter().filter(|i| i.is_some()).count();
    if echoes != 0 && echoes != entries.len() {
        return Err(RankError::BatchScoring(
            "only some entries echo an index".to_string(),
        ));
    }

    let mut slots: Vec<Option<ParsedScore>> = vec![None; expected];
    for (position, (entry, index)) in entries.iter().zip(indices).enumerate() {
        let target = match index {
            None => position,
            Some(Some(i)) if i < expected => i,
            Some(_) => {
                return Err(RankError::BatchScoring(format!(
                    "entry {position} has an invalid index"
                )));
            }
        };
        if slots[target].is_some() {
            return Err(RankError::BatchScoring(format!(
                "index {target} appears more than once"
            )));
        }
        let parsed = parse_entry(entry).ok_or_else(|| {
            RankError::BatchScoring(format!("entry {position} has no usable score"))
        })?;
        slots[target] = Some(parsed);
    }

    // Lengths match and no slot was filled twice, so every slot is filled.
    Ok(slots.into_iter().flatten().collect())
}

/// Parse a single-item response.
///
/// Also accepts a one-element array or envelope, which some models return
/// even when asked for a single object.
pub fn parse_single_score(raw: &str) -> Result<ParsedScore, RankError> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| RankError::ItemScoring(format!("response is not JSON: {e}")))?;

    let is_envelope = matches!(
        &value,
        Value::Object(map) if ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k))
    );

    let entry = if is_envelope {
        match unwrap_envelope(value) {
            Some(mut entries) if entries.len() == 1 => entries.remove(0),
            _ => {
                return Err(RankError::ItemScoring(
                    "expected exactly one score".to_string(),
                ))
            }
        }
    } else {
        match value {
            Value::Array(mut entries) if entries.len() == 1 => entries.remove(0),
            Value::Array(_) => {
                return Err(RankError::ItemScoring(
                    "expected exactly one score".to_string(),
                ))
            }
            other => other,
        }
    };

    parse_entry(&entry)
        .ok_or_else(|| RankError::ItemScoring("response has no usable score".to_string()))
}
