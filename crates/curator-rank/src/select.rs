//! Reduce similarity clusters to their best-scored members.

use curator_core::types::Item;
use tracing::debug;

/// Keeps one representative per cluster: the highest-scored member, the
/// earliest one on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepresentativeSelector;

impl RepresentativeSelector {
    pub fn new() -> Self {
        Self
    }

    /// One representative per cluster, sorted descending by score and
    /// truncated to `top_n`.
    ///
    /// Members are expected in their original order, and clusters ordered by
    /// their first member; ties between representatives keep cluster order.
    /// Fewer than `top_n` clusters yield fewer items, never padding.
    pub fn select_representatives(&self, clusters: Vec<Vec<Item>>, top_n: usize) -> Vec<Item> {
        let mut representatives: Vec<Item> = clusters
            .into_iter()
            .filter_map(|cluster| {
                let size = cluster.len();
                let mut best = pick_best(cluster)?;
                if size > 1 {
                    debug!(id = %best.id, members = size, "Collapsed cluster");
                }
                best.duplicate_count = Some(size);
                Some(best)
            })
            .collect();

        representatives.sort_by(|a, b| b.score_or_zero().cmp(&a.score_or_zero()));
        representatives.truncate(top_n);
        representatives
    }
}

/// First member with the maximum score.
fn pick_best(cluster: Vec<Item>) -> Option<Item> {
    cluster.into_iter().reduce(|best, candidate| {
        if candidate.score_or_zero() > best.score_or_zero() {
            candidate
        } else {
            best
        }
    })
}
