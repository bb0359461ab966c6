//! Near-duplicate detection via embedding similarity.
//!
//! Pairs at or above the similarity threshold are merged with a union-find,
//! so clusters are the transitive closure of the similarity edges: two
//! members may be dissimilar yet share a cluster through a third item.

use std::sync::Arc;

use curator_core::types::Item;
use curator_llm::EmbeddingClient;
use tracing::{debug, info};

use crate::error::RankError;

/// Disjoint-set forest over dense indices `0..n`.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `x`'s set, compressing the path on the way.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets containing `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }

    /// All sets, each sorted ascending, ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = self.find(i);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(i),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }
}

/// Cosine similarity of two vectors; 0 when either has zero magnitude or
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Group vector indices whose pairwise similarity chains reach `threshold`.
///
/// Deterministic for identical input: clusters are ordered by their smallest
/// index and members are ascending.
pub fn cluster_embeddings(vectors: &[Vec<f32>], threshold: f64) -> Vec<Vec<usize>> {
    let n = vectors.len();
    let mut sets = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let similarity = cosine_similarity(&vectors[i], &vectors[j]);
            if similarity >= threshold && sets.union(i, j) {
                debug!(i, j, similarity, "Merged similar items");
            }
        }
    }
    sets.groups()
}

/// Embeds items and partitions them into similarity clusters.
pub struct SimilarityClusterer {
    client: Arc<dyn EmbeddingClient>,
    threshold: f64,
    embed_snippet_chars: usize,
}

impl SimilarityClusterer {
    pub fn new(client: Arc<dyn EmbeddingClient>, threshold: f64) -> Result<Self, RankError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RankError::Config(format!(
                "similarity_threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(Self {
            client,
            threshold,
            embed_snippet_chars: 200,
        })
    }

    /// Body characters appended to the title in the embedded text.
    pub fn with_snippet_chars(mut self, chars: usize) -> Self {
        self.embed_snippet_chars = chars;
        self
    }

    /// One vector per item, requested in chunks of the client's batch limit.
    ///
    /// A wrong vector count, an empty vector, or mixed dimensions are errors.
    pub async fn embed_items(&self, items: &[Item]) -> Result<Vec<Vec<f32>>, RankError> {
        let texts: Vec<String> = items
            .iter()
            .map(|item| item.embedding_text(self.embed_snippet_chars))
            .collect();

        let chunk_size = self.client.max_batch_size().max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(chunk_size) {
            let embedded = self.client.embed(chunk).await.map_err(RankError::embedding)?;
            if embedded.len() != chunk.len() {
                return Err(RankError::Embedding(format!(
                    "requested {} vectors, received {}",
                    chunk.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        if let Some(first) = vectors.first() {
            let expected = first.len();
            if expected == 0 {
                return Err(RankError::Embedding("received an empty vector".to_string()));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(RankError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }
        Ok(vectors)
    }

    /// Partition `items` into similarity clusters.
    ///
    /// Every item lands in exactly one cluster and carries its `cluster_id`.
    /// Clusters are ordered by the position of their first member, and
    /// members keep their relative input order.
    pub async fn detect_duplicates(&self, items: &[Item]) -> Result<Vec<Vec<Item>>, RankError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embed_items(items).await?;
        let groups = cluster_embeddings(&vectors, self.threshold);

        let collapsed = groups.iter().filter(|g| g.len() > 1).count();
        info!(
            items = items.len(),
            clusters = groups.len(),
            collapsed,
            threshold = self.threshold,
            "Clustered items"
        );

        Ok(groups
            .into_iter()
            .enumerate()
            .map(|(cluster_id, members)| {
                members
                    .into_iter()
                    .map(|index| {
                        let mut item = items[index].clone();
                        item.cluster_id = Some(cluster_id);
                        item
                    })
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_llm::{LlmError, MockEmbeddingClient};

    #[test]
    fn test_union_find_basics() {
        let mut uf = UnionFind::new(5);
        assert_eq!(uf.len(), 5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(!uf.union(1, 0));
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(3));
        assert_eq!(uf.groups(), vec![vec![0, 1], vec![2], vec![3, 4]]);
    }

    #[test]
    fn test_union_find_long_chain_compresses() {
        let mut uf = UnionFind::new(100);
        for i in 0..99 {
            uf.union(i, i + 1);
        }
        let root = uf.find(99);
        assert!((0..100).all(|i| uf.find(i) == root));
        assert_eq!(uf.groups().len(), 1);
    }

    #[test]
    fn test_union_find_empty() {
        let mut uf = UnionFind::new(0);
        assert!(uf.is_empty());
        assert!(uf.groups().is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    /// Unit vectors at the given angles (degrees) in the plane.
    fn at_angles(degrees: &[f64]) -> Vec<Vec<f32>> {
        degrees
            .iter()
            .map(|d| {
                let r = d.to_radians();
                vec![r.cos() as f32, r.sin() as f32]
            })
            .collect()
    }

    #[test]
    fn test_clusters_are_transitive() {
        // a-b and b-c are ~0.94 apart, a-c only ~0.77
        let vectors = at_angles(&[0.0, 20.0, 40.0]);
        assert!(cosine_similarity(&vectors[0], &vectors[2]) < 0.85);
        assert_eq!(cluster_embeddings(&vectors, 0.85), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_threshold_splits_clusters() {
        // a-b ≈ 0.95, b-c ≈ 0.40
        let vectors = at_angles(&[0.0, 18.2, 84.6]);
        assert_eq!(
            cluster_embeddings(&vectors, 0.85),
            vec![vec![0, 1], vec![2]]
        );
    }

    #[test]
    fn test_threshold_edges() {
        let orthogonal = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(cluster_embeddings(&orthogonal, 0.0), vec![vec![0, 1]]);
        assert_eq!(cluster_embeddings(&orthogonal, 0.01), vec![vec![0], vec![1]]);
        let same = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(cluster_embeddings(&same, 1.0), vec![vec![0, 1]]);
    }

    #[test]
    fn test_clustering_is_idempotent() {
        let vectors: Vec<Vec<f32>> = (0..30)
            .map(|i| curator_llm::mock::hash_to_vector(&format!("text {}", i % 7)))
            .collect();
        let first = cluster_embeddings(&vectors, 0.85);
        let second = cluster_embeddings(&vectors, 0.85);
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
        assert_eq!(first.iter().map(Vec::len).sum::<usize>(), 30);
    }

    #[test]
    fn test_invalid_threshold() {
        let client: Arc<dyn EmbeddingClient> = Arc::new(MockEmbeddingClient::hashed());
        assert!(SimilarityClusterer::new(client.clone(), 1.5).is_err());
        assert!(SimilarityClusterer::new(client.clone(), f64::NAN).is_err());
        assert!(SimilarityClusterer::new(client, 0.85).is_ok());
    }

    fn items(titles: &[&str]) -> Vec<Item> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Item::new(format!("id-{i}"), *t, ""))
            .collect()
    }

    #[tokio::test]
    async fn test_detect_duplicates_partitions_input() {
        let client = Arc::new(MockEmbeddingClient::hashed());
        let clusterer = SimilarityClusterer::new(client, 0.85).unwrap();
        let input = items(&["GPU prices fall", "New compiler release", "GPU prices fall"]);

        let clusters = clusterer.detect_duplicates(&input).await.unwrap();

        assert_eq!(clusters.len(), 2);
        let first: Vec<&str> = clusters[0].iter().map(|i| i.id.as_str()).collect();
        assert_eq!(first, vec!["id-0", "id-2"]);
        assert_eq!(clusters[1][0].id, "id-1");
        assert_eq!(clusters[0][1].cluster_id, Some(0));
        assert_eq!(clusters[1][0].cluster_id, Some(1));
    }

    #[tokio::test]
    async fn test_embedding_requests_are_chunked() {
        let client = Arc::new(MockEmbeddingClient::hashed().with_max_batch(4));
        let clusterer = SimilarityClusterer::new(client.clone(), 0.85).unwrap();
        let titles: Vec<String> = (0..10).map(|i| format!("title {i}")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();

        let clusters = clusterer.detect_duplicates(&items(&refs)).await.unwrap();

        assert_eq!(clusters.len(), 10);
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.texts_seen(), 10);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported() {
        let client = Arc::new(MockEmbeddingClient::failing());
        let clusterer = SimilarityClusterer::new(client, 0.85).unwrap();
        let err = clusterer
            .detect_duplicates(&items(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RankError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_mixed_dimensions_rejected() {
        let client = Arc::new(MockEmbeddingClient::from_fn(|text| {
            if text == "short" {
                Ok(vec![1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }));
        let clusterer = SimilarityClusterer::new(client, 0.85).unwrap();
        let err = clusterer
            .detect_duplicates(&items(&["long", "short"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RankError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_partial_embedding_failure() {
        let client = Arc::new(MockEmbeddingClient::from_fn(|text| {
            if text == "bad" {
                Err(LlmError::InvalidResponse("nope".into()))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }));
        let clusterer = SimilarityClusterer::new(client, 0.85).unwrap();
        assert!(clusterer
            .detect_duplicates(&items(&["good", "bad"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_embedding_text_uses_title_and_snippet() {
        let client = Arc::new(MockEmbeddingClient::from_fn(|text| {
            assert_eq!(text, "Title\nabcde");
            Ok(vec![1.0])
        }));
        let clusterer = SimilarityClusterer::new(client, 0.85)
            .unwrap()
            .with_snippet_chars(5);
        let input = vec![Item::new("x", "Title", "abcdefgh")];
        assert_eq!(clusterer.detect_duplicates(&input).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let client = Arc::new(MockEmbeddingClient::hashed());
        let clusterer = SimilarityClusterer::new(client.clone(), 0.85).unwrap();
        assert!(clusterer.detect_duplicates(&[]).await.unwrap().is_empty());
        assert_eq!(client.call_count(), 0);
    }
}
