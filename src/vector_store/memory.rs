// In-process vector engine for tests and local development

use super::{BookPayload, FusedQuery, FusionCandidate, PointId, VectorStore, VectorStoreError};
use crate::embedding::SparseVector;
use crate::filter::{fields, Condition, Match, Predicate};
use crate::retrieval::{reciprocal_rank_fusion, FusionConfig};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// A point with both vectors and its payload
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: PointId,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: BookPayload,
}

/// Brute-force engine: cosine on the dense space, dot product on the sparse
/// space, filtered by the same predicate, fused with RRF
pub struct MemoryVectorStore {
    collection: String,
    points: RwLock<Vec<StoredPoint>>,
    fusion: FusionConfig,
}

impl MemoryVectorStore {
    pub fn new(collection: impl Into<String>, fusion: FusionConfig) -> Self {
        Self {
            collection: collection.into(),
            points: RwLock::new(Vec::new()),
            fusion,
        }
    }

    /// Insert or replace a point
    pub async fn upsert(&self, point: StoredPoint) {
        let mut points = self.points.write().await;
        match points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn query_fused(
        &self,
        query: &FusedQuery,
    ) -> Result<Vec<FusionCandidate>, VectorStoreError> {
        let points = self.points.read().await;
        let eligible: Vec<&StoredPoint> = points
            .iter()
            .filter(|p| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |predicate| matches_predicate(predicate, &p.payload))
            })
            .collect();

        let mut dense: Vec<(usize, f32)> = eligible
            .iter()
            .enumerate()
            .map(|(i, p)| (i, cosine_similarity(&query.dense, &p.dense)))
            .collect();
        dense.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        dense.truncate(query.dense_limit);

        // Sparse search only returns points sharing at least one index
        let mut sparse: Vec<(usize, f32)> = eligible
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.sparse
                    .indices
                    .iter()
                    .any(|i| query.sparse.indices.contains(i))
            })
            .map(|(i, p)| (i, query.sparse.dot(&p.sparse)))
            .collect();
        sparse.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sparse.truncate(query.sparse_limit);

        let dense_ids: Vec<usize> = dense.into_iter().map(|(i, _)| i).collect();
        let sparse_ids: Vec<usize> = sparse.into_iter().map(|(i, _)| i).collect();

        Ok(reciprocal_rank_fusion(&dense_ids, &sparse_ids, &self.fusion)
            .into_iter()
            .take(query.limit)
            .map(|(i, score)| FusionCandidate {
                id: eligible[i].id.clone(),
                score,
                payload: eligible[i].payload.clone(),
            })
            .collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

/// Evaluate a predicate against a payload the way the engine does
pub(crate) fn matches_predicate(predicate: &Predicate, payload: &BookPayload) -> bool {
    predicate
        .must
        .iter()
        .all(|condition| matches_condition(condition, payload))
}

fn matches_condition(condition: &Condition, payload: &BookPayload) -> bool {
    match condition {
        Condition::Match {
            key,
            matcher: Match::Text { text },
        } => text_values(key, payload)
            .iter()
            .any(|value| contains_ignore_case(value, text)),
        Condition::Match {
            key,
            matcher: Match::Any { any },
        } => text_values(key, payload)
            .iter()
            .any(|value| any.iter().any(|wanted| wanted == value)),
        Condition::Range { key, range } => {
            let value = match *key {
                fields::PRICE => payload.price,
                fields::RATING => payload.rating,
                fields::RATING_COUNT => payload.rating_count.map(|v| v as f64),
                _ => None,
            };
            value.map_or(false, |v| range.contains(v))
        }
    }
}

fn text_values<'a>(key: &str, payload: &'a BookPayload) -> Vec<&'a str> {
    match key {
        fields::TITLE => vec![payload.title.as_str()],
        fields::DESCRIPTION => vec![payload.description_summary.as_str()],
        fields::AUTHORS => payload.authors.iter().map(String::as_str).collect(),
        fields::CATEGORIES => payload.categories.iter().map(String::as_str).collect(),
        _ => Vec::new(),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
