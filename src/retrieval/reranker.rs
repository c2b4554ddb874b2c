//! Cross-encoder reranking using FastEmbed

use crate::retrieval::RankedResult;
use crate::vector_store::{BookPayload, FusionCandidate};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Malformed reranker output: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Scores (query, document) pairs jointly
///
/// Returns one score per document, in input order. Implementations are
/// CPU-bound and are called from the blocking pool.
pub trait CrossEncoder: Send + Sync {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;
}

/// Cross-encoder backed by a FastEmbed reranking model
pub struct FastEmbedCrossEncoder {
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedCrossEncoder {
    /// Create a new cross-encoder with specified model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "jinaai/jina-reranker-v2-base-multilingual")
    pub fn new(model_name: &str) -> Result<Self, RerankError> {
        let reranker_model = match model_name {
            "jinaai/jina-reranker-v2-base-multilingual" | "jina-reranker-v2-base-multilingual" => {
                RerankerModel::JINARerankerV2BaseMultiligual
            }
            "BAAI/bge-reranker-base" | "bge-reranker-base" => RerankerModel::BGERerankerBase,
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker model: {}. Supported: jina-reranker-v2-base-multilingual, bge-reranker-base",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let init_options =
            RerankInitOptions::new(reranker_model).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Create cross-encoder with default model
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("jinaai/jina-reranker-v2-base-multilingual")
    }
}

impl CrossEncoder for FastEmbedCrossEncoder {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let docs: Vec<&str> = documents.iter().map(|s| s.as_str()).collect();
        let results = self
            .model
            .rerank(query, docs, false, None)
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        // FastEmbed returns results sorted by score; put them back in input order
        let mut scores = vec![f32::NAN; documents.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankError::MalformedResponse(format!("index {} out of range", result.index))
            })?;
            *slot = result.score;
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Fixed textual representation of a book used for reranking
pub fn render_book(payload: &BookPayload) -> String {
    format!(
        "Title: {}. Description: {}. Categories: {}",
        payload.title,
        payload.description_summary,
        payload.categories.join(", ")
    )
}

/// Reranks fused candidates against the query text
#[derive(Clone)]
pub struct Reranker {
    model: Arc<dyn CrossEncoder>,
}

impl Reranker {
    pub fn new(model: Arc<dyn CrossEncoder>) -> Self {
        Self { model }
    }

    /// Score every candidate and return the best `top_n`, highest first.
    ///
    /// When `top_n` exceeds the candidate count all candidates come back; the
    /// list is never padded. Equal scores keep fused order.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[FusionCandidate],
        top_n: usize,
    ) -> Result<Vec<RankedResult>, RerankError> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        if query.is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let texts: Vec<String> = candidates.iter().map(|c| render_book(&c.payload)).collect();

        let model = Arc::clone(&self.model);
        let owned_query = query.to_string();
        let owned_texts = texts.clone();
        let scores = tokio::task::spawn_blocking(move || model.score(&owned_query, &owned_texts))
            .await
            .map_err(|e| RerankError::RerankingError(format!("rerank task failed: {}", e)))??;

        if scores.len() != candidates.len() {
            return Err(RerankError::MalformedResponse(format!(
                "expected {} scores, got {}",
                candidates.len(),
                scores.len()
            )));
        }
        if let Some(position) = scores.iter().position(|s| s.is_nan()) {
            return Err(RerankError::MalformedResponse(format!(
                "score {} of {} is NaN",
                position,
                scores.len()
            )));
        }

        let mut ranked: Vec<RankedResult> = candidates
            .iter()
            .zip(texts)
            .zip(scores)
            .map(|((candidate, text), score)| RankedResult {
                id: candidate.id.clone(),
                score,
                text,
            })
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n.min(candidates.len()));

        Ok(ranked)
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::PointId;

    /// Scores a document by how many query words it contains
    struct WordOverlap;

    impl CrossEncoder for WordOverlap {
        fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
            Ok(documents
                .iter()
                .map(|d| {
                    let doc = d.to_lowercase();
                    query
                        .to_lowercase()
                        .split_whitespace()
                        .filter(|w| doc.contains(w))
                        .count() as f32
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "word-overlap"
        }
    }

    fn candidate(id: u64, title: &str, categories: &[&str]) -> FusionCandidate {
        FusionCandidate {
            id: PointId::Num(id),
            score: 0.0,
            payload: BookPayload {
                title: title.to_string(),
                description_summary: format!("About {}", title),
                categories: categories.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_render_book() {
        let rendered = render_book(&candidate(1, "Dune", &["Sci-Fi", "Classic"]).payload);
        assert_eq!(
            rendered,
            "Title: Dune. Description: About Dune. Categories: Sci-Fi, Classic"
        );
    }

    #[tokio::test]
    async fn test_rerank_orders_by_score() {
        let reranker = Reranker::new(Arc::new(WordOverlap));
        let candidates = vec![
            candidate(1, "Cooking for one", &["Food"]),
            candidate(2, "Dragon magic school", &["Fantasy"]),
            candidate(3, "Magic tricks", &["Hobby"]),
        ];

        let ranked = reranker
            .rerank("dragon magic fantasy", &candidates, 2)
            .await
            .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, PointId::Num(2));
        assert_eq!(ranked[1].id, PointId::Num(3));
        assert!(ranked[0].score >= ranked[1].score);
        assert!(ranked[0].text.starts_with("Title: Dragon magic school"));
    }

    #[tokio::test]
    async fn test_top_n_larger_than_candidates() {
        let reranker = Reranker::new(Arc::new(WordOverlap));
        let candidates = vec![candidate(1, "Magic", &[]), candidate(2, "Other", &[])];

        let ranked = reranker.rerank("magic", &candidates, 10).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, PointId::Num(1));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let reranker = Reranker::new(Arc::new(WordOverlap));
        assert!(reranker.rerank("magic", &[], 5).await.unwrap().is_empty());
    }

    /// Returns fixed scores regardless of input
    struct Fixed(Vec<f32>);

    impl CrossEncoder for Fixed {
        fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, RerankError> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_malformed_scores_are_rejected() {
        let candidates = vec![candidate(1, "Magic", &[]), candidate(2, "Other", &[])];

        let short = Reranker::new(Arc::new(Fixed(vec![1.0])));
        match short.rerank("magic", &candidates, 2).await {
            Err(RerankError::MalformedResponse(msg)) => {
                assert_eq!(msg, "expected 2 scores, got 1")
            }
            other => panic!("expected malformed response, got {:?}", other),
        }

        let nan = Reranker::new(Arc::new(Fixed(vec![1.0, f32::NAN])));
        match nan.rerank("magic", &candidates, 2).await {
            Err(RerankError::MalformedResponse(msg)) => assert_eq!(msg, "score 1 of 2 is NaN"),
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    #[ignore] // Requires model download
    fn test_fastembed_scores_in_input_order() {
        let model = FastEmbedCrossEncoder::with_default_model().unwrap();
        let docs = vec![
            "The weather is nice today.".to_string(),
            "Paris is the capital of France.".to_string(),
        ];

        let scores = model.score("What is the capital of France?", &docs).unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }
}
