//! In-process collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use booksearch::cache::{CacheError, CacheManager, CacheStore, MemoryCacheStore};
use booksearch::config::RetrievalConfig;
use booksearch::embedding::{DenseEmbedder, EmbeddingError, HybridEmbedder, SparseEmbedder, SparseVector};
use booksearch::filter::AttributeFilter;
use booksearch::query::{ExtractionError, FilterExtractor, StructuredQuery};
use booksearch::retrieval::{CrossEncoder, FusedRetriever, FusionConfig, HybridSearcher, RerankError, Reranker};
use booksearch::vector_store::{
    BookPayload, FusedQuery, FusionCandidate, MemoryVectorStore, PointId, StoredPoint, VectorStore,
    VectorStoreError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DENSE_DIM: usize = 32;

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

fn bucket(word: &str, modulo: u32) -> u32 {
    word.bytes()
        .fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
        % modulo
}

/// Hashed bag-of-words dense vector
pub fn dense_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DENSE_DIM];
    for word in words(text) {
        vector[bucket(&word, DENSE_DIM as u32) as usize] += 1.0;
    }
    vector
}

/// One index per distinct word
pub fn sparse_vector(text: &str) -> SparseVector {
    let mut indices: Vec<u32> = words(text).iter().map(|w| bucket(w, 30_000)).collect();
    indices.sort_unstable();
    indices.dedup();
    let values = vec![1.0; indices.len()];
    SparseVector::new(indices, values)
}

/// Dense embedder that records every text it was asked to embed
#[derive(Default)]
pub struct RecordingDense {
    pub seen: Mutex<Vec<String>>,
}

impl RecordingDense {
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DenseEmbedder for RecordingDense {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(dense_vector(text))
    }

    fn model_name(&self) -> &str {
        "hashed-bow"
    }
}

pub struct WordSparse;

impl SparseEmbedder for WordSparse {
    fn embed(&self, text: &str) -> Result<SparseVector, EmbeddingError> {
        Ok(sparse_vector(text))
    }

    fn model_name(&self) -> &str {
        "word-sparse"
    }
}

/// Extractor returning a fixed answer and counting calls
pub struct CountingExtractor {
    answer: Result<StructuredQuery, String>,
    calls: AtomicUsize,
}

impl CountingExtractor {
    pub fn returning(answer: StructuredQuery) -> Self {
        Self {
            answer: Ok(answer),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FilterExtractor for CountingExtractor {
    async fn extract(&self, _raw_query: &str) -> Result<StructuredQuery, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(ExtractionError::RequestError)
    }
}

/// Wraps a store, counting queries and optionally delaying them
pub struct SlowStore {
    inner: MemoryVectorStore,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowStore {
    pub fn new(inner: MemoryVectorStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for SlowStore {
    async fn query_fused(
        &self,
        query: &FusedQuery,
    ) -> Result<Vec<FusionCandidate>, VectorStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.query_fused(query).await
    }

    fn collection(&self) -> &str {
        self.inner.collection()
    }
}

/// Vector engine that is always down
pub struct DownStore;

#[async_trait]
impl VectorStore for DownStore {
    async fn query_fused(
        &self,
        _query: &FusedQuery,
    ) -> Result<Vec<FusionCandidate>, VectorStoreError> {
        Err(VectorStoreError::RequestError("connection refused".to_string()))
    }

    fn collection(&self) -> &str {
        "down"
    }
}

/// Cache store that fails every call
pub struct DownCache;

#[async_trait]
impl CacheStore for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// Scores a document by how many query words it contains
pub struct WordOverlap;

impl CrossEncoder for WordOverlap {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RerankError> {
        let query_words = words(query);
        Ok(documents
            .iter()
            .map(|d| {
                let doc = d.to_lowercase();
                query_words.iter().filter(|w| doc.contains(w.as_str())).count() as f32
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "word-overlap"
    }
}

fn book(
    title: &str,
    description: &str,
    price: f64,
    rating: f64,
    rating_count: u64,
    authors: &[&str],
    categories: &[&str],
) -> BookPayload {
    BookPayload {
        title: title.to_string(),
        description_summary: description.to_string(),
        price: Some(price),
        rating: Some(rating),
        rating_count: Some(rating_count),
        authors: authors.iter().map(|s| s.to_string()).collect(),
        categories: categories.iter().map(|s| s.to_string()).collect(),
    }
}

/// Small catalog indexed with the fake embedders
pub async fn catalog() -> MemoryVectorStore {
    let books = vec![
        book(
            "Harry Potter and the Philosopher's Stone",
            "A young wizard discovers magic and attends a school of witchcraft",
            8.99,
            4.7,
            120_000,
            &["J.K. Rowling"],
            &["Fantasy", "Young Adult"],
        ),
        book(
            "The Casual Vacancy",
            "A small English town is thrown into conflict after a council election",
            24.0,
            3.3,
            20_000,
            &["J.K. Rowling"],
            &["Fiction"],
        ),
        book(
            "The Hobbit",
            "A hobbit joins a wizard and dwarves on a fantasy quest to reclaim treasure from a dragon",
            9.5,
            4.6,
            90_000,
            &["J.R.R. Tolkien"],
            &["Fantasy", "Classic"],
        ),
        book(
            "Gone Girl",
            "A thriller about a marriage gone wrong and a missing wife",
            12.0,
            4.1,
            60_000,
            &["Gillian Flynn"],
            &["Thriller", "Mystery"],
        ),
        book(
            "A Wizard of Earthsea",
            "A young wizard at a school of magic unleashes a shadow",
            7.5,
            4.2,
            30_000,
            &["Ursula K. Le Guin"],
            &["Fantasy", "Classic"],
        ),
    ];

    let store = MemoryVectorStore::new("books", FusionConfig::default());
    for (i, payload) in books.into_iter().enumerate() {
        let text = format!("{} {}", payload.title, payload.description_summary);
        store
            .upsert(StoredPoint {
                id: PointId::Num(i as u64 + 1),
                dense: dense_vector(&text),
                sparse: sparse_vector(&text),
                payload,
            })
            .await;
    }
    store
}

pub struct Harness {
    pub searcher: HybridSearcher,
    pub extractor: Arc<CountingExtractor>,
    pub dense: Arc<RecordingDense>,
}

/// Searcher over the given collaborators with default retrieval settings
pub fn harness(
    extractor: CountingExtractor,
    store: Arc<dyn VectorStore>,
    cache_store: Arc<dyn CacheStore>,
) -> Harness {
    let extractor = Arc::new(extractor);
    let dense = Arc::new(RecordingDense::default());

    let retriever = FusedRetriever::new(
        HybridEmbedder::new(dense.clone(), Arc::new(WordSparse)),
        store,
    );
    let cache = CacheManager::new(
        cache_store,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );

    let searcher = HybridSearcher::new(
        extractor.clone(),
        retriever,
        Reranker::new(Arc::new(WordOverlap)),
        cache,
        RetrievalConfig::default(),
    );

    Harness {
        searcher,
        extractor,
        dense,
    }
}

pub fn memory_cache() -> Arc<dyn CacheStore> {
    Arc::new(MemoryCacheStore::new(1_000))
}

/// Extraction answer for the wizard-school query
pub fn rowling_structured() -> StructuredQuery {
    StructuredQuery {
        rewritten_query: Some(
            "A fantasy novel about a young wizard at a school of magic. Categories: Fantasy, Magic"
                .to_string(),
        ),
        filter: AttributeFilter {
            price_max: Some(10.0),
            authors: vec!["J.K. Rowling".to_string()],
            ..Default::default()
        },
    }
}
