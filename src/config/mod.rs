//! Configuration management for booksearch
//!
//! Loads a TOML file, applies `BOOKSEARCH_SECTION__KEY` environment overrides
//! and validates the result. Every section has defaults, so a partial file
//! (or none at all) yields a usable configuration.

use crate::error::{BookSearchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub dense: DenseConfig,
    pub sparse: SparseConfig,
    pub vector_store: VectorStoreConfig,
    pub extraction: ExtractionConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

/// RPC listener and worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Requests handled concurrently; further connections wait in the backlog
    pub max_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            max_workers: 10,
        }
    }
}

/// Where cached entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Shared Redis instance, visible to every server process
    Redis,
    /// Process-local store, lost on restart
    Memory,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Per-command timeout against Redis
    pub redis_timeout_ms: u64,
    pub structured_ttl_secs: u64,
    pub result_ttl_secs: u64,
    /// Capacity of the in-memory backend
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            redis_timeout_ms: 500,
            structured_ttl_secs: 3600,
            result_ttl_secs: 3600,
            max_entries: 10_000,
        }
    }
}

/// Remote dense embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseConfig {
    pub endpoint: String,
    pub model: String,
    pub task: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.jina.ai/v1/embeddings".to_string(),
            model: "jina-embeddings-v3".to_string(),
            task: "text-matching".to_string(),
            api_key_env: "JINAAI_API_KEY".to_string(),
            timeout_secs: 180,
        }
    }
}

/// In-process sparse model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseConfig {
    pub model: String,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            model: "prithivida/Splade_PP_en_v1".to_string(),
        }
    }
}

/// Qdrant connection and collection layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    pub dense_vector: String,
    pub sparse_vector: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "book_collection".to_string(),
            dense_vector: "dense".to_string(),
            sparse_vector: "sparse".to_string(),
            api_key_env: "QDRANT_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// OpenAI-compatible chat-completions endpoint used for query structuring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cerebras.ai/v1".to_string(),
            model: "qwen-3-235b-a22b-instruct-2507".to_string(),
            temperature: 0.0,
            api_key_env: "CEREBRAS_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub model: String,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "jinaai/jina-reranker-v2-base-multilingual".to_string(),
        }
    }
}

/// Defaults applied when a request leaves a parameter unset (or zero)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    pub fusion_top_k: usize,
    pub top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_top_k: 100,
            sparse_top_k: 100,
            fusion_top_k: 50,
            top_n: 10,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BookSearchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BookSearchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(BookSearchError::ConfigNotFound { path }) => {
                tracing::warn!("Config file {:?} not found, using defaults", path);
                let mut config = Config::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BookSearchError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| BookSearchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: BOOKSEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("BOOKSEARCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "SERVER__LISTEN_ADDR" => {
                self.server.listen_addr = value.to_string();
            }
            "SERVER__MAX_WORKERS" => {
                self.server.max_workers = parse_env(path, value)?;
            }
            "CACHE__BACKEND" => {
                self.cache.backend = parse_env(path, value)?;
            }
            "CACHE__REDIS_URL" => {
                self.cache.redis_url = value.to_string();
            }
            "VECTOR_STORE__URL" => {
                self.vector_store.url = value.to_string();
            }
            "VECTOR_STORE__COLLECTION" => {
                self.vector_store.collection = value.to_string();
            }
            "EXTRACTION__MODEL" => {
                self.extraction.model = value.to_string();
            }
            "DENSE__MODEL" => {
                self.dense.model = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BookSearchError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("booksearch").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| BookSearchError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}
