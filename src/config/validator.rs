use crate::config::{CacheBackend, Config, SCHEMA_VERSION};
use crate::error::{BookSearchError, Result, ValidationError};
use std::net::SocketAddr;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_server(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_models(config, &mut errors);
        Self::validate_endpoints(config, &mut errors);
        Self::validate_extraction(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BookSearchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.listen_addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.listen_addr",
                format!("Invalid socket address: {}", config.server.listen_addr),
            ));
        }

        if config.server.max_workers == 0 {
            errors.push(ValidationError::new(
                "server.max_workers",
                "Worker count must be greater than 0",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.structured_ttl_secs == 0 {
            errors.push(ValidationError::new(
                "cache.structured_ttl_secs",
                "TTL must be greater than 0",
            ));
        }

        if config.cache.result_ttl_secs == 0 {
            errors.push(ValidationError::new(
                "cache.result_ttl_secs",
                "TTL must be greater than 0",
            ));
        }

        if config.cache.backend == CacheBackend::Redis {
            let url = &config.cache.redis_url;
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                errors.push(ValidationError::new(
                    "cache.redis_url",
                    format!("URL must start with redis:// or rediss://, got '{}'", url),
                ));
            }
            if config.cache.redis_timeout_ms == 0 {
                errors.push(ValidationError::new(
                    "cache.redis_timeout_ms",
                    "Timeout must be greater than 0",
                ));
            }
        }

        if config.cache.max_entries == 0 {
            errors.push(ValidationError::new(
                "cache.max_entries",
                "Cache capacity must be greater than 0",
            ));
        }
    }

    fn validate_models(config: &Config, errors: &mut Vec<ValidationError>) {
        let models = [
            ("dense.model", &config.dense.model),
            ("sparse.model", &config.sparse.model),
            ("extraction.model", &config.extraction.model),
            ("reranker.model", &config.reranker.model),
        ];

        for (path, model) in models {
            if model.trim().is_empty() {
                errors.push(ValidationError::new(path, "Model name cannot be empty"));
            }
        }
    }

    fn validate_endpoints(config: &Config, errors: &mut Vec<ValidationError>) {
        let urls = [
            ("dense.endpoint", &config.dense.endpoint),
            ("vector_store.url", &config.vector_store.url),
            ("extraction.base_url", &config.extraction.base_url),
        ];

        for (path, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::new(
                    path,
                    format!("URL must start with http:// or https://, got '{}'", url),
                ));
            }
        }

        if config.vector_store.collection.trim().is_empty() {
            errors.push(ValidationError::new(
                "vector_store.collection",
                "Collection name cannot be empty",
            ));
        }

        if config.dense.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "dense.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_extraction(config: &Config, errors: &mut Vec<ValidationError>) {
        let temp = config.extraction.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "extraction.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;
        let limits = [
            ("retrieval.dense_top_k", retrieval.dense_top_k),
            ("retrieval.sparse_top_k", retrieval.sparse_top_k),
            ("retrieval.fusion_top_k", retrieval.fusion_top_k),
            ("retrieval.top_n", retrieval.top_n),
        ];

        for (path, value) in limits {
            if value == 0 {
                errors.push(ValidationError::new(path, "Default must be greater than 0"));
            }
        }
    }
}
