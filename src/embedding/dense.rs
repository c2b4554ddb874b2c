//! Remote dense embeddings over the Jina embeddings HTTP API

use super::{DenseEmbedder, EmbeddingError};
use crate::config::DenseConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    task: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Dense embedder backed by a remote `/v1/embeddings` endpoint
pub struct JinaDenseEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    task: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl JinaDenseEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        task: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            task: task.into(),
            api_key,
            api_key_env: String::new(),
        })
    }

    /// Build from configuration, reading the API key from the configured env var
    pub fn from_config(config: &DenseConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; dense embedding requests will fail",
                config.api_key_env
            );
        }

        let mut embedder = Self::new(
            &config.endpoint,
            &config.model,
            &config.task,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        embedder.api_key_env = config.api_key_env.clone();
        Ok(embedder)
    }
}

#[async_trait]
impl DenseEmbedder for JinaDenseEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::MissingApiKey(self.api_key_env.clone()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&EmbedRequest {
                model: &self.model,
                task: &self.task,
                input: [text],
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestError(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".to_string()))?;

        if embedding.is_empty() {
            return Err(EmbeddingError::MalformedResponse(
                "empty embedding vector".to_string(),
            ));
        }

        tracing::debug!(dim = embedding.len(), model = %self.model, "dense embedding computed");
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(EmbedRequest {
            model: "jina-embeddings-v3",
            task: "text-matching",
            input: ["dragons"],
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "jina-embeddings-v3",
                "task": "text-matching",
                "input": ["dragons"]
            })
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let embedder = JinaDenseEmbedder::new(
            "http://127.0.0.1:9/v1/embeddings",
            "jina-embeddings-v3",
            "text-matching",
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        let err = embedder.embed("dragons").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingApiKey(_)));
    }
}
