//! Query structuring: free text in, partial attribute record plus a rewritten
//! retrieval query out

mod extractor;

pub use extractor::{parse_structured, LlmFilterExtractor, SYSTEM_PROMPT};

use crate::filter::AttributeFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Extraction request failed: {0}")]
    RequestError(String),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),
}

/// Output of extraction. Only confidently inferred fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Semantically rich rewrite used instead of the raw text for retrieval
    #[serde(
        rename = "rewrite_query",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rewritten_query: Option<String>,

    #[serde(flatten)]
    pub filter: AttributeFilter,
}

impl StructuredQuery {
    /// Strip blank or unset values so only asserted constraints remain
    pub fn pruned(self) -> Self {
        Self {
            rewritten_query: self
                .rewritten_query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            filter: self.filter.pruned(),
        }
    }
}

/// Structured-extraction collaborator
#[async_trait]
pub trait FilterExtractor: Send + Sync {
    /// Convert a raw query into a structured query. Failures are hard errors;
    /// callers decide whether to fall back to an unfiltered search.
    async fn extract(&self, raw_query: &str) -> Result<StructuredQuery, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_serialization() {
        let query = StructuredQuery {
            rewritten_query: Some("Fantasy novels".to_string()),
            filter: AttributeFilter {
                price_max: Some(10.0),
                ..Default::default()
            },
        };

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({"rewrite_query": "Fantasy novels", "price_max": 10.0})
        );
    }

    #[test]
    fn test_flattened_deserialization() {
        let query: StructuredQuery = serde_json::from_str(
            r#"{"rewrite_query": " Epic fantasy. Categories: Fantasy ", "authors": ["J.K. Rowling"], "rating_min": null, "rating_count_min": 100}"#,
        )
        .unwrap();
        let query = query.pruned();

        assert_eq!(
            query.rewritten_query.as_deref(),
            Some("Epic fantasy. Categories: Fantasy")
        );
        assert_eq!(query.filter.authors, vec!["J.K. Rowling"]);
        assert_eq!(query.filter.rating_min, None);
        assert_eq!(query.filter.rating_count_min, Some(100));
    }
}
