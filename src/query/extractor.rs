//! LLM-backed extraction over an OpenAI-compatible chat-completions API

use super::{ExtractionError, FilterExtractor, StructuredQuery};
use crate::config::ExtractionConfig;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Fixed instruction sent with every extraction request
pub const SYSTEM_PROMPT: &str = r#"You turn book search queries into a JSON object for a bookstore search engine.
Interpret the meaning of the query rather than its keywords. Only fill a field when the query clearly implies it; otherwise set it to null.

Fields:
- rewrite_query: the query restated as one clear sentence, followed by a final line "Categories: <comma-separated inferred genres or themes>". Never mention author names here.
- price_min / price_max: price bounds in US dollars
- rating_min / rating_max: rating bounds on a 0-5 scale, when quality is implied
- rating_count_min / rating_count_max: bounds on the number of ratings, when popularity is implied
- authors: list of author names mentioned in the query
- categories: list of genres the user explicitly restricts the search to

Example
Query: "something about a boy at a wizard school by j.k rowling under 10.5 dollars"
Output:
{"rewrite_query": "A fantasy novel about a young boy attending a school of magic. Categories: Fantasy, Magic, Young Adult", "price_min": null, "price_max": 10.5, "rating_min": null, "rating_max": null, "rating_count_min": null, "rating_count_max": null, "authors": ["J.K. Rowling"], "categories": null}

Answer with the JSON object only."#;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extractor calling a chat-completions endpoint with a JSON response format
pub struct LlmFilterExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
    api_key_env: String,
}

impl LlmFilterExtractor {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
            api_key,
            api_key_env: String::new(),
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; query extraction will fail",
                config.api_key_env
            );
        }

        let mut extractor = Self::new(
            &config.base_url,
            &config.model,
            config.temperature,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;
        extractor.api_key_env = config.api_key_env.clone();
        Ok(extractor)
    }
}

#[async_trait]
impl FilterExtractor for LlmFilterExtractor {
    async fn extract(&self, raw_query: &str) -> Result<StructuredQuery, ExtractionError> {
        tracing::info!("Start extract query: {}", raw_query);

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ExtractionError::MissingApiKey(self.api_key_env.clone()))?;

        let user_message = format!("Query: {}", raw_query);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::RequestError(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::MalformedResponse("no message content".to_string()))?;

        parse_structured(&content)
    }
}

/// Parse model output into a pruned structured query.
///
/// Accepts a bare JSON object or one wrapped in a fenced code block.
pub fn parse_structured(content: &str) -> Result<StructuredQuery, ExtractionError> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("fence pattern is valid")
    });

    let trimmed = content.trim();
    let json = fence
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let parsed: StructuredQuery = serde_json::from_str(json)
        .map_err(|e| ExtractionError::MalformedResponse(format!("{}: {}", e, json)))?;

    Ok(parsed.pruned())
}
