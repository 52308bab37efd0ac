//! Chat-completions tag suggester.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use archipelago_core::defaults::{SUGGESTED_TAG_COUNT_MAX, SUGGEST_MAX_ATTEMPTS};
use archipelago_core::tags::is_acceptable_suggestion;
use archipelago_core::{normalize_tag_name, Error, Result, TagSuggester};

use super::error::{to_archipelago_error, OpenAIErrorCode};
use super::types::*;
use crate::config::SuggesterConfig;

/// System prompt for one tag per completion. The model is asked to answer in
/// the language of the note.
pub const TAG_SYSTEM_PROMPT: &str = "Придумай тег, который наиболее точно описывает текст этой заметки - одно слово. Отвечай на том же языке, на котором сделан запрос.";

/// Upper bound on completion length; a tag is a single word.
const MAX_TAG_TOKENS: u32 = 16;

/// Normalize a raw model answer into a tag name, or `None` if the answer is
/// not usable (empty, a single character, or too long).
pub fn clean_suggestion(answer: &str) -> Option<String> {
    let tag = normalize_tag_name(answer);
    is_acceptable_suggestion(&tag).then_some(tag)
}

/// Tag suggester backed by an OpenAI-compatible chat completions endpoint.
///
/// Each tag is a separate completion. An answer that does not clean up into a
/// valid tag is retried up to [`SUGGEST_MAX_ATTEMPTS`] times; a transport or
/// API failure aborts the whole suggestion.
pub struct OpenAITagSuggester {
    client: Client,
    config: SuggesterConfig,
}

impl OpenAITagSuggester {
    pub fn new(config: SuggesterConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "suggester",
            url = %config.base_url,
            model = %config.model,
            "Initializing tag suggester"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SuggesterConfig {
        &self.config
    }

    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        req.header("Content-Type", "application/json")
    }

    /// One raw completion for `text`.
    async fn complete(&self, text: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(TAG_SYSTEM_PROMPT), ChatMessage::user(text)],
            temperature: None,
            max_tokens: Some(MAX_TAG_TOKENS),
            stream: false,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Suggester request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Option<OpenAIErrorResponse> = response.json().await.ok();
            let (error_type, message) = body
                .map(|b| (b.error.error_type, b.error.message))
                .unwrap_or_else(|| ("unknown".to_string(), "Unknown error".to_string()));
            let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
            return Err(to_archipelago_error(
                code,
                &format!("{} returned {}", status, message),
            ));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse completion: {}", e)))?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    /// One valid tag, or `None` once every attempt produced an unusable answer.
    async fn suggest_one(&self, text: &str) -> Result<Option<String>> {
        for attempt in 1..=SUGGEST_MAX_ATTEMPTS {
            let answer = self.complete(text).await?;
            match clean_suggestion(&answer) {
                Some(tag) => return Ok(Some(tag)),
                None => debug!(
                    subsystem = "inference",
                    component = "suggester",
                    attempt,
                    answer_len = answer.len(),
                    "Model answer rejected as a tag"
                ),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl TagSuggester for OpenAITagSuggester {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "suggester", op = "suggest_tags", model = %self.config.model, text_len = text.len()))]
    async fn suggest_tags(&self, text: &str, count: usize) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Text for tag suggestion cannot be empty".to_string(),
            ));
        }
        let wanted = match count {
            0 => self.config.default_count,
            n => n.min(SUGGESTED_TAG_COUNT_MAX),
        };

        let start = Instant::now();
        let mut tags: Vec<String> = Vec::with_capacity(wanted);
        for index in 0..wanted {
            match self.suggest_one(text).await? {
                Some(tag) => {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                None if !tags.is_empty() => {
                    warn!(
                        generated = tags.len(),
                        wanted, "Returning partial tag suggestions"
                    );
                    break;
                }
                None => {
                    return Err(Error::Request(format!(
                        "Failed to generate tag {} after {} attempts",
                        index + 1,
                        SUGGEST_MAX_ATTEMPTS
                    )));
                }
            }
        }

        debug!(
            result_count = tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tag suggestion complete"
        );
        Ok(tags)
    }
}
