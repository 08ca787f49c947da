//! LLM tag extractor: structured-output chat/completion request over a batch
//! of tagless jobs, used only by the store's `fill_missing_tags` backfill
//! job — never at parse time.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::http::{retry_with_policy, ClientFactory, HttpError, RequestOverrides, RetryPolicy};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TAGS: usize = 5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("llm response did not match the requested schema: {0}")]
    SchemaMismatch(String),

    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,
}

/// One job's link/title/description, the input unit the batch prompt needs.
#[derive(Debug, Clone)]
pub struct TagBatchInput {
    pub link: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TagResult {
    link: String,
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagResultBatch {
    results: Vec<TagResult>,
}

pub struct LlmTagExtractor {
    api_key: Option<String>,
    model: String,
    factory: ClientFactory,
    policy: RetryPolicy,
}

impl LlmTagExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            factory: ClientFactory::new(config.openai_read_timeout()),
            policy: RetryPolicy::default(),
        }
    }

    /// POST a structured-output request covering every input in `batch`,
    /// returning `link → tags[]` for entries whose link matches an input.
    /// Any returned entry whose link doesn't match an input is ignored.
    pub async fn extract_tags(
        &self,
        batch: &[TagBatchInput],
    ) -> Result<HashMap<String, Vec<String>>, LlmError> {
        if batch.is_empty() {
            return Ok(HashMap::new());
        }

        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;
        let links: Vec<&str> = batch.iter().map(|i| i.link.as_str()).collect();
        let body = request_body(&self.model, batch, &links);

        let response_text = retry_with_policy(&self.policy, || {
            self.send_once(api_key, &body)
        })
        .await?;

        let batch_result: TagResultBatch = serde_json::from_str(&response_text)
            .map_err(|e| LlmError::SchemaMismatch(e.to_string()))?;

        let input_links: std::collections::HashSet<&str> = links.iter().copied().collect();
        let mut out = HashMap::new();
        for result in batch_result.results {
            if !input_links.contains(result.link.as_str()) {
                warn!(link = result.link, "llm returned a link absent from the input batch, ignoring");
                continue;
            }
            let tags: Vec<String> = result.tags.into_iter().take(MAX_TAGS).collect();
            out.insert(result.link, tags);
        }

        Ok(out)
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<String, HttpError> {
        let response = self
            .factory
            .execute_with_body(
                reqwest::Method::POST,
                CHAT_COMPLETIONS_URL,
                body,
                &RequestOverrides {
                    headers: HashMap::from([(
                        "Authorization".to_string(),
                        format!("Bearer {api_key}"),
                    )]),
                    ..Default::default()
                },
            )
            .await?;

        let envelope: ChatCompletionEnvelope =
            response.json().await.map_err(|e| HttpError::Request {
                url: CHAT_COMPLETIONS_URL.to_string(),
                source: e,
            })?;

        envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| HttpError::Status {
                status: 502,
                url: CHAT_COMPLETIONS_URL.to_string(),
                message: "no choices in chat completion response".to_string(),
                retryable: true,
            })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionEnvelope {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct PromptJob<'a> {
    link: &'a str,
    title: &'a str,
    description: &'a str,
}

/// Build the chat/completions request body: a strict JSON schema requiring
/// exactly one result per input link, plus the system prompt's hard rules
/// (tag cap, technical-skills-only, the "non-tech" fallback).
fn request_body(model: &str, batch: &[TagBatchInput], links: &[&str]) -> Value {
    let jobs: Vec<PromptJob> = batch
        .iter()
        .map(|i| PromptJob {
            link: &i.link,
            title: &i.title,
            description: &i.description,
        })
        .collect();

    let schema = json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "minItems": links.len(),
                "maxItems": links.len(),
                "items": {
                    "type": "object",
                    "properties": {
                        "link": { "type": "string", "enum": links },
                        "tags": {
                            "type": "array",
                            "maxItems": MAX_TAGS,
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["link", "tags"]
                }
            }
        },
        "required": ["results"]
    });

    json!({
        "model": model,
        "response_format": {
            "type": "json_schema",
            "json_schema": { "name": "tag_batch", "schema": schema, "strict": true }
        },
        "messages": [
            {
                "role": "system",
                "content": "You extract skill/category tags from job listings. \
                    Rules: at most 5 tags per job; technical skills only; \
                    use \"non-tech\" for non-technical roles. Return exactly \
                    one result per input link, using only links provided."
            },
            {
                "role": "user",
                "content": serde_json::to_string(&jobs).unwrap_or_default()
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(link: &str) -> TagBatchInput {
        TagBatchInput {
            link: link.to_string(),
            title: "Senior Backend Engineer".to_string(),
            description: "Python, Django, Postgres".to_string(),
        }
    }

    #[test]
    fn empty_batch_short_circuits_without_api_key() {
        let extractor = LlmTagExtractor {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            factory: ClientFactory::new(Duration::from_secs(5)),
            policy: RetryPolicy::new(1),
        };
        let result = futures::executor::block_on(extractor.extract_tags(&[]));
        assert_eq!(result.unwrap(), HashMap::new());
    }

    #[test]
    fn missing_api_key_errors_for_non_empty_batch() {
        let extractor = LlmTagExtractor {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            factory: ClientFactory::new(Duration::from_secs(5)),
            policy: RetryPolicy::new(1),
        };
        let result = futures::executor::block_on(
            extractor.extract_tags(&[input("https://example.com/jobs/1")]),
        );
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn request_body_pins_schema_to_input_links() {
        let batch = vec![input("https://example.com/jobs/1")];
        let body = request_body("gpt-4o-mini", &batch, &["https://example.com/jobs/1"]);
        let enum_values = &body["response_format"]["json_schema"]["schema"]["properties"]["results"]
            ["items"]["properties"]["link"]["enum"];
        assert_eq!(enum_values[0], "https://example.com/jobs/1");
    }
}
