use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::RETRY_AFTER};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    provider::{ApiStyle, Provider},
};

const SERVICE: &str = "text generation";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A text-generation service: system prompt plus user prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;
}

pub struct LlmClient {
    provider: Provider,
    model: String,
    api_key: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl LlmClient {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let api_key = config.provider.validate_api_key()?;
        Ok(Self {
            provider: config.provider,
            model: config.model(),
            api_key,
            http: reqwest::Client::new(),
            timeout: config.generation_timeout,
        })
    }

    fn build_request(&self, system: &str, prompt: &str, max_tokens: u32) -> reqwest::RequestBuilder {
        let config = self.provider.config();
        let request = self
            .http
            .post(config.api_url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout);

        match config.style {
            ApiStyle::AnthropicMessages => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "system": system,
                    "messages": [
                        {
                            "role": "user",
                            "content": prompt,
                        },
                    ],
                })),
            ApiStyle::ChatCompletions => request
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "messages": [
                        {
                            "role": "system",
                            "content": system,
                        },
                        {
                            "role": "user",
                            "content": prompt,
                        },
                    ],
                    "temperature": 0.3,
                })),
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let response = self
            .build_request(system, prompt, max_tokens)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(PipelineError::RateLimited {
                service: SERVICE,
                retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::upstream(
                SERVICE,
                format!("{} returned {}: {}", self.provider.name(), status, truncate(&body, 300)),
            ));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let text = match self.provider.config().style {
            ApiStyle::AnthropicMessages => extract_anthropic_text(&body),
            ApiStyle::ChatCompletions => extract_chat_text(&body),
        };

        match text {
            Some(text) if !text.trim().is_empty() => {
                debug!(provider = self.provider.name(), chars = text.len(), "completion received");
                Ok(text)
            }
            _ => Err(PipelineError::upstream(
                SERVICE,
                format!("{} returned no content", self.provider.name()),
            )),
        }
    }
}

fn request_error(err: reqwest::Error, timeout: Duration) -> PipelineError {
    if err.is_timeout() {
        PipelineError::upstream(SERVICE, format!("timed out after {}s", timeout.as_secs()))
    } else {
        PipelineError::upstream(SERVICE, err.to_string())
    }
}

/// Concatenate the text blocks of a Messages API response.
pub fn extract_anthropic_text(response: &Value) -> Option<String> {
    let blocks = response["content"].as_array()?;
    let text: String = blocks
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect();
    Some(text)
}

pub fn extract_chat_text(response: &Value) -> Option<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_blocks_from_messages_response() {
        let response = json!({
            "id": "msg_01",
            "type": "message",
            "content": [
                {"type": "text", "text": "안녕하세요, "},
                {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                {"type": "text", "text": "여러분."}
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(
            extract_anthropic_text(&response).as_deref(),
            Some("안녕하세요, 여러분.")
        );
    }

    #[test]
    fn extracts_first_choice_from_chat_response() {
        let response = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "번역문"}}]
        });
        assert_eq!(extract_chat_text(&response).as_deref(), Some("번역문"));
        assert_eq!(extract_chat_text(&json!({"error": "nope"})), None);
    }

    #[test]
    fn missing_content_array_is_none() {
        assert_eq!(extract_anthropic_text(&json!({"type": "error"})), None);
    }
}
