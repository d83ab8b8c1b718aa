//! OpenAI-compatible chat-completions client
//!
//! Sends the request's system and user prompts, retries transient failures
//! with exponential backoff, and extracts the JSON answer from the reply.

use std::time::Duration;

use async_trait::async_trait;
use codecheck_core::{GenerationError, GenerationRequest, Reasoner};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::extract::extract_json;
use crate::Result;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `Reasoner` backed by a chat-completions endpoint
pub struct ChatCompletionsReasoner {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl ChatCompletionsReasoner {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("codecheck-llm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(ChatCompletionsReasoner {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env())
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send one prompt pair and return the reply text, retrying transient
    /// failures up to `max_retries` attempts in total.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;
        loop {
            let backoff = self.config.backoff_ms(attempt);
            if backoff > 0 {
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            match self.send(system, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, error = %e, "completion attempt failed; retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, system: &str, prompt: &str) -> Result<String> {
        let url = self.config.completions_url();
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&url, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(&url, e))?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;
        debug!(chars = content.len(), "completion received");
        Ok(content)
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs * 1000)
        } else if err.is_connect() {
            LlmError::Connect(url.to_string())
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl Reasoner for ChatCompletionsReasoner {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest) -> std::result::Result<Value, GenerationError> {
        let text = self.complete(&request.system, &request.prompt).await?;
        Ok(extract_json(&text)?)
    }
}
