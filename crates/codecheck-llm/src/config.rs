//! Chat-completions endpoint configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// First non-empty value among `keys`.
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Endpoint, credentials and call limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended
    pub api_base: String,
    /// Bearer token (optional for local servers)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Attempts per request, including the first
    pub max_retries: u32,
    /// Delay before the second attempt; doubles after each failure
    pub backoff_base_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base: env_first(&["CODECHECK_API_BASE", "OPENAI_API_BASE"])
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: env_first(&["CODECHECK_API_KEY", "OPENAI_API_KEY"]),
            model: env_first(&["CODECHECK_MODEL", "OPENAI_MODEL_NAME"])
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: 0.0,
            max_tokens: 2000,
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

impl LlmConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint, ignoring the environment
    pub fn new(api_base: &str, model: &str) -> Self {
        LlmConfig {
            api_base: api_base.to_string(),
            api_key: None,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries.max(1);
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Full URL of the completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Delay before attempt `attempt` (1-based; the first attempt has none)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        match attempt {
            0 | 1 => 0,
            n => self.backoff_base_ms.saturating_mul(1u64 << (n - 2).min(16)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_new() {
        let config = LlmConfig::new("http://localhost:11434/v1/", "llama3");
        assert_eq!(config.completions_url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.temperature, 0.0);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_llm_config_builders() {
        let config = LlmConfig::new(DEFAULT_API_BASE, DEFAULT_MODEL)
            .with_api_key("sk-test")
            .with_model("gpt-4o-mini");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_backoff_doubles() {
        let config = LlmConfig::new(DEFAULT_API_BASE, DEFAULT_MODEL);
        assert_eq!(config.backoff_ms(1), 0);
        assert_eq!(config.backoff_ms(2), 500);
        assert_eq!(config.backoff_ms(3), 1000);
        assert_eq!(config.backoff_ms(4), 2000);
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = LlmConfig::new(DEFAULT_API_BASE, DEFAULT_MODEL).with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
