//! Codecheck-LLM: chat-completions backend for the codecheck engine
//!
//! Implements [`codecheck_core::Reasoner`] over any OpenAI-compatible
//! `/chat/completions` endpoint.

pub mod client;
pub mod config;
pub mod error;
pub mod extract;

pub use client::ChatCompletionsReasoner;
pub use config::LlmConfig;
pub use error::LlmError;
pub use extract::extract_json;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;
