//! LLM client traits and implementations.
//!
//! The chat server needs two things from a model provider: a single-shot
//! completion for the answer and embeddings for retrieval. Both are exposed
//! as traits so the retrieval chain can be exercised without a network.
//!
//! # Overview
//!
//! - [`ChatModel`]: complete a conversation with a named model
//! - [`Embedder`]: embed a batch of texts
//! - [`ChatCompletionsClient`]: both traits over the `OpenAI` wire format
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_chat::llm::{ChatCompletionsClient, ChatModel, LlmSettings, Message};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = LlmSettings {
//!     api_key: Some("AIza...".to_string()),
//!     ..LlmSettings::default()
//! };
//! let client = ChatCompletionsClient::new(settings.clone())?;
//! let answer = client
//!     .complete(&settings.model, &[Message::user("Hello!")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsClient;
pub use provider::Provider;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default base URL: Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API.
    pub base_url: String,
    /// Optional API key, sent as a bearer token.
    pub api_key: Option<String>,
    /// Model used for answers.
    pub model: String,
    /// Lighter model tried after a quota error.
    pub fallback_model: String,
    /// Model used for embeddings.
    pub embedding_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Retries for transport failures and 5xx responses.
    pub max_retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            fallback_model: "gemini-1.5-flash-8b".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: 0.3,
            max_output_tokens: 256,
            max_retries: 2,
            timeout: Duration::from_secs(60),
            provider: Provider::Gemini,
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("fallback_model", &self.fallback_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Role of a message author. The chain sends one user turn per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Errors from an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered 2xx with a body we could not use.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether this error means the model's quota or rate limit is exhausted.
    pub fn is_quota_exhausted(&self) -> bool {
        if let Self::Api { status: 429, .. } = self {
            return true;
        }
        let msg = self.to_string();
        msg.contains("429")
            || msg.contains("ResourceExhausted")
            || msg.contains("RESOURCE_EXHAUSTED")
            || msg.to_lowercase().contains("quota")
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Quota errors are not retried; they go to the fallback model instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            Self::Malformed(_) => false,
        }
    }
}

/// A model that can complete a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the assistant text; empty when the model produced none.
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String, LlmError>;
}

/// A model that turns texts into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}
