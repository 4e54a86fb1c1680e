//! The shopping assistant behind `POST /chat`.
//!
//! Every outcome, including failures, is turned into reply text: the chat
//! endpoint always answers with a message the widget can render.

use tracing::{error, info, warn};

use crate::rag::RetrievalQa;

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";
pub const NO_ANSWER_REPLY: &str = "I couldn't generate an answer.";
pub const RATE_LIMITED_REPLY: &str = "I'm currently rate-limited.";
pub const QUOTA_EXHAUSTED_REPLY: &str = "I'm out of free quota for the selected model. \
Switch to a lighter model (e.g., gemini-1.5-flash) or enable billing.";
pub const SERVER_ERROR_REPLY: &str = "Sorry, something went wrong while processing your request.";

/// Answers shoppers' questions, falling back to a lighter model when the
/// primary one is out of quota.
#[derive(Debug, Clone)]
pub struct ShopAssistant {
    qa: RetrievalQa,
    model: String,
    fallback_model: String,
}

impl ShopAssistant {
    pub fn new(qa: RetrievalQa, model: impl Into<String>, fallback_model: impl Into<String>) -> Self {
        Self {
            qa,
            model: model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    pub async fn reply(&self, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        match self.qa.answer(message, &self.model).await {
            Ok(answer) => {
                info!(
                    name: "chat.answered",
                    model = %self.model,
                    sources = answer.sources.len(),
                    "Answered chat message"
                );
                non_empty_or(answer.text, NO_ANSWER_REPLY)
            }
            Err(e) if e.is_quota_exhausted() => {
                warn!(
                    name: "chat.quota_exhausted",
                    model = %self.model,
                    fallback = %self.fallback_model,
                    error = %e,
                    "Primary model out of quota, trying fallback"
                );
                match self.qa.answer(message, &self.fallback_model).await {
                    Ok(answer) => non_empty_or(answer.text, RATE_LIMITED_REPLY),
                    Err(e) => {
                        warn!(error = %e, "Fallback model failed");
                        QUOTA_EXHAUSTED_REPLY.to_string()
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Server error");
                SERVER_ERROR_REPLY.to_string()
            }
        }
    }
}

fn non_empty_or(text: String, default: &str) -> String {
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatModel, Embedder, LlmError, Message};
    use crate::rag::{Document, Retriever, VectorStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Flat;

    #[async_trait]
    impl Embedder for Flat {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    /// Per-model scripted behaviour; unknown models answer "ok".
    #[derive(Default)]
    struct PerModel {
        errors: HashMap<&'static str, fn() -> LlmError>,
        answers: HashMap<&'static str, &'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for PerModel {
        async fn complete(&self, model: &str, _messages: &[Message]) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(model.to_string());
            if let Some(make) = self.errors.get(model) {
                return Err(make());
            }
            Ok(self.answers.get(model).copied().unwrap_or("ok").to_string())
        }
    }

    fn quota() -> LlmError {
        LlmError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED".into(),
        }
    }

    fn broken() -> LlmError {
        LlmError::Malformed("unexpected end of input".into())
    }

    fn assistant(llm: Arc<PerModel>) -> ShopAssistant {
        let mut store = VectorStore::new("products", "flat");
        store.add(Document::new("name: Mug"), vec![1.0]);
        let retriever = Retriever::new(Arc::new(store), Arc::new(Flat), 3);
        ShopAssistant::new(RetrievalQa::new(retriever, llm), "primary", "lite")
    }

    #[tokio::test]
    async fn test_blank_message() {
        let llm = Arc::new(PerModel::default());
        assert_eq!(assistant(Arc::clone(&llm)).reply("  ").await, EMPTY_MESSAGE_REPLY);
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primary_answer() {
        let llm = Arc::new(PerModel {
            answers: HashMap::from([("primary", "Mugs are $12.")]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply(" price of mug? ").await, "Mugs are $12.");
    }

    #[tokio::test]
    async fn test_empty_answer() {
        let llm = Arc::new(PerModel {
            answers: HashMap::from([("primary", "")]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply("hi").await, NO_ANSWER_REPLY);
    }

    #[tokio::test]
    async fn test_whitespace_answer_is_kept() {
        let llm = Arc::new(PerModel {
            answers: HashMap::from([("primary", " \n ")]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply("hi").await, " \n ");

        let llm = Arc::new(PerModel {
            errors: HashMap::from([("primary", quota as fn() -> LlmError)]),
            answers: HashMap::from([("lite", "  ")]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply("hi").await, "  ");
    }

    #[tokio::test]
    async fn test_quota_falls_back() {
        let llm = Arc::new(PerModel {
            errors: HashMap::from([("primary", quota as fn() -> LlmError)]),
            answers: HashMap::from([("lite", "Hello from lite")]),
            ..PerModel::default()
        });
        let reply = assistant(Arc::clone(&llm)).reply("hi").await;
        assert_eq!(reply, "Hello from lite");
        assert_eq!(*llm.calls.lock().unwrap(), vec!["primary", "lite"]);
    }

    #[tokio::test]
    async fn test_empty_fallback_answer() {
        let llm = Arc::new(PerModel {
            errors: HashMap::from([("primary", quota as fn() -> LlmError)]),
            answers: HashMap::from([("lite", "")]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply("hi").await, RATE_LIMITED_REPLY);
    }

    #[tokio::test]
    async fn test_fallback_failure() {
        let llm = Arc::new(PerModel {
            errors: HashMap::from([
                ("primary", quota as fn() -> LlmError),
                ("lite", quota as fn() -> LlmError),
            ]),
            ..PerModel::default()
        });
        assert_eq!(assistant(llm).reply("hi").await, QUOTA_EXHAUSTED_REPLY);
    }

    #[tokio::test]
    async fn test_other_errors() {
        let llm = Arc::new(PerModel {
            errors: HashMap::from([("primary", broken as fn() -> LlmError)]),
            ..PerModel::default()
        });
        let reply = assistant(Arc::clone(&llm)).reply("hi").await;
        assert_eq!(reply, SERVER_ERROR_REPLY);
        assert_eq!(*llm.calls.lock().unwrap(), vec!["primary"]);
    }
}
