//! Retriever and "stuff" question-answering chain.
//!
//! The retrieved chunks are stuffed verbatim into a single prompt together
//! with the question; the model is asked once.

use std::sync::Arc;

use tracing::debug;

use super::store::{Record, VectorStore};
use crate::llm::{ChatModel, Embedder, LlmError, Message};

/// Prompt sent to the model. `{context}` and `{question}` are substituted.
pub const PROMPT_TEMPLATE: &str = "You are a helpful shopping assistant. Answer the user's question and act as a natural salesperson and greet customer if they greet you \\n\
If the answer is not in the context, say you don't have that information.\n\n\
Context:\n{context}\n\n\
Question: {question}\n\n\
Answer:";

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Fills [`PROMPT_TEMPLATE`] in one pass, so placeholders inside the
/// substituted text are left alone.
pub fn render_prompt(context: &str, question: &str) -> String {
    let mut out = String::with_capacity(PROMPT_TEMPLATE.len() + context.len() + question.len());
    let mut rest = PROMPT_TEMPLATE;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Finds the chunks closest to a question.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("collection", &self.store.collection())
            .field("records", &self.store.len())
            .field("k", &self.k)
            .finish()
    }
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Self { store, embedder, k }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<Record>, LlmError> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("no embedding returned for query".into()))?;

        Ok(self
            .store
            .search(&query, self.k)
            .into_iter()
            .map(|hit| hit.record.clone())
            .collect())
    }
}

/// An answer with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub text: String,
    pub sources: Vec<Record>,
}

/// Retrieval QA over the catalogue.
#[derive(Clone)]
pub struct RetrievalQa {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for RetrievalQa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalQa")
            .field("retriever", &self.retriever)
            .finish_non_exhaustive()
    }
}

impl RetrievalQa {
    pub fn new(retriever: Retriever, llm: Arc<dyn ChatModel>) -> Self {
        Self { retriever, llm }
    }

    /// Answers `question` with `model`.
    pub async fn answer(&self, question: &str, model: &str) -> Result<QaAnswer, LlmError> {
        let sources = self.retriever.retrieve(question).await?;
        let context = sources
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = render_prompt(&context, question);

        debug!(model, sources = sources.len(), "asking model");
        let text = self.llm.complete(model, &[Message::user(prompt)]).await?;
        Ok(QaAnswer { text, sources })
    }
}
