//! Storefront chat: a retrieval-augmented shopping assistant.
//!
//! A small Axum server answers shoppers' questions about a product catalogue
//! and serves the chat page; a widget controller drives that page's chat
//! form against the `/chat` endpoint.
//!
//! # Architecture
//!
//! - **Server**: Axum routes for the page, static assets and `POST /chat`
//! - **RAG**: CSV catalogue loading, chunking, a persisted vector collection
//!   and a retrieval QA chain
//! - **LLM**: OpenAI-compatible chat and embeddings client (Gemini by default)
//! - **Widget**: DOM-agnostic chat controller with an HTTP transport
//!
//! # Modules
//!
//! - [`assistant`]: reply policy for chat messages, including model fallback
//! - [`config`]: layered configuration and CLI
//! - [`llm`]: model client traits and implementations
//! - [`pages`]: server-rendered HTML
//! - [`rag`]: catalogue indexing and retrieval
//! - [`widget`]: the chat widget controller

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod assistant;
pub mod config;
pub mod llm;
pub mod pages;
pub mod rag;
pub mod server;
pub mod widget;

use std::sync::Arc;

use crate::assistant::ShopAssistant;
use crate::config::AppConfig;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Answers `/chat` messages.
    pub assistant: Arc<ShopAssistant>,
    /// Global configuration
    pub config: Arc<AppConfig>,
}
