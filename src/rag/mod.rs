//! Retrieval-augmented answering over the product catalogue.
//!
//! # Structure
//!
//! - [`csv_loader`]: rows of `products.csv` as [`Document`]s
//! - [`chunking`]: character-based splitting of documents
//! - [`store`]: the persisted vector collection
//! - [`pipeline`]: retriever and question-answering chain
//! - [`ingest`]: building the collection from the CSV

pub mod chunking;
pub mod csv_loader;
pub mod ingest;
pub mod pipeline;
pub mod store;

pub use chunking::Chunker;
pub use csv_loader::{CsvOptions, load_csv_documents};
pub use ingest::{IndexOptions, IndexReport, build_vector_store};
pub use pipeline::{PROMPT_TEMPLATE, QaAnswer, RetrievalQa, Retriever};
pub use store::{Record, ScoredRecord, VectorStore};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// Name of the collection holding the catalogue.
pub const DEFAULT_COLLECTION: &str = "products";

/// A unit of retrievable text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Missing CSV: {}", .0.display())]
    MissingCsv(PathBuf),

    #[error("CSV parse error at line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("vector collection not found at {}", .0.display())]
    MissingCollection(PathBuf),

    #[error("invalid chunking configuration: {0}")]
    Chunking(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
