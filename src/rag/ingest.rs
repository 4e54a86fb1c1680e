//! Building the product collection from the catalogue CSV.

use std::path::PathBuf;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::info;

use super::chunking::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use super::csv_loader::{CsvOptions, load_csv_documents};
use super::store::VectorStore;
use super::{DEFAULT_COLLECTION, RagError};
use crate::llm::Embedder;

/// Texts per embeddings request.
const EMBED_BATCH_SIZE: usize = 100;
/// Embeddings requests in flight at once.
const EMBED_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub csv_path: PathBuf,
    pub csv: CsvOptions,
    pub persist_dir: PathBuf,
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("products.csv"),
            csv: CsvOptions::default(),
            persist_dir: PathBuf::from("chroma_db"),
            collection: DEFAULT_COLLECTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_model: String::new(),
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub path: PathBuf,
}

/// Loads, splits, embeds and persists the catalogue, replacing any
/// previous collection of the same name.
pub async fn build_vector_store(
    opts: &IndexOptions,
    embedder: &dyn Embedder,
) -> Result<IndexReport, RagError> {
    let docs = load_csv_documents(&opts.csv_path, opts.csv).await?;
    let chunker = Chunker::new(opts.chunk_size, opts.chunk_overlap)?;
    let chunks = chunker.split_documents(&docs);

    info!(
        name: "rag.index.chunked",
        documents = docs.len(),
        chunks = chunks.len(),
        "Catalogue split into chunks"
    );

    let embeddings: Vec<Vec<Vec<f32>>> = stream::iter(chunks.chunks(EMBED_BATCH_SIZE))
        .map(|batch| {
            let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
            async move { embedder.embed(&texts).await }
        })
        .buffered(EMBED_CONCURRENCY)
        .try_collect()
        .await?;

    let mut store = VectorStore::new(&opts.collection, &opts.embedding_model);
    let chunk_count = chunks.len();
    for (doc, embedding) in chunks.into_iter().zip(embeddings.into_iter().flatten()) {
        store.add(doc, embedding);
    }

    let path = store.save(&opts.persist_dir).await?;

    info!(
        name: "rag.index.built",
        collection = %opts.collection,
        chunks = chunk_count,
        path = %path.display(),
        "Vector store built"
    );

    Ok(IndexReport {
        documents: docs.len(),
        chunks: chunk_count,
        path,
    })
}
