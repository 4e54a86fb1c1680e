use serde_json::Value;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

use super::{Document, RagError};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Recursive character splitter.
///
/// Splits at the coarsest boundary that fits (paragraphs, lines, sentences,
/// words, then characters) and carries `overlap` characters between
/// neighbouring chunks.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker").finish_non_exhaustive()
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        let config = ChunkConfig::new(size)
            .with_sizer(Characters)
            .with_overlap(overlap)
            .map_err(|e| RagError::Chunking(e.to_string()))?
            .with_trim(true);
        Ok(Self {
            splitter: TextSplitter::new(config),
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.splitter.chunks(text).map(ToString::to_string).collect()
    }

    /// Splits every document; chunks inherit the metadata plus a `chunk` index.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Document> {
        docs.iter()
            .flat_map(|doc| {
                self.chunk(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(|(i, content)| {
                        let mut metadata = doc.metadata.clone();
                        metadata.insert("chunk".to_string(), Value::from(i));
                        Document { content, metadata }
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = Chunker::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP).unwrap();
        let chunks = chunker.chunk("name: Mug\nprice: 12");
        assert_eq!(chunks, vec!["name: Mug\nprice: 12".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let chunker = Chunker::new(10, 0).unwrap();
        let chunks = chunker.chunk("Hello World From Rust");
        assert!(chunks.len() > 1);
        for c in chunks {
            assert!(c.chars().count() <= 10, "Chunk '{c}' exceeds size 10");
        }
    }

    #[test]
    fn test_overlap_larger_than_size_is_rejected() {
        assert!(matches!(Chunker::new(10, 20), Err(RagError::Chunking(_))));
    }

    #[test]
    fn test_split_documents_keeps_metadata() {
        let chunker = Chunker::new(12, 0).unwrap();
        let doc = Document::new("name: Trail Runner\nprice: 89.99").with_metadata("row", 4);
        let chunks = chunker.split_documents(&[doc]);
        assert!(chunks.len() >= 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata["row"], 4);
            assert_eq!(c.metadata["chunk"], i);
        }
    }
}
