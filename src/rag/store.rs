//! Persisted vector collection.
//!
//! A collection is a single JSON file, `{dir}/{collection}.json`, holding
//! every chunk with its embedding. The catalogue is small enough for exact
//! cosine search over all records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Document, RagError};

/// A stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, Copy)]
pub struct ScoredRecord<'a> {
    pub record: &'a Record,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    collection: String,
    embedding_model: String,
    built_at: DateTime<Utc>,
    records: Vec<Record>,
}

impl VectorStore {
    pub fn new(collection: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            embedding_model: embedding_model.into(),
            built_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn path_for(dir: &Path, collection: &str) -> PathBuf {
        dir.join(format!("{collection}.json"))
    }

    pub async fn load(dir: &Path, collection: &str) -> Result<Self, RagError> {
        let path = Self::path_for(dir, collection);
        if !tokio::fs::try_exists(&path).await? {
            return Err(RagError::MissingCollection(path));
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes the collection, replacing any previous file. Returns its path.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, RagError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = Self::path_for(dir, &self.collection);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(self)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    pub fn add(&mut self, doc: Document, embedding: Vec<f32>) -> Uuid {
        let id = Uuid::new_v4();
        self.records.push(Record {
            id,
            text: doc.content,
            metadata: doc.metadata,
            embedding,
        });
        id
    }

    /// The `k` records most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredRecord<'_>> {
        let mut hits: Vec<ScoredRecord<'_>> = self
            .records
            .iter()
            .map(|record| ScoredRecord {
                record,
                score: cosine_similarity(query, &record.embedding),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
