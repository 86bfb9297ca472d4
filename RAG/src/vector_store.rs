//! Flat vector index persisted as JSON on local disk.
//!
//! Search is an exact cosine scan over every stored vector. An ingest
//! replaces the whole index, matching the one-document-at-a-time workflow
//! of the front ends.

use crate::embedding_service::{cosine_similarity, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{DocumentChunk, ScoredChunk};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::Path;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    model: String,
    dimensions: usize,
    entries: Vec<StoredVector>,
}

impl VectorStore {
    /// Embeds every chunk and builds an in-memory store.
    pub async fn from_chunks(
        chunks: Vec<DocumentChunk>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_documents(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(RagError::Embedding(format!(
                "embedding {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                dimensions
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| StoredVector { chunk, vector })
            .collect();

        Ok(Self {
            model: embedder.model_name().to_string(),
            dimensions,
            entries,
        })
    }

    /// Writes `index.json` into `dir`, replacing any previous index atomically.
    pub fn save_local(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.flush()?;
        tmp.persist(dir.join(INDEX_FILE))
            .map_err(|e| RagError::Io(e.error))?;

        log::info!(
            "Saved vector index with {} entries to {}",
            self.entries.len(),
            dir.display()
        );
        Ok(())
    }

    pub fn load_local(dir: &Path, expected_model: &str) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        if !path.is_file() {
            return Err(RagError::IndexNotFound(dir.display().to_string()));
        }

        let raw = fs::read_to_string(&path)?;
        let store: VectorStore = serde_json::from_str(&raw)?;

        if store.model != expected_model {
            return Err(RagError::ModelMismatch {
                stored: store.model,
                active: expected_model.to_string(),
            });
        }

        log::debug!("Loaded vector index with {} entries", store.entries.len());
        Ok(store)
    }

    pub fn similarity_search(&self, query_vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .par_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let score = cosine_similarity(query_vector, &entry.vector);
                (idx, if score.is_nan() { f32::MIN } else { score })
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredChunk {
                chunk: self.entries[idx].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Distinct chunk sources in insertion order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !sources.contains(&entry.chunk.source) {
                sources.push(entry.chunk.source.clone());
            }
        }
        sources
    }
}
