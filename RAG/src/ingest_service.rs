use crate::document_processor::DocumentProcessor;
use crate::embedding_service::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::models::*;
use crate::vector_store::VectorStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const INGEST_SUCCESS_MESSAGE: &str = "Document processed successfully!";

pub struct IngestService {
    processor: DocumentProcessor,
    embedding_service: Arc<dyn EmbeddingProvider>,
    index_dir: PathBuf,
}

impl IngestService {
    pub fn new(
        processor: DocumentProcessor,
        embedding_service: Arc<dyn EmbeddingProvider>,
        index_dir: PathBuf,
    ) -> Self {
        Self {
            processor,
            embedding_service,
            index_dir,
        }
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let processor = self.processor;
        let owned_path = path.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || processor.load(&owned_path))
            .await
            .map_err(|e| RagError::Other(e.into()))??;

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.index_documents(source, documents).await
    }

    /// Upload path: the bytes never need to exist anywhere but a temp file.
    pub async fn ingest_bytes(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestReport> {
        let processor = self.processor;
        let name = filename.to_string();
        let documents = tokio::task::spawn_blocking(move || processor.load_bytes(&name, &bytes))
            .await
            .map_err(|e| RagError::Other(e.into()))??;

        self.index_documents(filename.to_string(), documents).await
    }

    async fn index_documents(&self, source: String, documents: Vec<Document>) -> Result<IngestReport> {
        let chunks = self.processor.split(&documents);
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument(source));
        }
        let chunk_count = chunks.len();

        log::info!(
            "Embedding {} chunks from {} with {}",
            chunk_count,
            source,
            self.embedding_service.model_name()
        );
        let store = VectorStore::from_chunks(chunks, self.embedding_service.as_ref()).await?;
        store.save_local(&self.index_dir)?;

        log::info!("Created and saved new vector index for {}", source);

        Ok(IngestReport {
            source,
            documents: documents.len(),
            chunks: chunk_count,
            message: INGEST_SUCCESS_MESSAGE.to_string(),
        })
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}
