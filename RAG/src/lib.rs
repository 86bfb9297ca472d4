pub mod config;
pub mod document_processor;
pub mod embedding_service;
pub mod error;
pub mod gemini_service;
pub mod ingest_service;
pub mod llm_service;
pub mod models;
pub mod prompt;
pub mod query_service;
pub mod vector_store;

#[cfg(test)]
mod test_server;

pub use config::{EmbeddingBackend, LlmBackend, RagConfig};
pub use document_processor::DocumentProcessor;
pub use embedding_service::{EmbeddingProvider, HashingEmbeddings, OpenAiEmbeddings};
pub use error::{RagError, Result};
pub use gemini_service::GeminiChat;
pub use ingest_service::IngestService;
pub use llm_service::{ChatModel, OpenAiChat};
pub use models::*;
pub use prompt::{ContextFormatter, PromptProfile, PromptTemplate, RenderedContext};
pub use query_service::QueryService;
pub use vector_store::VectorStore;

use std::sync::Arc;

/// Wires the configured providers into the ingest and query services.
pub struct RagLibrary {
    pub ingest_service: IngestService,
    pub query_service: QueryService,
}

impl RagLibrary {
    pub fn new(config: &RagConfig) -> Result<Self> {
        config.validate()?;
        log::info!("Initializing RAG library...");

        let embedding_service = build_embedder(config)?;
        let chat_model = build_chat_model(config)?;
        Self::with_providers(config, embedding_service, chat_model)
    }

    pub fn with_providers(
        config: &RagConfig,
        embedding_service: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let processor = DocumentProcessor::new(config.chunk_size, config.chunk_overlap)?;
        let ingest_service = IngestService::new(
            processor,
            embedding_service.clone(),
            config.index_dir.clone(),
        );
        let query_service = QueryService::new(
            embedding_service,
            chat_model,
            ContextFormatter::new(config.max_context_tokens)?,
            config.index_dir.clone(),
            config.top_k,
        );

        log::info!(
            "RAG library ready (index at {})",
            config.index_dir.display()
        );
        Ok(Self {
            ingest_service,
            query_service,
        })
    }
}

fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(match config.embedding_backend {
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbeddings::new(
            config.require_openai_key()?,
            config.embedding_model_name(),
            &config.openai_base_url,
            config.embedding_batch_size,
        )),
        EmbeddingBackend::Hashing => Arc::new(HashingEmbeddings::default()),
    })
}

fn build_chat_model(config: &RagConfig) -> Result<Arc<dyn ChatModel>> {
    Ok(match config.llm_backend {
        LlmBackend::OpenAi => Arc::new(
            OpenAiChat::new(
                config.require_openai_key()?,
                config.chat_model_name(),
                &config.openai_base_url,
                config.temperature(),
            )
            .with_max_tokens(config.max_output_tokens),
        ),
        LlmBackend::Gemini => Arc::new(GeminiChat::new(
            config.require_gemini_key()?,
            config.chat_model_name(),
            &config.gemini_base_url,
            config.temperature(),
            config.max_output_tokens,
        )),
    })
}
