use crate::embedding_service::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm_service::ChatModel;
use crate::models::*;
use crate::prompt::{ContextFormatter, PromptProfile};
use crate::vector_store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;

pub struct QueryService {
    embedding_service: Arc<dyn EmbeddingProvider>,
    chat_model: Arc<dyn ChatModel>,
    formatter: ContextFormatter,
    index_dir: PathBuf,
    top_k: usize,
    profile: PromptProfile,
}

impl QueryService {
    pub fn new(
        embedding_service: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
        formatter: ContextFormatter,
        index_dir: PathBuf,
        top_k: usize,
    ) -> Self {
        Self {
            embedding_service,
            chat_model,
            formatter,
            index_dir,
            top_k,
            profile: PromptProfile::General,
        }
    }

    pub fn with_profile(mut self, profile: PromptProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn chat_model_name(&self) -> &str {
        self.chat_model.model_name()
    }

    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        self.run(query, self.profile).await
    }

    /// Same retrieval flow, always with the SAP test-case prompt.
    pub async fn generate_test_cases(&self, request: &str) -> Result<QueryResponse> {
        self.run(request, PromptProfile::SapTestCases).await
    }

    async fn run(&self, query: &str, profile: PromptProfile) -> Result<QueryResponse> {
        let start_time = std::time::Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let store = VectorStore::load_local(&self.index_dir, self.embedding_service.model_name())?;

        let query_embedding = self.embedding_service.embed_query(query).await?;
        if !store.is_empty() && query_embedding.len() != store.dimensions() {
            return Err(RagError::Embedding(format!(
                "query embedding has {} dimensions but the index has {}",
                query_embedding.len(),
                store.dimensions()
            )));
        }

        let hits = store.similarity_search(&query_embedding, self.top_k);
        log::info!("Found {} relevant chunks", hits.len());

        let context = self.formatter.format(&hits);
        let messages = profile.template().format(&context.text, query);

        log::info!("Asking {} ({} profile)", self.chat_model.model_name(), profile);
        let response = self.chat_model.complete(&messages).await?;

        // Only passages that fit the context budget were shown to the model.
        let citations = hits[..context.passages]
            .iter()
            .map(Citation::from_hit)
            .collect();
        let processing_time = start_time.elapsed().as_millis();

        Ok(QueryResponse {
            status: "success".to_string(),
            response,
            citations,
            processing_time_ms: processing_time,
        })
    }
}
