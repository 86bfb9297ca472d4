use crate::error::{RagError, Result};
use crate::models::*;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;

/// Converts text into vectors for indexing and search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Recorded in the index so a store is never searched with another model.
    fn model_name(&self) -> &str;
}

/// OpenAI `/embeddings` client; works against any compatible endpoint.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: String, model: String, base_url: &str, batch_size: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            batch_size: batch_size.max(1),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = OpenAiEmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("{status}: {body}")));
        }

        let parsed: OpenAiEmbeddingResponse = response.json().await?;
        order_embeddings(parsed, texts.len())
    }
}

/// Puts response vectors back in request order and checks the count.
fn order_embeddings(mut response: OpenAiEmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(RagError::Embedding(format!(
            "requested {} embeddings but received {}",
            expected,
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            log::debug!(
                "Embedding batch {} ({} texts) with {}",
                batch_no + 1,
                batch.len(),
                self.model
            );
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("empty response for query".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline embedder: hashed term frequencies, L2-normalised.
pub struct HashingEmbeddings {
    dims: usize,
    model: String,
}

impl HashingEmbeddings {
    pub const DEFAULT_DIMS: usize = 384;

    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            model: format!("hashing-tf-{dims}"),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dims];
        let words = tokenize(text);
        if words.is_empty() {
            return embedding;
        }

        let total_words = words.len() as f32;
        for (word, count) in count_words(&words) {
            let idx = (fnv1a(word.as_bytes()) % self.dims as u64) as usize;
            embedding[idx] += count as f32 / total_words;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }
        embedding
    }
}

impl Default for HashingEmbeddings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| word.chars().count() > 2)
        .collect()
}

fn count_words(words: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for word in words {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }
    counts
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

/// Cosine similarity over the common prefix of two vectors.
pub fn cosine_similarity(embedding1: &[f32], embedding2: &[f32]) -> f32 {
    let min_len = embedding1.len().min(embedding2.len());

    let dot_product: f32 = embedding1[..min_len]
        .iter()
        .zip(embedding2[..min_len].iter())
        .map(|(a, b)| a * b)
        .sum();

    let norm1: f32 = embedding1[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm2: f32 = embedding2[..min_len].iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm1 == 0.0 || norm2 == 0.0 {
        0.0
    } else {
        dot_product / (norm1 * norm2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::StubServer;
    use serde_json::json;

    #[tokio::test]
    async fn hashing_embeddings_are_deterministic_and_normalised() {
        let embedder = HashingEmbeddings::new(64);
        let a = embedder.embed_query("Post goods issue for the delivery").await.unwrap();
        let b = embedder.embed_query("post GOODS issue, for the delivery!").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(embedder.model_name(), "hashing-tf-64");
    }

    #[tokio::test]
    async fn related_texts_score_higher() {
        let embedder = HashingEmbeddings::default();
        let docs = embedder
            .embed_documents(&[
                "Vendor invoice verification with MIRO and payment run".to_string(),
                "Sales order creation and delivery scheduling".to_string(),
            ])
            .await
            .unwrap();
        let query = embedder.embed_query("How is the vendor invoice verified?").await.unwrap();

        assert!(cosine_similarity(&query, &docs[0]) > cosine_similarity(&query, &docs[1]));
    }

    #[tokio::test]
    async fn text_without_tokens_embeds_to_zero() {
        let embedder = HashingEmbeddings::new(8);
        let v = embedder.embed_query("a an ?!").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0, 5.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let response: OpenAiEmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}],"model":"m"}"#,
        )
        .unwrap();
        assert_eq!(order_embeddings(response, 2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn short_embedding_response_is_an_error() {
        let response: OpenAiEmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#).unwrap();
        assert!(matches!(
            order_embeddings(response, 3),
            Err(RagError::Embedding(_))
        ));
    }

    /// Embeds `text-N` as `[N]` and lists the vectors in reverse order.
    fn shuffled_embeddings(body: &serde_json::Value) -> String {
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<serde_json::Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(index, text)| {
                let n: f32 = text
                    .as_str()
                    .and_then(|t| t.strip_prefix("text-"))
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(-1.0);
                json!({ "index": index, "embedding": [n] })
            })
            .collect();
        json!({ "data": data, "model": "text-embedding-ada-002" }).to_string()
    }

    #[tokio::test]
    async fn openai_embeddings_batch_requests_and_keep_order() {
        let server = StubServer::start(|request| (200, shuffled_embeddings(&request.body))).await;
        let embedder = OpenAiEmbeddings::new(
            "sk-test".to_string(),
            "text-embedding-ada-002".to_string(),
            &format!("{}/", server.base_url),
            2,
        );
        let texts: Vec<String> = (0..5).map(|n| format!("text-{n}")).collect();

        let vectors = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(
            vectors,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
        );
        let requests = server.requests();
        let batch_sizes: Vec<usize> = requests
            .iter()
            .map(|r| r.body["input"].as_array().map(|a| a.len()).unwrap_or(0))
            .collect();
        assert_eq!(batch_sizes, vec![2, 2, 1]);
        for request in &requests {
            assert_eq!(request.target, "/embeddings");
            assert_eq!(request.body["model"], "text-embedding-ada-002");
            assert!(request.head.contains("authorization: bearer sk-test"));
        }
    }

    #[tokio::test]
    async fn openai_embeddings_report_status_and_body() {
        let server = StubServer::start(|_| {
            (500, json!({ "error": { "message": "quota exceeded" } }).to_string())
        })
        .await;
        let embedder = OpenAiEmbeddings::new(
            "sk-test".to_string(),
            "text-embedding-ada-002".to_string(),
            &server.base_url,
            100,
        );

        let err = embedder.embed_query("goods receipt").await.unwrap_err();

        match err {
            RagError::Embedding(message) => {
                assert!(message.starts_with("500 Internal Server Error: "), "{message}");
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(server.requests().len(), 1);
    }
}
