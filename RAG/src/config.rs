use crate::error::{RagError, Result};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_INDEX_DIR: &str = "./FAISS_VECTORS";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_OPENAI_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_GEMINI_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    OpenAi,
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "hashing" | "local" => Ok(Self::Hashing),
            other => Err(RagError::Config(format!(
                "unknown embedding provider '{other}' (expected openai or hashing)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Gemini,
}

impl FromStr for LlmBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(RagError::Config(format!(
                "unknown LLM provider '{other}' (expected openai or gemini)"
            ))),
        }
    }
}

/// Runtime settings for the pipeline, read from the environment.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: Option<String>,
    pub embedding_batch_size: usize,
    pub llm_backend: LlmBackend,
    pub chat_model: Option<String>,
    /// `None` picks the backend's default.
    pub temperature: Option<f32>,
    pub max_output_tokens: u32,
    pub index_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_context_tokens: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embedding_backend: EmbeddingBackend::OpenAi,
            embedding_model: None,
            embedding_batch_size: 100,
            llm_backend: LlmBackend::OpenAi,
            chat_model: None,
            temperature: None,
            max_output_tokens: 1000,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            top_k: 3,
            chunk_size: 4000,
            chunk_overlap: 200,
            max_context_tokens: 12000,
        }
    }
}

impl RagConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            embedding_backend: match get("DOCQA_EMBEDDING_PROVIDER") {
                Some(v) => v.parse()?,
                None => defaults.embedding_backend,
            },
            embedding_model: get("DOCQA_EMBEDDING_MODEL"),
            embedding_batch_size: parse_var(vars, "DOCQA_EMBEDDING_BATCH_SIZE")?
                .unwrap_or(defaults.embedding_batch_size),
            llm_backend: match get("DOCQA_LLM_PROVIDER") {
                Some(v) => v.parse()?,
                None => defaults.llm_backend,
            },
            chat_model: get("DOCQA_CHAT_MODEL"),
            temperature: parse_var(vars, "DOCQA_TEMPERATURE")?,
            max_output_tokens: parse_var(vars, "DOCQA_MAX_OUTPUT_TOKENS")?
                .unwrap_or(defaults.max_output_tokens),
            index_dir: get("DOCQA_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_dir),
            top_k: parse_var(vars, "DOCQA_TOP_K")?.unwrap_or(defaults.top_k),
            chunk_size: parse_var(vars, "DOCQA_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var(vars, "DOCQA_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chunk_overlap),
            max_context_tokens: parse_var(vars, "DOCQA_MAX_CONTEXT_TOKENS")?
                .unwrap_or(defaults.max_context_tokens),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("DOCQA_CHUNK_SIZE must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "DOCQA_CHUNK_OVERLAP ({}) must be smaller than DOCQA_CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "DOCQA_EMBEDDING_BATCH_SIZE must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn embedding_model_name(&self) -> String {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string())
    }

    pub fn chat_model_name(&self) -> String {
        self.chat_model.clone().unwrap_or_else(|| match self.llm_backend {
            LlmBackend::OpenAi => DEFAULT_OPENAI_CHAT_MODEL.to_string(),
            LlmBackend::Gemini => DEFAULT_GEMINI_CHAT_MODEL.to_string(),
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(match self.llm_backend {
            LlmBackend::OpenAi => DEFAULT_OPENAI_TEMPERATURE,
            LlmBackend::Gemini => DEFAULT_GEMINI_TEMPERATURE,
        })
    }

    pub fn require_openai_key(&self) -> Result<String> {
        self.openai_api_key
            .clone()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY environment variable not set".to_string()))
    }

    pub fn require_gemini_key(&self) -> Result<String> {
        self.gemini_api_key
            .clone()
            .ok_or_else(|| RagError::Config("GEMINI_API_KEY environment variable not set".to_string()))
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| RagError::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_target_openai_and_local_index() {
        let config = RagConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.index_dir, PathBuf::from("./FAISS_VECTORS"));
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chat_model_name(), "gpt-4o-mini");
        assert_eq!(config.embedding_model_name(), "text-embedding-ada-002");
        assert_eq!(config.embedding_backend, EmbeddingBackend::OpenAi);
    }

    #[test]
    fn reads_overrides() {
        let config = RagConfig::from_vars(&vars(&[
            ("DOCQA_LLM_PROVIDER", "Gemini"),
            ("DOCQA_TOP_K", "5"),
            ("DOCQA_EMBEDDING_PROVIDER", "hashing"),
            ("DOCQA_INDEX_DIR", "/tmp/idx"),
            ("OPENAI_API_KEY", "  "),
        ]))
        .unwrap();
        assert_eq!(config.llm_backend, LlmBackend::Gemini);
        assert_eq!(config.chat_model_name(), "gemini-2.5-flash");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.index_dir, PathBuf::from("/tmp/idx"));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn temperature_defaults_follow_the_llm_backend() {
        let openai = RagConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(openai.temperature(), 0.7);

        let gemini = RagConfig::from_vars(&vars(&[("DOCQA_LLM_PROVIDER", "gemini")])).unwrap();
        assert_eq!(gemini.temperature(), 0.3);

        let pinned = RagConfig::from_vars(&vars(&[
            ("DOCQA_LLM_PROVIDER", "gemini"),
            ("DOCQA_TEMPERATURE", "0.9"),
        ]))
        .unwrap();
        assert_eq!(pinned.temperature(), 0.9);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = RagConfig::from_vars(&vars(&[("DOCQA_TOP_K", "three")])).unwrap_err();
        assert!(err.to_string().contains("DOCQA_TOP_K"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let err = RagConfig::from_vars(&vars(&[
            ("DOCQA_CHUNK_SIZE", "100"),
            ("DOCQA_CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn missing_key_names_the_variable() {
        let config = RagConfig::default();
        let err = config.require_openai_key().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
