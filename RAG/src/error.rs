use thiserror::Error;

/// Errors produced by the ingest and query pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported file type: '{0}' (expected pdf, docx, txt or md)")]
    UnsupportedFileType(String),

    #[error("No text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("Query parameter is required")]
    EmptyQuery,

    #[error("No vector index found at {0}; ingest a document first")]
    IndexNotFound(String),

    #[error("Vector index was built with '{stored}' but the active embedding model is '{active}'")]
    ModelMismatch { stored: String, active: String },

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl From<zip::result::ZipError> for RagError {
    fn from(e: zip::result::ZipError) -> Self {
        RagError::Docx(e.to_string())
    }
}

impl From<pdf_extract::OutputError> for RagError {
    fn from(e: pdf_extract::OutputError) -> Self {
        RagError::Pdf(format!("{e:?}"))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
