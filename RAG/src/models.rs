use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    pub page: Option<usize>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub source: String,
    pub page: Option<usize>,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub response: String,
    pub citations: Vec<Citation>,
    pub processing_time_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub document: String,
    pub text_excerpt: String,
    pub confidence_score: f32,
}

impl Citation {
    const EXCERPT_CHARS: usize = 200;

    pub fn from_hit(hit: &ScoredChunk) -> Self {
        let content = &hit.chunk.content;
        let text_excerpt = if content.chars().count() > Self::EXCERPT_CHARS {
            let head: String = content.chars().take(Self::EXCERPT_CHARS).collect();
            format!("{head}...")
        } else {
            content.clone()
        };

        let document = match hit.chunk.page {
            Some(page) => format!("{} (page {})", hit.chunk.source, page),
            None => hit.chunk.source.clone(),
        };

        Self {
            document,
            text_excerpt,
            confidence_score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub source: String,
    pub documents: usize,
    pub chunks: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// OpenAI-compatible wire types

#[derive(Debug, Serialize)]
pub struct OpenAiChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChatResponse {
    pub choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OpenAiEmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct OpenAiEmbeddingResponse {
    pub data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiEmbeddingData {
    #[serde(default)]
    pub index: usize,
    pub embedding: Vec<f32>,
}

// Gemini wire types

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str, page: Option<usize>) -> ScoredChunk {
        ScoredChunk {
            chunk: DocumentChunk {
                id: "c1".to_string(),
                source: "brd.pdf".to_string(),
                page,
                content: content.to_string(),
                start_position: 0,
                end_position: content.chars().count(),
            },
            score: 0.42,
        }
    }

    #[test]
    fn citation_truncates_on_char_boundaries() {
        let long = "ü".repeat(250);
        let citation = Citation::from_hit(&hit(&long, None));
        assert_eq!(citation.text_excerpt.chars().count(), 203);
        assert!(citation.text_excerpt.ends_with("..."));
        assert_eq!(citation.document, "brd.pdf");
        assert_eq!(citation.confidence_score, 0.42);
    }

    #[test]
    fn citation_names_page_when_known() {
        let citation = Citation::from_hit(&hit("short", Some(4)));
        assert_eq!(citation.text_excerpt, "short");
        assert_eq!(citation.document, "brd.pdf (page 4)");
    }

    #[test]
    fn chat_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn parses_openai_chat_response() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"TC-01"}}]}"#;
        let parsed: OpenAiChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("TC-01"));
    }

    #[test]
    fn parses_gemini_response_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
