use crate::error::{RagError, Result};
use crate::llm_service::ChatModel;
use crate::models::*;
use async_trait::async_trait;
use reqwest::Client;

pub struct GeminiChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiChat {
    pub fn new(
        api_key: String,
        model: String,
        base_url: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
            max_output_tokens,
        }
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: flatten_messages(messages),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            }),
        }
    }
}

/// Gemini gets a single prompt: system text first, then the user turn.
fn flatten_messages(messages: &[ChatMessage]) -> String {
    let mut system = Vec::new();
    let mut conversation = Vec::new();
    for message in messages {
        match message.role {
            ChatRole::System => system.push(message.content.as_str()),
            ChatRole::User => conversation.push(message.content.clone()),
            ChatRole::Assistant => conversation.push(format!("Assistant: {}", message.content)),
        }
    }

    let mut prompt = system.join("\n\n");
    if !prompt.is_empty() && !conversation.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(&conversation.join("\n\n"));
    prompt
}

fn first_candidate_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .unwrap_or_else(|| "No response generated".to_string())
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(messages);
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("Gemini API error {status}: {error_text}")));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Ok(first_candidate_text(gemini_response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
