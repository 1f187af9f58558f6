//! LLM client implementation.

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use mediaforge_protocols::LlmError;

use crate::api::{ChatMessage, ChatRequest, ChatResponse, ContentPart, ImageUrl, MessageContent};

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    caption_model: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a client. `caption_model` falls back to `model` when absent.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        caption_model: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            caption_model,
            client: reqwest::Client::new(),
        }
    }

    /// The model used for plain text prompts.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The model used for caption prompts.
    pub fn caption_model(&self) -> &str {
        self.caption_model.as_deref().unwrap_or(&self.model)
    }

    /// Run a text prompt, optionally with source-field context appended.
    pub async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String, LlmError> {
        let text = match context {
            Some(context) if !context.trim().is_empty() => {
                format!("{prompt}\n\n{context}")
            }
            _ => prompt.to_string(),
        };
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text(text),
            }],
            max_tokens: None,
        };
        self.send(request).await
    }

    /// Run a caption prompt against an image.
    pub async fn caption(
        &self,
        prompt: &str,
        image_bytes: &[u8],
        mime: &str,
    ) -> Result<String, LlmError> {
        let data_url = format!("data:{mime};base64,{}", BASE64.encode(image_bytes));
        let request = ChatRequest {
            model: self.caption_model().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ]),
            }],
            max_tokens: None,
        };
        self.send(request).await
    }

    async fn send(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        debug!(chars = content.len(), "llm completion received");
        Ok(content)
    }
}
