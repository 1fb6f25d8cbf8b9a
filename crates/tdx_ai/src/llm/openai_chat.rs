use serde::{Deserialize, Serialize};
use tdx_core::config::ProviderConfig;
use tdx_core::error::{AppError, ErrorKind};

use super::Llm;
use crate::provider::ProviderClient;

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: ProviderClient,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(client: ProviderClient, temperature: f64, max_tokens: u32) -> Self {
        Self {
            client,
            temperature,
            max_tokens,
        }
    }

    pub fn from_config(client: ProviderClient, cfg: &ProviderConfig) -> Self {
        Self::new(client, cfg.temperature, cfg.max_tokens)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Llm for OpenAiChat {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let req = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(
                ErrorKind::Provider,
                "AI_COMPLETION_FAILED",
                "Failed to encode completion request",
            )
            .with_details(e.to_string())
        })?;

        let resp = self
            .client
            .post_json("chat/completions", body, "AI_COMPLETION_FAILED")?;
        let v: ChatResponse = resp.into_json().map_err(|e| {
            AppError::new(
                ErrorKind::Provider,
                "AI_COMPLETION_FAILED",
                "Failed to decode completion response",
            )
            .with_details(e.to_string())
        })?;

        let text = v
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Provider,
                "AI_COMPLETION_FAILED",
                "Completion response was empty",
            ));
        }
        Ok(text)
    }
}
