use serde::{Deserialize, Serialize};
use tdx_core::error::{AppError, ErrorKind};

use super::Embedder;
use crate::provider::ProviderClient;

const MAX_INPUT_BYTES: usize = 24_000;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: ProviderClient,
}

impl OpenAiEmbedder {
    pub fn new(client: ProviderClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Cut at a char boundary at or below `max` bytes.
fn clamp_input(input: &str, max: usize) -> &str {
    if input.len() <= max {
        return input;
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let req = EmbeddingsRequest {
            model,
            input: clamp_input(input, MAX_INPUT_BYTES),
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(
                ErrorKind::Provider,
                "AI_EMBEDDINGS_FAILED",
                "Failed to encode embeddings request",
            )
            .with_details(e.to_string())
        })?;

        let resp = self
            .client
            .post_json("embeddings", body, "AI_EMBEDDINGS_FAILED")?;
        let v: EmbeddingsResponse = resp.into_json().map_err(|e| {
            AppError::new(
                ErrorKind::Provider,
                "AI_EMBEDDINGS_FAILED",
                "Failed to decode embeddings response",
            )
            .with_details(e.to_string())
        })?;

        let embedding = v
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        if embedding.is_empty() {
            return Err(AppError::new(
                ErrorKind::Provider,
                "AI_EMBEDDINGS_FAILED",
                "Embeddings response was empty",
            ));
        }
        Ok(embedding)
    }
}
