use tdx_core::error::AppError;

pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod openai_embed;
