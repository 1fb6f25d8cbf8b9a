use serde::{Deserialize, Serialize};
use tdx_core::error::{AppError, ErrorKind};
use tracing::info;

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::llm::Llm;
use crate::retrieve::{search, QueryHit};

mod prompts;

pub const DEFAULT_TOP_K: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<QueryHit>,
}

/// Retrieve-then-complete over a [`VectorIndex`]. Stateless: every call re-embeds
/// the question and requests a fresh completion.
pub struct QueryEngine<'a> {
    embedder: &'a dyn Embedder,
    llm: &'a dyn Llm,
    completion_model: String,
    top_k: u32,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        llm: &'a dyn Llm,
        completion_model: impl Into<String>,
        top_k: u32,
    ) -> Self {
        Self {
            embedder,
            llm,
            completion_model: completion_model.into(),
            top_k,
        }
    }

    pub fn answer(
        &self,
        index: Option<&VectorIndex>,
        question: &str,
    ) -> Result<QueryAnswer, AppError> {
        let index = index.ok_or_else(|| {
            AppError::new(
                ErrorKind::EmptyInput,
                "AI_INDEX_NOT_READY",
                "No index available; build or load one before querying",
            )
        })?;

        let hits = search(index, self.embedder, question, self.top_k)?;
        info!(question, hits = hits.len(), "retrieved context");

        let prompt = prompts::context_qa_prompt(&build_context(&hits), question.trim());
        let answer = self.llm.generate(&self.completion_model, &prompt)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::new(
                ErrorKind::Provider,
                "AI_COMPLETION_FAILED",
                "Completion was empty",
            ));
        }

        Ok(QueryAnswer {
            answer: answer.to_string(),
            sources: hits,
        })
    }
}

fn build_context(hits: &[QueryHit]) -> String {
    hits.iter()
        .map(|h| format!("[row {}]\n{}", h.row_index, h.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
