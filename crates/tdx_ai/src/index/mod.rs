use serde::{Deserialize, Serialize};
use tdx_core::documents::Document;
use tdx_core::error::{AppError, ErrorKind};
use tracing::{debug, info};

use crate::embeddings::Embedder;

pub mod store;

pub use store::{load_index, save_index, IndexManifest};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub document: Document,
    pub vector: Vec<f32>,
}

/// Embedded documents ready for nearest-neighbor lookup.
///
/// Only constructed whole: every document has a vector of length `dims`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dims: u32,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub(crate) fn from_parts(
        model: String,
        dims: u32,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, AppError> {
        if entries.is_empty() {
            return Err(AppError::new(
                ErrorKind::EmptyInput,
                "AI_INDEX_EMPTY",
                "An index needs at least one document",
            ));
        }
        for e in &entries {
            if e.vector.len() as u32 != dims {
                return Err(AppError::new(
                    ErrorKind::Provider,
                    "AI_INDEX_BUILD_FAILED",
                    "Embedding dimension mismatch across documents",
                )
                .with_details(format!(
                    "expected={}; got={}; doc_id={}",
                    dims,
                    e.vector.len(),
                    e.document.id
                )));
            }
        }
        Ok(Self {
            model,
            dims,
            entries,
        })
    }

    /// Embedding model the vectors were produced with; queries must use the same one.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> u32 {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.entries.iter().map(|e| &e.document)
    }
}

/// Embed every document (one provider call each, in order) and assemble the index.
///
/// Any failed embedding aborts the build; no partial index is returned.
pub fn build_index(
    documents: Vec<Document>,
    embedder: &dyn Embedder,
    model: &str,
) -> Result<VectorIndex, AppError> {
    if documents.is_empty() {
        return Err(AppError::new(
            ErrorKind::EmptyInput,
            "AI_INDEX_EMPTY",
            "No documents to index",
        ));
    }

    let total = documents.len();
    info!(documents = total, model, "building vector index");

    let mut dims: Option<u32> = None;
    let mut entries = Vec::with_capacity(total);
    for (i, document) in documents.into_iter().enumerate() {
        let vector = embedder.embed(model, &document.text).map_err(|e| {
            let retryable = e.retryable;
            AppError::new(e.kind, "AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                .with_details(format!("doc_id={}; err={}", document.id, e))
                .with_retryable(retryable)
        })?;
        if vector.is_empty() {
            return Err(AppError::new(
                ErrorKind::Provider,
                "AI_EMBEDDINGS_FAILED",
                "Embedding was empty",
            )
            .with_details(format!("doc_id={}", document.id)));
        }
        let this_dims = vector.len() as u32;
        match dims {
            Some(d) if d != this_dims => {
                return Err(AppError::new(
                    ErrorKind::Provider,
                    "AI_INDEX_BUILD_FAILED",
                    "Embedding dimension mismatch across documents",
                )
                .with_details(format!(
                    "expected={}; got={}; doc_id={}",
                    d, this_dims, document.id
                )));
            }
            Some(_) => {}
            None => dims = Some(this_dims),
        }
        debug!(n = i + 1, total, doc_id = %document.id, "embedded document");
        entries.push(IndexEntry { document, vector });
    }

    let dims = dims.unwrap_or_default();
    let index = VectorIndex::from_parts(model.to_string(), dims, entries)?;
    info!(documents = index.len(), dims, "vector index built");
    Ok(index)
}
