use serde::{Deserialize, Serialize};
use tdx_core::error::{AppError, ErrorKind};

use crate::embeddings::Embedder;
use crate::index::VectorIndex;

mod similarity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryHit {
    pub doc_id: String,
    pub row_index: usize,
    pub score: f32,
    pub text: String,
}

/// Cosine top-k over the whole index.
///
/// Ordering is score desc, then `doc_id` asc, so equal scores are stable across runs.
pub fn search(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    top_k: u32,
) -> Result<Vec<QueryHit>, AppError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new(
            ErrorKind::Query,
            "AI_RETRIEVAL_FAILED",
            "Query must not be empty",
        ));
    }
    let top_k = top_k.clamp(1, 50);
    let dims = index.dims();

    let qv = embedder.embed(index.model(), q)?;
    if qv.len() as u32 != dims {
        return Err(AppError::new(
            ErrorKind::Provider,
            "AI_RETRIEVAL_FAILED",
            "Query embedding dims do not match index dims",
        )
        .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
    }

    let qnorm = similarity::l2_norm(&qv);
    if qnorm == 0.0 {
        return Err(AppError::new(
            ErrorKind::Provider,
            "AI_RETRIEVAL_FAILED",
            "Query embedding norm is zero",
        ));
    }

    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(index.len());
    for (i, entry) in index.entries().iter().enumerate() {
        let vnorm = similarity::l2_norm(&entry.vector);
        if vnorm == 0.0 {
            continue;
        }
        let score = similarity::cosine_similarity(&qv, &entry.vector, qnorm, vnorm);
        scored.push((i, score));
    }

    let entries = index.entries();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| entries[a.0].document.id.cmp(&entries[b.0].document.id))
    });
    scored.truncate(top_k as usize);

    Ok(scored
        .into_iter()
        .map(|(i, score)| {
            let doc = &entries[i].document;
            QueryHit {
                doc_id: doc.id.clone(),
                row_index: doc.row_index,
                score,
                text: doc.text.clone(),
            }
        })
        .collect())
}
