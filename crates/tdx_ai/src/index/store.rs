//! On-disk layout of a saved [`VectorIndex`]:
//!
//! - `docstore.json`: documents, in index order
//! - `vectors.json`: doc id → vector
//! - `index_manifest.json`: model, dims, document count; written last
//!
//! A directory without a manifest is never loadable, so an interrupted save
//! cannot be mistaken for a complete index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tdx_core::documents::Document;
use tdx_core::error::{AppError, ErrorKind};
use tracing::info;

use super::{IndexEntry, VectorIndex};

const MANIFEST_FILE: &str = "index_manifest.json";
const DOCSTORE_FILE: &str = "docstore.json";
const VECTORS_FILE: &str = "vectors.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub model: String,
    pub dims: u32,
    pub doc_count: u32,
    pub updated_at: String,
}

fn io_error(code: &str, message: &str, path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::Io, code, message)
        .with_details(format!("path={}; err={}", path.display(), e))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io_error("INDEX_SAVE_FAILED", "Failed to encode index file", path, e))?;
    fs::write(&tmp, json.as_bytes())
        .map_err(|e| io_error("INDEX_SAVE_FAILED", "Failed to write index file", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        io_error(
            "INDEX_SAVE_FAILED",
            "Failed to finalize index file write",
            path,
            e,
        )
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path)
        .map_err(|e| io_error("INDEX_LOAD_FAILED", "Failed to read index file", path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| io_error("INDEX_CORRUPT", "Failed to decode index file", path, e))
}

/// Write `index` under `dir`, creating the directory if needed.
pub fn save_index(
    index: &VectorIndex,
    dir: &Path,
    updated_at: &str,
) -> Result<IndexManifest, AppError> {
    fs::create_dir_all(dir).map_err(|e| {
        io_error(
            "INDEX_SAVE_FAILED",
            "Failed to create index directory",
            dir,
            e,
        )
    })?;

    // Invalidate any previous index before touching its data files.
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        fs::remove_file(&manifest_path).map_err(|e| {
            io_error(
                "INDEX_SAVE_FAILED",
                "Failed to remove previous manifest",
                &manifest_path,
                e,
            )
        })?;
    }

    let docs: Vec<&Document> = index.documents().collect();
    let vectors: BTreeMap<&str, &Vec<f32>> = index
        .entries()
        .iter()
        .map(|e| (e.document.id.as_str(), &e.vector))
        .collect();

    write_json_atomic(&dir.join(DOCSTORE_FILE), &docs)?;
    write_json_atomic(&dir.join(VECTORS_FILE), &vectors)?;

    let manifest = IndexManifest {
        model: index.model().to_string(),
        dims: index.dims(),
        doc_count: index.len() as u32,
        updated_at: updated_at.to_string(),
    };
    write_json_atomic(&manifest_path, &manifest)?;

    info!(dir = %dir.display(), documents = manifest.doc_count, "index saved");
    Ok(manifest)
}

/// Read an index previously written by [`save_index`].
pub fn load_index(dir: &Path) -> Result<VectorIndex, AppError> {
    if !dir.is_dir() {
        return Err(AppError::new(
            ErrorKind::Io,
            "INDEX_NOT_FOUND",
            "Index directory not found",
        )
        .with_details(format!("dir={}", dir.display())));
    }
    let manifest_path: PathBuf = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(AppError::new(
            ErrorKind::Io,
            "INDEX_NOT_FOUND",
            "Index manifest not found; the directory holds no complete index",
        )
        .with_details(format!("dir={}", dir.display())));
    }

    let manifest: IndexManifest = read_json(&manifest_path)?;
    let docs: Vec<Document> = read_json(&dir.join(DOCSTORE_FILE))?;
    let mut vectors: BTreeMap<String, Vec<f32>> = read_json(&dir.join(VECTORS_FILE))?;

    if docs.len() as u32 != manifest.doc_count || vectors.len() != docs.len() {
        return Err(AppError::new(
            ErrorKind::Io,
            "INDEX_CORRUPT",
            "Index files disagree on document count",
        )
        .with_details(format!(
            "manifest={}; docstore={}; vectors={}",
            manifest.doc_count,
            docs.len(),
            vectors.len()
        )));
    }

    let mut entries = Vec::with_capacity(docs.len());
    for document in docs {
        let vector = vectors.remove(&document.id).ok_or_else(|| {
            AppError::new(
                ErrorKind::Io,
                "INDEX_CORRUPT",
                "Document has no stored vector",
            )
            .with_details(format!("doc_id={}", document.id))
        })?;
        entries.push(IndexEntry { document, vector });
    }

    let index = VectorIndex::from_parts(manifest.model, manifest.dims, entries).map_err(|e| {
        AppError::new(ErrorKind::Io, "INDEX_CORRUPT", "Stored index is inconsistent")
            .with_details(e.to_string())
    })?;
    info!(dir = %dir.display(), documents = index.len(), "index loaded");
    Ok(index)
}
