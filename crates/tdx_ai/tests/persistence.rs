use std::collections::BTreeMap;
use std::fs;

use pretty_assertions::assert_eq;
use tdx_ai::embeddings::Embedder;
use tdx_ai::index::{build_index, load_index, save_index};
use tdx_ai::retrieve::search;
use tdx_core::documents::Document;
use tdx_core::error::{AppError, ErrorKind};

struct VowelEmbedder;

impl Embedder for VowelEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let count = |c: char| input.chars().filter(|x| *x == c).count() as f32;
        Ok(vec![count('a') + 0.5, count('e'), count('i'), count('o'), count('u')])
    }
}

fn sample_docs() -> Vec<Document> {
    ["banana", "eerie", "igloo", "outrun"]
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut meta = BTreeMap::new();
            meta.insert("word".to_string(), t.to_string());
            Document::new(i, t.to_string(), meta)
        })
        .collect()
}

#[test]
fn save_then_load_answers_the_same_query() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = dir.path().join("storage").join("nested");

    let index = build_index(sample_docs(), &VowelEmbedder, "mock").expect("build");
    let manifest = save_index(&index, &storage, "2025-10-04T00:00:00Z").expect("save");
    assert_eq!(manifest.doc_count, 4);
    assert_eq!(manifest.dims, 5);

    let loaded = load_index(&storage).expect("load");
    assert_eq!(loaded, index);

    for q in ["aaa", "ooo", "eu"] {
        let before = search(&index, &VowelEmbedder, q, 2).expect("search");
        let after = search(&loaded, &VowelEmbedder, q, 2).expect("search");
        assert_eq!(before, after);
    }
}

#[test]
fn missing_directory_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_index(&dir.path().join("never-saved")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
    assert_eq!(err.code, "INDEX_NOT_FOUND");
}

#[test]
fn directory_without_manifest_is_not_an_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index = build_index(sample_docs(), &VowelEmbedder, "mock").expect("build");
    save_index(&index, dir.path(), "t0").expect("save");

    fs::remove_file(dir.path().join("index_manifest.json")).expect("remove");
    let err = load_index(dir.path()).unwrap_err();
    assert_eq!(err.code, "INDEX_NOT_FOUND");
}

#[test]
fn mismatched_files_are_reported_corrupt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index = build_index(sample_docs(), &VowelEmbedder, "mock").expect("build");
    save_index(&index, dir.path(), "t0").expect("save");

    fs::write(dir.path().join("vectors.json"), "{}").expect("truncate vectors");
    let err = load_index(dir.path()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
    assert_eq!(err.code, "INDEX_CORRUPT");

    fs::write(dir.path().join("docstore.json"), "not json").expect("corrupt docstore");
    let err = load_index(dir.path()).unwrap_err();
    assert_eq!(err.code, "INDEX_CORRUPT");
}

#[test]
fn saving_over_an_existing_index_replaces_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = build_index(sample_docs(), &VowelEmbedder, "mock").expect("build");
    save_index(&first, dir.path(), "t0").expect("save");

    let second = build_index(sample_docs().into_iter().take(2).collect(), &VowelEmbedder, "mock")
        .expect("build");
    save_index(&second, dir.path(), "t1").expect("save");

    let loaded = load_index(dir.path()).expect("load");
    assert_eq!(loaded.len(), 2);
    assert!(!dir.path().join("index_manifest.tmp").exists());
}
