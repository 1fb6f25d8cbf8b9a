pub mod embeddings;
pub mod index;
pub mod llm;
pub mod provider;
pub mod query;
pub mod retrieve;
