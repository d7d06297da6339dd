//! Vector storage abstraction for docctx.
//!
//! The [`VectorStore`] trait is the narrow contract the
//! [`Indexer`](crate::indexer::Indexer) and [`Retriever`](crate::retriever::Retriever)
//! consume, enabling pluggable backends (in-memory, SQLite, Qdrant).
//! Collection creation is the backend's concern: in-memory and SQLite
//! create collections on first write, remote databases expect them to exist.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Error;

/// A record written to the store: one chunk with its embedding.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// A record returned from a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    /// Cosine similarity (higher is closer).
    pub score: f32,
}

/// Abstract vector database backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace records; atomic per call |
/// | [`query`](VectorStore::query) | Top-K nearest neighbours, best first |
/// | [`delete`](VectorStore::delete) | Remove records by id |
/// | [`count`](VectorStore::count) | Number of records in a collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Driver name (`"memory"`, `"sqlite"`, `"qdrant"`).
    fn driver(&self) -> &str;

    /// Human-readable location of the backend (URL, file path, …).
    fn endpoint(&self) -> String;

    /// Insert or replace all records. Either every record is written or none.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` records ordered by descending similarity.
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<ScoredRecord>>;

    /// Remove records by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Number of records currently stored in `collection`.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Sort candidates best-first, keeping insertion order for equal scores.
pub fn rank_by_score(records: &mut [ScoredRecord]) {
    records.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Convert a backend failure into the core taxonomy.
///
/// Adapters may wrap a typed [`Error`] (e.g. [`Error::Timeout`]) in
/// `anyhow`; it is recovered here. Anything else becomes [`Error::Store`].
pub fn store_error(err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(typed) => typed,
        Err(other) => Error::Store(format!("{:#}", other)),
    }
}
