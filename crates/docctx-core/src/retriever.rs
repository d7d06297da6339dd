//! Retrieval pipeline: vectorize query → nearest neighbours → metadata filter.
//!
//! The store is asked for more candidates than the caller's limit
//! (`limit × candidate_multiplier`, capped at [`MAX_CANDIDATES`]) so that
//! post-filtering on `type` and `source_path` still has something to
//! return. Filtering everything away yields an empty result, never an error.

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::models::{SearchQuery, SearchResult};
use crate::store::{store_error, ScoredRecord, VectorStore};

/// Default over-fetch factor applied to the limit.
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 4;
/// Upper bound on candidates requested from the store.
pub const MAX_CANDIDATES: usize = 500;

pub struct Retriever<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    candidate_multiplier: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self {
            embedder,
            store,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    /// Search `collection`, returning at most `query.effective_limit()` results
    /// in descending similarity order.
    pub async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if query.query.trim().is_empty() {
            return Err(Error::validation("Query cannot be empty"));
        }

        let limit = query.effective_limit();
        let top_k = (limit * self.candidate_multiplier).clamp(limit, MAX_CANDIDATES.max(limit));

        let vector = self.embedder.embed_one(&query.query).await?;
        let candidates = self
            .store
            .query(collection, &vector, top_k)
            .await
            .map_err(store_error)?;
        let fetched = candidates.len();

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|record| to_result(record, query))
            .collect();

        // Stable: equal scores keep the store's order.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        debug!(
            collection,
            fetched,
            returned = results.len(),
            "retrieved chunks"
        );
        Ok(results)
    }
}

fn to_result(record: ScoredRecord, query: &SearchQuery) -> Option<SearchResult> {
    let metadata = Metadata::from_map(&record.metadata);

    if let Some(doc_type) = query.doc_type {
        if !metadata.has_type(doc_type) {
            return None;
        }
    }

    if let Some(prefix) = query.source_path.as_deref() {
        if !source_matches(metadata.source_path.as_deref(), prefix) {
            return None;
        }
    }

    Some(SearchResult {
        id: record.id,
        content: record.text,
        score: record.score,
        metadata,
    })
}

/// Exact or prefix match of a stored source path against a filter.
pub fn source_matches(source_path: Option<&str>, filter: &str) -> bool {
    match source_path {
        Some(path) => path == filter || path.starts_with(filter),
        None => false,
    }
}
