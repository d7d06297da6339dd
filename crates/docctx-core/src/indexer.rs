//! Indexing pipeline: chunk → metadata → vectorize → store.
//!
//! The indexer never writes a partial document. Every chunk is embedded
//! before the single [`VectorStore::upsert`] call; if that upsert fails the
//! batch ids are deleted again on a best-effort basis. Callers retry the
//! whole call on failure.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::Chunker;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::metadata::MetadataFactory;
use crate::models::{Chunk, Document, IndexResult};
use crate::store::{store_error, VectorRecord, VectorStore};

/// Default number of texts sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct Indexer<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    chunker: Chunker,
    batch_size: usize,
}

impl<'a> Indexer<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingProvider,
        store: &'a dyn VectorStore,
        chunker: Chunker,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index one document into `collection`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for empty content or an empty collection name,
    ///   raised before any external call.
    /// - [`Error::Indexing`] wrapping the embedding or store failure.
    pub async fn index(&self, collection: &str, document: &Document) -> Result<IndexResult> {
        let started = Instant::now();

        if document.content.trim().is_empty() {
            return Err(Error::validation("Content cannot be empty"));
        }
        if collection.trim().is_empty() {
            return Err(Error::validation("Collection name cannot be empty"));
        }

        let chunks = self.chunker.split(&document.content);
        let factory = MetadataFactory::for_document(document, Utc::now());
        debug!(
            collection,
            chunks = chunks.len(),
            doc_type = %document.doc_type,
            "chunked document"
        );

        let vectors = self
            .vectorize(&chunks)
            .await
            .map_err(|e| Error::Indexing(Box::new(e)))?;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: factory.build(&chunk).to_map(),
                text: chunk.text,
            })
            .collect();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        if let Err(err) = self.store.upsert(collection, &records).await {
            if let Err(cleanup) = self.store.delete(collection, &ids).await {
                warn!(
                    collection,
                    error = %cleanup,
                    "failed to remove partially written chunks"
                );
            }
            return Err(Error::Indexing(Box::new(store_error(err))));
        }

        let elapsed = started.elapsed().as_millis() as u64;
        info!(
            collection,
            chunks = ids.len(),
            elapsed_ms = elapsed,
            "indexed document"
        );

        Ok(IndexResult {
            collection: collection.to_string(),
            chunks_created: ids.len(),
            processing_time_ms: elapsed,
            ids,
        })
    }

    async fn vectorize(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(Error::Network(format!(
                    "embedding platform returned {} vectors for {} inputs",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }

        let expected = self.embedder.dims();
        if expected > 0 {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(Error::config(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    expected,
                    bad.len()
                )));
            }
        }

        Ok(vectors)
    }
}
