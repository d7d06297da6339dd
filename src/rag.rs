//! RAG service: one place that owns the configured vectorizer and store.
//!
//! Built once per process from `[rag]` and shared by the tools and CLI.
//! Every operation takes an optional collection; `None` means the
//! configured default. Indexing and retrieval themselves live in
//! [`docctx_core::indexer`] and [`docctx_core::retriever`].

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use docctx_core::chunk::Chunker;
use docctx_core::embedding::EmbeddingProvider;
use docctx_core::store::memory::InMemoryStore;
use docctx_core::store::{store_error, VectorStore};
use docctx_core::{Document, IndexResult, Indexer, Retriever, SearchQuery, SearchResult};

use crate::config::{RagConfig, StoreConfig, StoreDriver};
use crate::embedding::create_provider;
use crate::qdrant_store::QdrantStore;
use crate::sqlite_store::SqliteStore;

/// Snapshot reported by the `manage` tool and `docctx stats`.
#[derive(Debug, Clone, Serialize)]
pub struct RagStats {
    pub enabled: bool,
    pub store_driver: String,
    pub store_endpoint: String,
    pub collection: String,
    pub dimensions: usize,
    pub vectorizer_platform: String,
    pub vectorizer_model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub records: usize,
}

impl RagStats {
    pub fn render(&self) -> String {
        format!(
            "RAG enabled: {}\n\
             Store driver: {}\n\
             Store endpoint: {}\n\
             Collection: {}\n\
             Dimensions: {}\n\
             Vectorizer platform: {}\n\
             Vectorizer model: {}\n\
             Chunk size: {}\n\
             Chunk overlap: {}\n\
             Stored chunks: {}",
            self.enabled,
            self.store_driver,
            self.store_endpoint,
            self.collection,
            self.dimensions,
            self.vectorizer_platform,
            self.vectorizer_model,
            self.chunk_size,
            self.overlap,
            self.records
        )
    }
}

pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    collection: String,
    batch_size: usize,
    candidate_multiplier: usize,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunker: Chunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            collection: collection.into(),
            batch_size: docctx_core::indexer::DEFAULT_BATCH_SIZE,
            candidate_multiplier: docctx_core::retriever::DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    /// Build the vectorizer and open the store described by `config`.
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        let chunking = config
            .chunking
            .context("[rag.chunking] is required when rag is enabled")?;
        let chunker = Chunker::new(chunking.chunk_size, chunking.overlap)?;
        let embedder = create_provider(&config.vectorizer)?;
        let store = open_store(&config.store).await?;

        info!(
            driver = store.driver(),
            platform = embedder.platform(),
            collection = %config.collection,
            "RAG service ready"
        );

        Ok(Self {
            embedder,
            store,
            chunker,
            collection: config.collection.clone(),
            batch_size: config.vectorizer.batch_size,
            candidate_multiplier: config.candidate_multiplier,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn default_collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    fn resolve<'a>(&'a self, collection: Option<&'a str>) -> &'a str {
        collection
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.collection.as_str())
    }

    pub async fn index(
        &self,
        collection: Option<&str>,
        document: &Document,
    ) -> docctx_core::Result<IndexResult> {
        Indexer::new(self.embedder.as_ref(), self.store.as_ref(), self.chunker)
            .with_batch_size(self.batch_size)
            .index(self.resolve(collection), document)
            .await
    }

    pub async fn search(
        &self,
        collection: Option<&str>,
        query: &SearchQuery,
    ) -> docctx_core::Result<Vec<SearchResult>> {
        Retriever::new(self.embedder.as_ref(), self.store.as_ref())
            .with_candidate_multiplier(self.candidate_multiplier)
            .search(self.resolve(collection), query)
            .await
    }

    pub async fn stats(&self, collection: Option<&str>) -> docctx_core::Result<RagStats> {
        let collection = self.resolve(collection);
        let records = self
            .store
            .count(collection)
            .await
            .map_err(store_error)?;

        Ok(RagStats {
            enabled: true,
            store_driver: self.store.driver().to_string(),
            store_endpoint: self.store.endpoint(),
            collection: collection.to_string(),
            dimensions: self.embedder.dims(),
            vectorizer_platform: self.embedder.platform().to_string(),
            vectorizer_model: self.embedder.model_name().to_string(),
            chunk_size: self.chunker.chunk_size(),
            overlap: self.chunker.overlap(),
            records,
        })
    }
}

/// Open the configured vector store driver.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    Ok(match config.driver {
        StoreDriver::Memory => Arc::new(InMemoryStore::new()),
        StoreDriver::Sqlite => {
            let path = config
                .path
                .as_deref()
                .context("rag.store.path is required for the sqlite driver")?;
            Arc::new(SqliteStore::open(path, config.timeout_secs).await?)
        }
        StoreDriver::Qdrant => Arc::new(QdrantStore::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use docctx_core::DocumentType;

    fn service() -> RagService {
        RagService::new(
            Arc::new(HashingProvider::new(64).unwrap()),
            Arc::new(InMemoryStore::new()),
            Chunker::new(200, 20).unwrap(),
            "docs",
        )
    }

    #[tokio::test]
    async fn test_default_and_explicit_collections() {
        let rag = service();
        let doc = Document::new("Deploy with cargo release", DocumentType::Tutorial);

        let default = rag.index(None, &doc).await.unwrap();
        assert_eq!(default.collection, "docs");
        let explicit = rag.index(Some("handbook"), &doc).await.unwrap();
        assert_eq!(explicit.collection, "handbook");
        let blank = rag.index(Some("  "), &doc).await.unwrap();
        assert_eq!(blank.collection, "docs");

        assert_eq!(rag.stats(None).await.unwrap().records, 2);
        assert_eq!(rag.stats(Some("handbook")).await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn test_stats_render() {
        let rag = service();
        let stats = rag.stats(None).await.unwrap();
        let text = stats.render();
        assert!(text.contains("Store driver: memory"));
        assert!(text.contains("Vectorizer platform: hashing"));
        assert!(text.contains("Chunk size: 200"));
        assert!(text.contains("Dimensions: 64"));
    }

    #[tokio::test]
    async fn test_search_round_trip() {
        let rag = service();
        rag.index(
            None,
            &Document::new("kubernetes deployment checklist", DocumentType::Architecture),
        )
        .await
        .unwrap();
        rag.index(None, &Document::new("python style guide", DocumentType::Convention))
            .await
            .unwrap();

        let results = rag
            .search(None, &SearchQuery::new("kubernetes deployment").with_limit(1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.doc_type, DocumentType::Architecture);
    }
}
