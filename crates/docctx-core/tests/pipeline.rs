//! End-to-end tests for the indexer and retriever over the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use docctx_core::chunk::Chunker;
use docctx_core::embedding::EmbeddingProvider;
use docctx_core::store::memory::InMemoryStore;
use docctx_core::store::{ScoredRecord, VectorRecord, VectorStore};
use docctx_core::{Document, DocumentType, Error, Indexer, Retriever, SearchQuery};

// ─── Test doubles ───────────────────────────────────────────────────

const VOCAB: [&str; 4] = ["rust", "python", "deploy", "test"];

/// Counts vocabulary words; the last dimension keeps vectors non-zero.
struct VocabEmbedder {
    calls: AtomicUsize,
}

impl VocabEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    fn platform(&self) -> &str {
        "vocab"
    }
    fn model_name(&self) -> &str {
        "vocab-test"
    }
    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> docctx_core::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.01);
                v
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn platform(&self) -> &str {
        "failing"
    }
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, _texts: &[String]) -> docctx_core::Result<Vec<Vec<f32>>> {
        Err(Error::Network("connection refused".to_string()))
    }
}

/// Rejects every upsert and records cleanup requests.
struct FailingStore {
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl VectorStore for FailingStore {
    fn driver(&self) -> &str {
        "failing"
    }
    fn endpoint(&self) -> String {
        "nowhere".to_string()
    }
    async fn upsert(&self, _collection: &str, _records: &[VectorRecord]) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }
    async fn query(
        &self,
        _collection: &str,
        _vector: &[f32],
        _top_k: usize,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _collection: &str, ids: &[String]) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
    async fn count(&self, _collection: &str) -> anyhow::Result<usize> {
        Ok(0)
    }
}

fn chunker() -> Chunker {
    Chunker::new(200, 20).unwrap()
}

async fn seeded_store(embedder: &VocabEmbedder) -> InMemoryStore {
    let store = InMemoryStore::new();
    let indexer = Indexer::new(embedder, &store, chunker());
    let docs = [
        ("Rust ownership and rust borrowing rules.", DocumentType::Convention, "docs/conventions/rust.md"),
        ("Python packaging for the data team.", DocumentType::Tutorial, "docs/tutorials/python.md"),
        ("How we deploy the rust services.", DocumentType::Architecture, "docs/architecture/deploy.md"),
        ("Test strategy: every rust crate has a test suite.", DocumentType::Testing, "src/tests/README.md"),
    ];
    for (content, doc_type, path) in docs {
        let doc = Document::new(content, doc_type).with_source_path(Some(path.to_string()));
        indexer.index("docs", &doc).await.unwrap();
    }
    store
}

// ─── Indexer ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_index_markdown_document() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let indexer = Indexer::new(&embedder, &store, chunker());

    let doc = Document::new("# Title\nBody text...", DocumentType::General);
    let result = indexer.index("docs", &doc).await.unwrap();

    assert!(result.chunks_created >= 1);
    assert_eq!(result.collection, "docs");
    assert_eq!(result.ids.len(), result.chunks_created);
    assert_eq!(store.count("docs").await.unwrap(), result.chunks_created);
}

#[tokio::test]
async fn test_index_rejects_empty_content_before_embedding() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let indexer = Indexer::new(&embedder, &store, chunker());

    for content in ["", "   \n\t"] {
        let err = indexer
            .index("docs", &Document::new(content, DocumentType::General))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Content cannot be empty");
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_index_stamps_one_timestamp_per_call() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let indexer = Indexer::new(&embedder, &store, Chunker::new(10, 2).unwrap()).with_batch_size(2);

    let doc = Document::new("rust ".repeat(20), DocumentType::Api)
        .with_tags(vec!["lang".to_string()]);
    let result = indexer.index("docs", &doc).await.unwrap();
    assert!(result.chunks_created > 2);
    // Batches of two texts per request.
    assert_eq!(
        embedder.calls.load(Ordering::SeqCst),
        result.chunks_created.div_ceil(2)
    );

    let hits = store.query("docs", &[1.0, 0.0, 0.0, 0.0, 0.0], 100).await.unwrap();
    let stamps: Vec<&str> = hits
        .iter()
        .map(|r| r.metadata["indexed_at"].as_str().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] == w[1]));
    assert!(hits.iter().all(|r| r.metadata["type"] == "api"));
    assert!(hits.iter().all(|r| r.metadata["tags"][0] == "lang"));
}

#[tokio::test]
async fn test_embedding_failure_writes_nothing() {
    let store = InMemoryStore::new();
    let indexer = Indexer::new(&FailingEmbedder, &store, chunker());

    let err = indexer
        .index("docs", &Document::new("content", DocumentType::General))
        .await
        .unwrap_err();

    match err {
        Error::Indexing(inner) => assert!(matches!(*inner, Error::Network(_))),
        other => panic!("expected indexing error, got {:?}", other),
    }
    assert_eq!(store.count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn test_store_failure_cleans_up_batch() {
    let embedder = VocabEmbedder::new();
    let store = FailingStore {
        deleted: Mutex::new(Vec::new()),
    };
    let indexer = Indexer::new(&embedder, &store, Chunker::new(10, 0).unwrap());

    let err = indexer
        .index("docs", &Document::new("a".repeat(35), DocumentType::General))
        .await
        .unwrap_err();

    match err {
        Error::Indexing(inner) => {
            assert!(matches!(*inner, Error::Store(_)));
            assert!(inner.to_string().contains("disk full"));
        }
        other => panic!("expected indexing error, got {:?}", other),
    }
    assert_eq!(store.deleted.lock().unwrap().len(), 4);
}

// ─── Retriever ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_empty_collection_returns_nothing() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let retriever = Retriever::new(&embedder, &store);

    let results = retriever
        .search("docs", &SearchQuery::new("anything at all"))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let retriever = Retriever::new(&embedder, &store);

    let err = retriever
        .search("docs", &SearchQuery::new("  "))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Query cannot be empty");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_ranks_by_similarity() {
    let embedder = VocabEmbedder::new();
    let store = seeded_store(&embedder).await;
    let retriever = Retriever::new(&embedder, &store);

    let results = retriever
        .search("docs", &SearchQuery::new("python"))
        .await
        .unwrap();
    assert_eq!(
        results[0].metadata.source_path.as_deref(),
        Some("docs/tutorials/python.md")
    );
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_search_filters_by_type_and_source_prefix() {
    let embedder = VocabEmbedder::new();
    let store = seeded_store(&embedder).await;
    let retriever = Retriever::new(&embedder, &store);

    let by_type = retriever
        .search(
            "docs",
            &SearchQuery::new("rust").with_type(Some(DocumentType::Testing)),
        )
        .await
        .unwrap();
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].metadata.doc_type, DocumentType::Testing);

    let by_prefix = retriever
        .search(
            "docs",
            &SearchQuery::new("rust").with_source_path(Some("docs/".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(by_prefix.len(), 3);
    assert!(by_prefix
        .iter()
        .all(|r| r.metadata.source_path.as_deref().unwrap().starts_with("docs/")));

    let exhausted = retriever
        .search(
            "docs",
            &SearchQuery::new("rust")
                .with_type(Some(DocumentType::Reference))
                .with_source_path(Some("docs/".to_string())),
        )
        .await
        .unwrap();
    assert!(exhausted.is_empty());
}

#[tokio::test]
async fn test_search_limit_is_clamped() {
    let embedder = VocabEmbedder::new();
    let store = seeded_store(&embedder).await;
    let retriever = Retriever::new(&embedder, &store);

    let one = retriever
        .search("docs", &SearchQuery::new("rust").with_limit(0))
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    let all = retriever
        .search("docs", &SearchQuery::new("rust").with_limit(51))
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_search_is_idempotent() {
    let embedder = VocabEmbedder::new();
    let store = seeded_store(&embedder).await;
    let retriever = Retriever::new(&embedder, &store);
    let query = SearchQuery::new("rust deploy").with_limit(3);

    let first: Vec<String> = retriever
        .search("docs", &query)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    let second: Vec<String> = retriever
        .search("docs", &query)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_equal_scores_keep_store_order() {
    let embedder = VocabEmbedder::new();
    let store = InMemoryStore::new();
    let indexer = Indexer::new(&embedder, &store, chunker());
    for path in ["a.md", "b.md", "c.md"] {
        let doc = Document::new("python", DocumentType::General)
            .with_source_path(Some(path.to_string()));
        indexer.index("docs", &doc).await.unwrap();
    }

    let results = Retriever::new(&embedder, &store)
        .search("docs", &SearchQuery::new("python"))
        .await
        .unwrap();
    let paths: Vec<&str> = results
        .iter()
        .map(|r| r.metadata.source_path.as_deref().unwrap())
        .collect();
    assert_eq!(paths, vec!["a.md", "b.md", "c.md"]);
}

#[tokio::test]
async fn test_result_format_includes_metadata() {
    let embedder = VocabEmbedder::new();
    let store = seeded_store(&embedder).await;
    let results = Retriever::new(&embedder, &store)
        .search("docs", &SearchQuery::new("deploy").with_limit(1))
        .await
        .unwrap();

    let block = results[0].format(1);
    assert!(block.starts_with("## Result 1"));
    assert!(block.contains("Type: architecture"));
    assert!(block.contains("Source: docs/architecture/deploy.md"));
    assert!(block.contains("How we deploy the rust services."));
}
