//! # docctx core
//!
//! Shared logic for docctx: data models, chunking, metadata, the vector
//! store abstraction, and the indexing and retrieval pipelines.
//!
//! This crate does no filesystem I/O and does not depend on tokio. The
//! embedding platforms and persistent store drivers live in the `docctx`
//! app crate and plug in through [`embedding::EmbeddingProvider`] and
//! [`store::VectorStore`].

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod metadata;
pub mod models;
pub mod retriever;
pub mod store;

pub use error::{Error, Result};
pub use indexer::Indexer;
pub use models::{Document, DocumentType, IndexResult, SearchQuery, SearchResult};
pub use retriever::Retriever;
