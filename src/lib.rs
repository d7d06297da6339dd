//! # docctx
//!
//! Project documentation context for AI tools: a small RAG pipeline plus
//! guarded file tools, served over MCP (stdio) and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌────────────────────┐
//! │  Document   │──▶│ Chunk + Embed    │──▶│ VectorStore        │
//! │ store/index │   │ (docctx-core)    │   │ memory/sqlite/qdr. │
//! └─────────────┘   └──────────────────┘   └─────────┬──────────┘
//!                                                    │
//!      ┌────────────────┐       ┌──────────────┐     │
//!      │ ProjectGuard   │──────▶│ ToolRegistry │◀────┘
//!      │ search / edit  │       └──────┬───────┘
//!      └────────────────┘              │
//!                         ┌────────────┼────────────┐
//!                         ▼            ▼            ▼
//!                    ┌────────┐  ┌──────────┐  ┌────────┐
//!                    │  CLI   │  │ MCP stdio│  │  HTTP  │
//!                    └────────┘  └──────────┘  └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docctx init                            # create the store schema / collection
//! docctx index docs --type reference     # store every markdown file under docs/
//! docctx search "deployment checklist"
//! docctx grep "TODO" --pattern "*.rs" --context 2
//! docctx serve mcp                       # MCP over stdio
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | Embedding platforms (OpenAI, Ollama, hashing, disabled) |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] / [`qdrant_store`] | Vector store drivers |
//! | [`rag`] | RAG service built from `[rag]` |
//! | [`files`] | Project guard, file search, line editor |
//! | [`traits`] / [`tools`] | Tool trait, registry, built-in tools |
//! | [`mcp`] / [`server`] | MCP stdio bridge and HTTP tool API |
//! | [`ingest`] / [`tool_cmd`] | CLI command implementations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod files;
pub mod ingest;
pub mod mcp;
pub mod migrate;
pub mod qdrant_store;
pub mod rag;
pub mod server;
pub mod sqlite_store;
pub mod tool_cmd;
pub mod tools;
pub mod traits;
