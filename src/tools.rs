//! Built-in tools.
//!
//! | Tool | Needs RAG | Result |
//! |------|-----------|--------|
//! | `store` | yes | text summary |
//! | `search` | yes | text with formatted chunks |
//! | `manage` | yes | text stats |
//! | `file-search` | no | JSON report |
//! | `file-delete-content` | no | JSON `{ success, ... }` |
//! | `file-insert-content` | no | JSON `{ success, ... }` |
//!
//! The RAG tools return plain strings and let errors propagate; the file
//! tools always return a JSON object and report failures as
//! `{ "success": false, "error": "..." }`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use docctx_core::models::{clamp_limit, parse_tags, DEFAULT_SEARCH_LIMIT};
use docctx_core::{Document, DocumentType, SearchQuery};

use crate::files::edit::{self, DeleteSpec, Insertion, Position};
use crate::files::search::{self, FileSearchOptions};
use crate::traits::{Tool, ToolContext};

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Optional string parameter; blank counts as absent.
fn opt_string(params: &Value, key: &str) -> Option<String> {
    str_param(params, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn usize_param(params: &Value, key: &str, default: usize) -> Result<usize> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => match value.as_u64() {
            Some(n) => Ok(n as usize),
            None => bail!("parameter '{}' must be a non-negative integer", key),
        },
    }
}

fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn success(outcome: impl Serialize) -> Result<Value> {
    let mut body = json!({ "success": true });
    if let (Value::Object(target), Value::Object(fields)) =
        (&mut body, serde_json::to_value(outcome)?)
    {
        target.extend(fields);
    }
    Ok(body)
}

fn failure(err: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": err.to_string() })
}

// ============ RAG tools ============

pub struct StoreTool;

#[async_trait]
impl Tool for StoreTool {
    fn name(&self) -> &str {
        "store"
    }

    fn description(&self) -> &str {
        "Store a document in the knowledge base: chunk, embed and index it"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Document text" },
                "type": {
                    "type": "string",
                    "description": format!("Document type: {}", DocumentType::names().join(", ")),
                    "default": "general"
                },
                "sourcePath": { "type": "string", "description": "Where the document came from" },
                "tags": { "type": "string", "description": "Comma-separated tags" },
                "collection": { "type": "string", "description": "Target collection (defaults to the configured one)" }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let rag = ctx.rag()?;
        let content = str_param(&params, "content").unwrap_or_default();

        let requested = str_param(&params, "type").unwrap_or("general");
        let doc_type = DocumentType::try_from_str(requested).unwrap_or_else(|| {
            warn!(requested, "unknown document type, storing as general");
            DocumentType::General
        });

        let document = Document::new(content, doc_type)
            .with_source_path(opt_string(&params, "sourcePath"))
            .with_tags(str_param(&params, "tags").map(parse_tags).unwrap_or_default());

        let collection = opt_string(&params, "collection");
        let result = rag.index(collection.as_deref(), &document).await?;

        Ok(Value::String(format!(
            "Document stored in collection '{}'\nType: {}\nChunks created: {}\nProcessing time: {} ms",
            result.collection, doc_type, result.chunks_created, result.processing_time_ms
        )))
    }
}

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Semantic search over stored documents"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Natural-language query" },
                "type": {
                    "type": "string",
                    "description": format!("Only return this type: {}", DocumentType::names().join(", "))
                },
                "sourcePath": { "type": "string", "description": "Exact source path or path prefix" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results (1-50)",
                    "default": DEFAULT_SEARCH_LIMIT
                },
                "collection": { "type": "string", "description": "Collection to search" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let rag = ctx.rag()?;
        let query_text = str_param(&params, "query").unwrap_or_default();

        let doc_type = match opt_string(&params, "type") {
            Some(t) => Some(t.parse::<DocumentType>()?),
            None => None,
        };
        let limit = params
            .get("limit")
            .and_then(|v| v.as_i64())
            .map(clamp_limit)
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        let query = SearchQuery::new(query_text)
            .with_type(doc_type)
            .with_source_path(opt_string(&params, "sourcePath"))
            .with_limit(limit);
        let collection = opt_string(&params, "collection");
        let results = rag.search(collection.as_deref(), &query).await?;

        if results.is_empty() {
            return Ok(Value::String(format!(
                "No results found for query: {}",
                query_text
            )));
        }

        let blocks: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| r.format(i + 1))
            .collect();
        Ok(Value::String(format!(
            "Found {} result(s) for query: {}\n\n{}",
            results.len(),
            query_text,
            blocks.join("\n")
        )))
    }
}

pub struct ManageTool;

#[async_trait]
impl Tool for ManageTool {
    fn name(&self) -> &str {
        "manage"
    }

    fn description(&self) -> &str {
        "Inspect the knowledge base (actions: stats)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "description": "Action to run", "default": "stats" },
                "collection": { "type": "string", "description": "Collection to inspect" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let rag = ctx.rag()?;
        let action = str_param(&params, "action").unwrap_or("stats").trim();
        match action {
            "stats" => {
                let collection = opt_string(&params, "collection");
                let stats = rag.stats(collection.as_deref()).await?;
                Ok(Value::String(stats.render()))
            }
            other => bail!("Unknown action: {}. Available actions: stats", other),
        }
    }
}

// ============ File tools ============

pub struct FileSearchTool;

/// `pattern` accepts a string (comma-separated globs allowed) or an array.
fn patterns_param(params: &Value) -> Result<Vec<String>> {
    let raw: Vec<String> = match params.get("pattern") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v.as_str() {
                Some(s) => Ok(s.to_string()),
                None => Err(anyhow::anyhow!("parameter 'pattern' must contain only strings")),
            })
            .collect::<Result<_>>()?,
        Some(_) => bail!("parameter 'pattern' must be a string or an array of strings"),
    };
    Ok(raw
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

fn search_options(params: &Value) -> Result<FileSearchOptions> {
    let defaults = FileSearchOptions::default();
    Ok(FileSearchOptions {
        patterns: patterns_param(params)?,
        depth: usize_param(params, "depth", defaults.depth)?,
        case_sensitive: bool_param(params, "caseSensitive", defaults.case_sensitive),
        regex: bool_param(params, "regex", defaults.regex),
        context_lines: usize_param(params, "contextLines", defaults.context_lines)?,
        max_matches_per_file: usize_param(
            params,
            "maxMatchesPerFile",
            defaults.max_matches_per_file,
        )?,
        max_total_matches: usize_param(params, "maxTotalMatches", defaults.max_total_matches)?,
        size: opt_string(params, "size"),
    })
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file-search"
    }

    fn description(&self) -> &str {
        "Search project files for a literal string or regular expression"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text or regex (/pattern/flags allowed) to find" },
                "path": { "type": "string", "description": "File or directory relative to the project root", "default": "." },
                "pattern": { "description": "File-name glob(s), string or array; commas separate globs" },
                "depth": { "type": "integer", "description": "Directory levels to descend", "default": 10 },
                "contextLines": { "type": "integer", "description": "Lines of context before and after each match", "default": 0 },
                "caseSensitive": { "type": "boolean", "default": false },
                "regex": { "type": "boolean", "description": "Treat query as a regular expression", "default": false },
                "maxMatchesPerFile": { "type": "integer", "default": 100 },
                "maxTotalMatches": { "type": "integer", "default": 1000 },
                "size": { "type": "string", "description": "Size filter such as '> 1K' or '<= 2M'" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = str_param(&params, "query").unwrap_or_default();
        let path = str_param(&params, "path").unwrap_or(".");

        let options = match search_options(&params) {
            Ok(options) => options,
            Err(e) => return Ok(failure(e)),
        };

        match search::search_files(ctx.guard(), path, query, &options) {
            Ok(report) => {
                debug!(
                    query,
                    files = report.files_scanned,
                    matches = report.total_matches,
                    "file-search finished"
                );
                success(report)
            }
            Err(e) => Ok(failure(e)),
        }
    }
}

pub struct FileDeleteContentTool;

#[async_trait]
impl Tool for FileDeleteContentTool {
    fn name(&self) -> &str {
        "file-delete-content"
    }

    fn description(&self) -> &str {
        "Delete lines or line ranges from a project file"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File relative to the project root" },
                "lines": {
                    "type": "array",
                    "description": "Lines to delete; 'to' makes an inclusive range",
                    "items": {
                        "type": "object",
                        "properties": {
                            "line": { "type": "integer" },
                            "to": { "type": "integer" }
                        },
                        "required": ["line"]
                    }
                }
            },
            "required": ["path", "lines"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = str_param(&params, "path").unwrap_or_default();
        let specs: Vec<DeleteSpec> =
            match serde_json::from_value(params.get("lines").cloned().unwrap_or(Value::Null)) {
                Ok(specs) => specs,
                Err(e) => return Ok(failure(format!("Invalid 'lines' parameter: {}", e))),
            };

        let policy = ctx.config().files.out_of_range_lines;
        match edit::delete_lines(ctx.guard(), path, &specs, policy) {
            Ok(outcome) => success(outcome),
            Err(e) => Ok(failure(e)),
        }
    }
}

pub struct FileInsertContentTool;

#[async_trait]
impl Tool for FileInsertContentTool {
    fn name(&self) -> &str {
        "file-insert-content"
    }

    fn description(&self) -> &str {
        "Insert content before or after lines of a project file (-1 appends)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File relative to the project root" },
                "insertions": {
                    "type": "array",
                    "description": "Content to insert at 1-based anchor lines; -1 means end of file",
                    "items": {
                        "type": "object",
                        "properties": {
                            "line": { "type": "integer" },
                            "content": { "type": "string" }
                        },
                        "required": ["line", "content"]
                    }
                },
                "position": {
                    "type": "string",
                    "enum": ["before", "after"],
                    "default": "after"
                }
            },
            "required": ["path", "insertions"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = str_param(&params, "path").unwrap_or_default();
        let insertions: Vec<Insertion> = match serde_json::from_value(
            params.get("insertions").cloned().unwrap_or(Value::Null),
        ) {
            Ok(items) => items,
            Err(e) => return Ok(failure(format!("Invalid 'insertions' parameter: {}", e))),
        };
        let position = match str_param(&params, "position") {
            None => Position::default(),
            Some(raw) => match Position::try_from_str(raw) {
                Some(p) => p,
                None => return Ok(failure(format!("Unknown position: {}", raw))),
            },
        };

        match edit::insert_content(ctx.guard(), path, &insertions, position) {
            Ok(outcome) => success(outcome),
            Err(e) => Ok(failure(e)),
        }
    }
}
