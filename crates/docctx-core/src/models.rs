//! Core data models used throughout docctx.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::metadata::Metadata;

/// Smallest accepted search limit.
pub const MIN_SEARCH_LIMIT: usize = 1;
/// Largest accepted search limit.
pub const MAX_SEARCH_LIMIT: usize = 50;
/// Limit used when the caller does not provide one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Kind of knowledge a document carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Architecture,
    Api,
    Testing,
    Convention,
    #[default]
    General,
    Tutorial,
    Reference,
}

impl DocumentType {
    pub const ALL: [DocumentType; 7] = [
        DocumentType::Architecture,
        DocumentType::Api,
        DocumentType::Testing,
        DocumentType::Convention,
        DocumentType::General,
        DocumentType::Tutorial,
        DocumentType::Reference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Architecture => "architecture",
            DocumentType::Api => "api",
            DocumentType::Testing => "testing",
            DocumentType::Convention => "convention",
            DocumentType::General => "general",
            DocumentType::Tutorial => "tutorial",
            DocumentType::Reference => "reference",
        }
    }

    /// Parse a type name, returning `None` for anything unknown.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Callers decide whether `None` means "fall back to general" or
    /// "reject the request".
    pub fn try_from_str(value: &str) -> Option<Self> {
        let needle = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == needle)
    }

    /// Comma-separated list of accepted names, for error messages and schemas.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_str(s).ok_or_else(|| {
            Error::validation(format!(
                "Unknown document type: '{}'. Available types: {}",
                s,
                Self::names().join(", ")
            ))
        })
    }
}

/// Unit of knowledge before chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub doc_type: DocumentType,
    pub source_path: Option<String>,
    pub tags: Vec<String>,
    /// Additional metadata merged into every chunk without overriding fixed keys.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(content: impl Into<String>, doc_type: DocumentType) -> Self {
        Self {
            content: content.into(),
            doc_type,
            source_path: None,
            tags: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_source_path(mut self, source_path: Option<String>) -> Self {
        self.source_path = source_path.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Split a comma-separated tag string, dropping blanks and duplicates.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// A contiguous slice of a document after transformation.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Outcome of a single store operation.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub collection: String,
    pub chunks_created: usize,
    pub processing_time_ms: u64,
    pub ids: Vec<String>,
}

/// One retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl SearchResult {
    /// Render a human-readable block: header, metadata summary, content.
    pub fn format(&self, rank: usize) -> String {
        let source = self.metadata.source_path.as_deref().unwrap_or("(no source)");
        let mut out = format!("## Result {} (score: {:.3})\n", rank, self.score);
        out.push_str(&format!(
            "Type: {} | Source: {}",
            self.metadata.type_name(), source
        ));
        if !self.metadata.tags.is_empty() {
            out.push_str(&format!(" | Tags: {}", self.metadata.tags.join(", ")));
        }
        out.push_str(&format!(" | Indexed: {}\n\n", self.metadata.indexed_at_iso()));
        out.push_str(self.content.trim_end());
        out.push('\n');
        out
    }
}

/// A similarity search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub doc_type: Option<DocumentType>,
    /// Exact path or path prefix.
    pub source_path: Option<String>,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            doc_type: None,
            source_path: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_type(mut self, doc_type: Option<DocumentType>) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn with_source_path(mut self, source_path: Option<String>) -> Self {
        self.source_path = source_path.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// The limit clamped into `[MIN_SEARCH_LIMIT, MAX_SEARCH_LIMIT]`.
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit as i64)
    }
}

/// Clamp a caller-supplied limit into the accepted range.
pub fn clamp_limit(limit: i64) -> usize {
    limit.clamp(MIN_SEARCH_LIMIT as i64, MAX_SEARCH_LIMIT as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_parse() {
        assert_eq!(
            DocumentType::try_from_str("Architecture"),
            Some(DocumentType::Architecture)
        );
        assert_eq!(DocumentType::try_from_str(" api "), Some(DocumentType::Api));
        assert_eq!(DocumentType::try_from_str("blog"), None);
        assert_eq!(DocumentType::default(), DocumentType::General);
    }

    #[test]
    fn test_document_type_from_str_error_lists_names() {
        let err = "blog".parse::<DocumentType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("blog"));
        assert!(msg.contains("architecture"));
        assert!(msg.contains("reference"));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("auth, api,,auth , db"), vec!["auth", "api", "db"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-3), 1);
        assert_eq!(clamp_limit(10), 10);
        assert_eq!(clamp_limit(51), 50);
        assert_eq!(SearchQuery::new("q").with_limit(500).effective_limit(), 50);
    }

    #[test]
    fn test_blank_source_path_is_dropped() {
        let doc = Document::new("x", DocumentType::Api).with_source_path(Some("  ".into()));
        assert!(doc.source_path.is_none());
    }
}
