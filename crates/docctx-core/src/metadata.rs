//! Typed chunk metadata and the factory that stamps it onto chunks.
//!
//! Every stored record carries the fixed keys below; caller-supplied
//! `extra` pairs are merged in but can never replace a fixed key.
//!
//! | Key | Value |
//! |-----|-------|
//! | `type` | [`DocumentType`] name |
//! | `source_path` | string or `null` |
//! | `tags` | array of strings |
//! | `indexed_at` | RFC 3339 UTC timestamp |
//! | `filename` | last path segment of `source_path`, or `null` |
//! | `size` | characters in the chunk |
//! | `chunk_index` | 0-based position in the document |
//! | `content_hash` | SHA-256 of the chunk text |

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::{Chunk, Document, DocumentType};

/// Keys owned by [`Metadata`]; `extra` entries with these names are dropped.
pub const FIXED_KEYS: [&str; 8] = [
    "type",
    "source_path",
    "tags",
    "indexed_at",
    "filename",
    "size",
    "chunk_index",
    "content_hash",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub doc_type: DocumentType,
    /// Stored `type` string that names no [`DocumentType`]; `doc_type` is
    /// then `general` for display only.
    pub unknown_type: Option<String>,
    pub source_path: Option<String>,
    pub tags: Vec<String>,
    pub indexed_at: DateTime<Utc>,
    pub filename: Option<String>,
    pub size: usize,
    pub chunk_index: usize,
    pub content_hash: String,
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    /// The type as stored.
    pub fn type_name(&self) -> &str {
        self.unknown_type.as_deref().unwrap_or(self.doc_type.as_str())
    }

    /// Whether a type filter accepts this record. Unknown stored types
    /// never match, not even a `general` filter.
    pub fn has_type(&self, doc_type: DocumentType) -> bool {
        self.unknown_type.is_none() && self.doc_type == doc_type
    }

    pub fn indexed_at_iso(&self) -> String {
        self.indexed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Flatten into the JSON object stored next to each vector.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.extra {
            if !FIXED_KEYS.contains(&key.as_str()) {
                map.insert(key.clone(), value.clone());
            }
        }
        map.insert("type".into(), Value::from(self.type_name()));
        map.insert(
            "source_path".into(),
            self.source_path.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("tags".into(), Value::from(self.tags.clone()));
        map.insert("indexed_at".into(), Value::from(self.indexed_at_iso()));
        map.insert(
            "filename".into(),
            self.filename.clone().map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("size".into(), Value::from(self.size));
        map.insert("chunk_index".into(), Value::from(self.chunk_index));
        map.insert("content_hash".into(), Value::from(self.content_hash.clone()));
        map
    }

    /// Rebuild from a stored JSON object.
    ///
    /// Lenient: unknown types read back as `general` with the raw string
    /// kept in `unknown_type`, missing or malformed timestamps as the Unix
    /// epoch. Records are written by this crate, so
    /// these fallbacks only matter for foreign data in a shared collection.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let str_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let usize_field = |key: &str| {
            map.get(key)
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .unwrap_or(0)
        };

        let tags = map
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let indexed_at = str_field("indexed_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();

        let extra = map
            .iter()
            .filter(|(k, _)| !FIXED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let stored_type = str_field("type");
        let parsed = stored_type.as_deref().and_then(DocumentType::try_from_str);
        let unknown_type = match parsed {
            Some(_) => None,
            None => stored_type,
        };

        Self {
            doc_type: parsed.unwrap_or_default(),
            unknown_type,
            source_path: str_field("source_path"),
            tags,
            indexed_at,
            filename: str_field("filename"),
            size: usize_field("size"),
            chunk_index: usize_field("chunk_index"),
            content_hash: str_field("content_hash").unwrap_or_default(),
            extra,
        }
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Builds [`Metadata`] for every chunk of one document.
///
/// The timestamp is fixed when the factory is created so that all chunks
/// of a single index call share the same `indexed_at`.
#[derive(Debug, Clone)]
pub struct MetadataFactory {
    doc_type: DocumentType,
    source_path: Option<String>,
    filename: Option<String>,
    tags: Vec<String>,
    extra: BTreeMap<String, Value>,
    indexed_at: DateTime<Utc>,
}

impl MetadataFactory {
    pub fn for_document(document: &Document, indexed_at: DateTime<Utc>) -> Self {
        Self {
            doc_type: document.doc_type,
            source_path: document.source_path.clone(),
            filename: document.source_path.as_deref().and_then(file_name),
            tags: document.tags.clone(),
            extra: document.extra.clone(),
            indexed_at,
        }
    }

    pub fn build(&self, chunk: &Chunk) -> Metadata {
        Metadata {
            doc_type: self.doc_type,
            unknown_type: None,
            source_path: self.source_path.clone(),
            tags: self.tags.clone(),
            indexed_at: self.indexed_at,
            filename: self.filename.clone(),
            size: chunk.text.chars().count(),
            chunk_index: chunk.index,
            content_hash: chunk.hash.clone(),
            extra: self
                .extra
                .iter()
                .filter(|(k, _)| !FIXED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn file_name(path: &str) -> Option<String> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
