//! In-memory [`VectorStore`] implementation for tests and ephemeral sessions.
//!
//! Uses a `HashMap` of collections behind `std::sync::RwLock`. Vector search
//! is brute-force cosine similarity over every record in the collection.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{rank_by_score, ScoredRecord, VectorRecord, VectorStore};
use crate::embedding::cosine_similarity;

/// In-memory store. Records keep insertion order; re-upserting an id
/// replaces the record in place.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn driver(&self) -> &str {
        "memory"
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let stored = collections.entry(collection.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut candidates: Vec<ScoredRecord> = stored
            .iter()
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();
        rank_by_score(&mut candidates);
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if let Some(stored) = collections.get_mut(collection) {
            stored.retain(|r| !ids.contains(&r.id));
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(collection).map(Vec::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            text: format!("text {}", id),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "docs",
                &[
                    record("a", vec![0.0, 1.0]),
                    record("b", vec![1.0, 0.0]),
                    record("c", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = InMemoryStore::new();
        store.upsert("a", &[record("1", vec![1.0])]).await.unwrap();
        assert_eq!(store.count("a").await.unwrap(), 1);
        assert_eq!(store.count("b").await.unwrap(), 0);
        assert!(store.query("b", &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let store = InMemoryStore::new();
        store.upsert("c", &[record("1", vec![1.0])]).await.unwrap();
        store.upsert("c", &[record("1", vec![2.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);

        store.delete("c", &["1".to_string()]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_insertion_order() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "c",
                &[
                    record("first", vec![1.0, 0.0]),
                    record("second", vec![2.0, 0.0]),
                    record("third", vec![3.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let results = store.query("c", &[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
