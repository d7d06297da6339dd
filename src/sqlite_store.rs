//! SQLite-backed [`VectorStore`] implementation.
//!
//! One `vectors` table holds every collection, keyed by `(collection, id)`.
//! Embeddings are little-endian f32 BLOBs; similarity is brute-force cosine
//! over the collection, in row order so that equal scores keep insertion
//! order. Upserts and deletes run in a single transaction.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use docctx_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docctx_core::store::{rank_by_score, ScoredRecord, VectorRecord, VectorStore};
use docctx_core::Error;

use crate::db;
use crate::migrate;

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Connect to `path` and make sure the schema exists.
    pub async fn open(path: &Path, timeout_secs: u64) -> Result<Self> {
        let pool = db::connect(path, timeout_secs).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }
}

/// Pool exhaustion surfaces as a timeout; anything else stays a store failure.
fn db_error(err: sqlx::Error) -> anyhow::Error {
    match err {
        sqlx::Error::PoolTimedOut => Error::Timeout("SQLite connection pool".to_string()).into(),
        other => anyhow::Error::new(other).context("SQLite query failed"),
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn driver(&self) -> &str {
        "sqlite"
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, text, metadata_json, embedding, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM vectors WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut candidates: Vec<ScoredRecord> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                let metadata: Map<String, Value> =
                    serde_json::from_str(&metadata_json).unwrap_or_default();
                ScoredRecord {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata,
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        rank_by_score(&mut candidates);
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for id in ids {
            sqlx::query("DELETE FROM vectors WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, vector: Vec<f32>, source: &str) -> VectorRecord {
        let mut metadata = Map::new();
        metadata.insert("source_path".to_string(), Value::from(source));
        VectorRecord {
            id: id.to_string(),
            vector,
            text: format!("text of {}", id),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_upsert_query_count_delete() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("data/v.sqlite"), 5)
            .await
            .unwrap();

        store
            .upsert(
                "docs",
                &[
                    record("a", vec![1.0, 0.0], "a.md"),
                    record("b", vec![0.0, 1.0], "b.md"),
                ],
            )
            .await
            .unwrap();
        store
            .upsert("other", &[record("c", vec![1.0, 0.0], "c.md")])
            .await
            .unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 2);
        assert_eq!(store.count("missing").await.unwrap(), 0);

        let hits = store.query("docs", &[0.9, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].metadata["source_path"], "a.md");
        assert_eq!(hits[0].text, "text of a");

        store.delete("docs", &["a".to_string()]).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        assert_eq!(store.count("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reupsert_replaces_and_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("v.sqlite"), 5)
            .await
            .unwrap();

        store
            .upsert(
                "docs",
                &[
                    record("first", vec![1.0, 0.0], "1.md"),
                    record("second", vec![1.0, 0.0], "2.md"),
                ],
            )
            .await
            .unwrap();
        store
            .upsert("docs", &[record("first", vec![1.0, 0.0], "1-new.md")])
            .await
            .unwrap();

        let hits = store.query("docs", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[0].metadata["source_path"], "1-new.md");
    }
}
