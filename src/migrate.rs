//! Store schema setup for `docctx init`.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::{Config, StoreDriver};
use crate::db;
use crate::qdrant_store::QdrantStore;

/// Create the vector table and its index. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_collection ON vectors(collection)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Prepare the configured store: SQLite schema or the Qdrant collection.
pub async fn run_init(config: &Config) -> Result<()> {
    if !config.rag.enabled {
        println!("RAG is disabled; nothing to initialize.");
        return Ok(());
    }
    let store = &config.rag.store;

    match store.driver {
        StoreDriver::Memory => {
            println!("Memory store needs no initialization.");
        }
        StoreDriver::Sqlite => {
            let Some(path) = store.path.as_deref() else {
                bail!("rag.store.path is required for the sqlite driver");
            };
            let pool = db::connect(path, store.timeout_secs).await?;
            run_migrations(&pool).await?;
            pool.close().await;
            info!(path = %path.display(), "sqlite schema ready");
            println!("Database initialized at {}.", path.display());
        }
        StoreDriver::Qdrant => {
            let Some(dims) = config.rag.vectorizer.dims else {
                bail!("rag.vectorizer.dims is required to create a Qdrant collection");
            };
            let qdrant = QdrantStore::new(store)?;
            let collection = &config.rag.collection;
            if qdrant.ensure_collection(collection, dims).await? {
                println!("Created Qdrant collection '{}' ({} dims).", collection, dims);
            } else {
                println!("Qdrant collection '{}' already exists.", collection);
            }
        }
    }

    Ok(())
}
