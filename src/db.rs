use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Open (creating if missing) the SQLite database at `db_path` in WAL mode.
///
/// `timeout_secs` bounds both connection acquisition and SQLite's busy wait.
pub async fn connect(db_path: &Path, timeout_secs: u64) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let timeout = Duration::from_secs(timeout_secs);
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;

    Ok(pool)
}
