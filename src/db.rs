//! SQLite connection handling for the triage store.
//!
//! All pipeline state (feedback, clusters, reports) lives in one SQLite
//! file. WAL mode keeps dashboard and stats reads responsive while a run
//! is writing; the pool is shared between those readers and the run's
//! upsert/replace writes, sized by `[db] max_connections`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// How long a connection waits on a write lock before erroring.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if missing) the triage database and return a pool.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open triage database: {}", db_path.display()))?;

    Ok(pool)
}
