use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create feedback table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            raw_text TEXT NOT NULL,
            sentiment REAL,
            urgency INTEGER,
            category TEXT,
            cluster_id TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create clusters table (one row per category, replaced wholesale each run)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clusters (
            id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            category TEXT NOT NULL UNIQUE,
            avg_sentiment REAL NOT NULL,
            avg_urgency REAL NOT NULL,
            count_today INTEGER NOT NULL,
            count_7d INTEGER NOT NULL,
            trend_score REAL NOT NULL,
            escalated INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create reports table (insert-only history)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            summary TEXT NOT NULL,
            json TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback(created_at DESC)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_category ON feedback(category)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_cluster_id ON feedback(cluster_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
