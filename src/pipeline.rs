//! Triage pipeline orchestration.
//!
//! Coordinates one full run: generate (or ingest) → classify → persist →
//! aggregate → report. Classification is fail-soft (the fallback classifier
//! absorbs inference errors); persistence errors abort the run before
//! aggregation so no partial cluster set or report is ever written.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

use crate::classifier::{self, Classifier};
use crate::config::Config;
use crate::db;
use crate::generator;
use crate::models::{normalize_timestamp, FeedbackItem, ReportRecord, Source};
use crate::report;
use crate::triage;

/// Counts and report id from one pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    pub items: usize,
    pub clusters: usize,
    pub escalated: usize,
    /// `None` for dry runs.
    pub report_id: Option<String>,
}

/// Run the full triage pipeline over `count` generated feedback items.
///
/// With `dry_run`, classification and aggregation happen in memory and
/// nothing is written. With `quiet`, the stdout run summary is suppressed
/// (server and schedule callers log via tracing instead).
pub async fn run_triage(
    config: &Config,
    count: Option<usize>,
    dry_run: bool,
    quiet: bool,
) -> Result<RunSummary> {
    let n = count.unwrap_or(config.generator.count);
    let items = generator::generate(n);
    run_items(config, items, dry_run, quiet).await
}

/// Run the pipeline over externally collected feedback from a JSON-lines
/// file. Each line is `{"source": ..., "text": ..., "created_at": ...?}`;
/// `created_at` defaults to now and tolerates epoch-milliseconds.
pub async fn run_ingest(config: &Config, path: &Path, dry_run: bool) -> Result<RunSummary> {
    let items = read_ingest_file(path)?;
    run_items(config, items, dry_run, false).await
}

async fn run_items(
    config: &Config,
    mut items: Vec<FeedbackItem>,
    dry_run: bool,
    quiet: bool,
) -> Result<RunSummary> {
    let classifier = classifier::create_classifier(&config.classifier)?;
    tracing::info!(
        classifier = classifier.name(),
        items = items.len(),
        "starting triage run"
    );

    classify_items(classifier.as_ref(), &mut items).await?;

    if dry_run {
        let clusters = triage::aggregate(&items);
        let escalated = clusters.iter().filter(|c| c.escalated).count();
        if !quiet {
            println!("triage run (dry-run)");
            println!("  feedback items: {}", items.len());
            println!("  clusters: {}", clusters.len());
            println!("  escalated: {}", escalated);
        }
        return Ok(RunSummary {
            items: items.len(),
            clusters: clusters.len(),
            escalated,
            report_id: None,
        });
    }

    let pool = db::connect(config).await?;
    let report = persist_run(&pool, &items).await?;
    pool.close().await;

    tracing::info!(report_id = %report.id, "triage run complete");

    if !quiet {
        println!("triage run");
        println!("  feedback items: {}", items.len());
        println!("  clusters: {}", report.clusters.len());
        println!("  escalated: {}", report.escalated_clusters.len());
        println!("  report: {}", report.id);
        println!("ok");
    }

    Ok(RunSummary {
        items: items.len(),
        clusters: report.clusters.len(),
        escalated: report.escalated_clusters.len(),
        report_id: Some(report.id),
    })
}

/// Classify every item in place. Must complete for the whole batch before
/// aggregation begins; no partial-batch aggregation.
async fn classify_items(classifier: &dyn Classifier, items: &mut [FeedbackItem]) -> Result<()> {
    for item in items.iter_mut() {
        let c = classifier.classify(&item.raw_text).await?;
        item.sentiment = Some(c.sentiment);
        item.urgency = Some(c.urgency);
        item.cluster_id = Some(c.category.cluster_id());
        item.category = Some(c.category);
    }
    Ok(())
}

/// Persist one run as a logical transaction: upsert feedback, recompute and
/// replace the cluster table wholesale, append the report. Any write error
/// aborts before the next step.
async fn persist_run(pool: &SqlitePool, items: &[FeedbackItem]) -> Result<ReportRecord> {
    for item in items {
        upsert_feedback(pool, item).await?;
    }

    let mut clusters = triage::aggregate(items);

    // True trailing-7-day counts from persisted history, now that this
    // run's items are in the table.
    let week_ago = chrono::Utc::now().timestamp() - 7 * 86_400;
    for cluster in &mut clusters {
        cluster.count_7d =
            sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE category = ? AND created_at >= ?")
                .bind(cluster.category.as_str())
                .bind(week_ago)
                .fetch_one(pool)
                .await?;
    }

    replace_clusters(pool, &clusters).await?;

    let report = report::build_report(&clusters, items.len());
    insert_report(pool, &report).await?;

    Ok(report)
}

pub async fn upsert_feedback(pool: &SqlitePool, item: &FeedbackItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO feedback (id, source, created_at, raw_text, sentiment, urgency, category, cluster_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            source = excluded.source,
            created_at = excluded.created_at,
            raw_text = excluded.raw_text,
            sentiment = excluded.sentiment,
            urgency = excluded.urgency,
            category = excluded.category,
            cluster_id = excluded.cluster_id
        "#,
    )
    .bind(&item.id)
    .bind(item.source.as_str())
    .bind(item.created_at)
    .bind(&item.raw_text)
    .bind(item.sentiment)
    .bind(item.urgency)
    .bind(item.category.map(|c| c.as_str()))
    .bind(&item.cluster_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace the cluster table wholesale in one transaction.
async fn replace_clusters(
    pool: &SqlitePool,
    clusters: &[crate::models::ClusterRecord],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM clusters").execute(&mut *tx).await?;

    for cluster in clusters {
        sqlx::query(
            r#"
            INSERT INTO clusters (id, summary, category, avg_sentiment, avg_urgency, count_today, count_7d, trend_score, escalated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cluster.id)
        .bind(&cluster.summary)
        .bind(cluster.category.as_str())
        .bind(cluster.avg_sentiment)
        .bind(cluster.avg_urgency)
        .bind(cluster.count_today)
        .bind(cluster.count_7d)
        .bind(cluster.trend_score)
        .bind(cluster.escalated)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_report(pool: &SqlitePool, report: &ReportRecord) -> Result<()> {
    let json = serde_json::to_string(report)?;

    sqlx::query("INSERT INTO reports (id, created_at, summary, json) VALUES (?, ?, ?, ?)")
        .bind(&report.id)
        .bind(report.created_at)
        .bind(&report.summary)
        .bind(json)
        .execute(pool)
        .await?;

    Ok(())
}

/// One line of an ingest file.
#[derive(Debug, serde::Deserialize)]
struct IngestRecord {
    source: Source,
    text: String,
    #[serde(default)]
    created_at: Option<i64>,
}

fn read_ingest_file(path: &Path) -> Result<Vec<FeedbackItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ingest file: {}", path.display()))?;

    let now = chrono::Utc::now().timestamp();
    let mut items = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: IngestRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid ingest record on line {}", line_no + 1))?;

        if record.text.trim().is_empty() {
            anyhow::bail!("Empty feedback text on line {}", line_no + 1);
        }

        items.push(FeedbackItem {
            id: Uuid::new_v4().to_string(),
            source: record.source,
            created_at: normalize_timestamp(record.created_at.unwrap_or(now)),
            raw_text: record.text,
            sentiment: None,
            urgency: None,
            category: None,
            cluster_id: None,
        });
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        std::fs::write(
            &path,
            r#"{"source": "chat", "text": "Site is completely down!"}
{"source": "forum", "text": "Love the new dashboard!", "created_at": 1756000000000}

{"source": "code-forge", "text": "docs are unclear", "created_at": 1756000000}
"#,
        )
        .unwrap();

        let items = read_ingest_file(&path).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].source, Source::Chat);
        // Millisecond timestamps are normalized to seconds.
        assert_eq!(items[1].created_at, 1_756_000_000);
        assert_eq!(items[2].created_at, 1_756_000_000);
        assert!(items.iter().all(|i| i.category.is_none()));
    }

    #[test]
    fn test_read_ingest_file_rejects_bad_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, r#"{"source": "email", "text": "hello"}"#).unwrap();
        assert!(read_ingest_file(&path).is_err());
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        toml::from_str(&format!(
            r#"
[db]
path = "{}/triage.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
            dir.path().display()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_quiet_run_returns_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        crate::migrate::run_migrations(&config).await.unwrap();

        let summary = run_triage(&config, Some(8), false, true).await.unwrap();
        assert_eq!(summary.items, 8);
        assert!(summary.clusters >= 1);
        assert!(summary.report_id.is_some());
    }

    #[tokio::test]
    async fn test_quiet_dry_run_has_no_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        let summary = run_triage(&config, Some(5), true, true).await.unwrap();
        assert_eq!(summary.items, 5);
        assert!(summary.report_id.is_none());
        // Nothing written: the database file was never created.
        assert!(!dir.path().join("triage.sqlite").exists());
    }

    #[tokio::test]
    async fn test_classify_items_fills_all_fields() {
        let mut items = generator::generate(10);
        let classifier = classifier::HeuristicClassifier;
        classify_items(&classifier, &mut items).await.unwrap();

        for item in &items {
            assert!(item.sentiment.is_some());
            assert!(item.urgency.is_some());
            let category = item.category.unwrap();
            assert_eq!(item.cluster_id.as_deref(), Some(category.cluster_id().as_str()));
        }
    }
}
