use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Connection pool size; dashboard and stats reads share the pool
    /// with run writes.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// `"disabled"` (heuristic only) or `"openai"` (AI with heuristic fallback).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Default number of synthetic feedback items per run.
    #[serde(default = "default_count")]
    pub count: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { count: 25 }
    }
}

fn default_count() -> usize {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriageConfig {
    /// Most-recent feedback rows read by the dashboard projector.
    #[serde(default = "default_activity_window")]
    pub activity_window: i64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            activity_window: 50,
        }
    }
}

fn default_activity_window() -> i64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// When true, the server triggers a pipeline run on a fixed interval.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: 24,
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

impl ClassifierConfig {
    pub fn is_ai_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate db
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    // Validate classifier
    match config.classifier.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown classifier provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.classifier.is_ai_enabled() && config.classifier.model.is_none() {
        anyhow::bail!(
            "classifier.model must be specified when provider is '{}'",
            config.classifier.provider
        );
    }

    // Validate generator
    if config.generator.count == 0 {
        anyhow::bail!("generator.count must be > 0");
    }

    // Validate triage
    if config.triage.activity_window < 1 {
        anyhow::bail!("triage.activity_window must be >= 1");
    }

    // Validate schedule
    if config.schedule.enabled && config.schedule.interval_hours == 0 {
        anyhow::bail!("schedule.interval_hours must be >= 1 when the schedule is enabled");
    }

    Ok(config)
}
