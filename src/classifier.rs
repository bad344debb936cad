//! Classifier strategy abstraction and implementations.
//!
//! Defines the [`Classifier`] trait and concrete implementations:
//! - **[`HeuristicClassifier`]** — deterministic keyword matching; always
//!   available, used for bulk seeding and as the fallback strategy.
//! - **[`OpenAiClassifier`]** — calls the OpenAI chat completions API with a
//!   strict JSON-only prompt and a defensive parser.
//! - **[`FallbackClassifier`]** — tries a primary strategy and recovers with
//!   the heuristic on *any* failure. Classification errors never propagate
//!   to the pipeline.
//!
//! # Strategy Selection
//!
//! Use [`create_classifier`] to instantiate the appropriate strategy based
//! on the configuration:
//!
//! | Config Value | Strategy |
//! |-------------|----------|
//! | `"disabled"` | [`HeuristicClassifier`] only |
//! | `"openai"` | [`OpenAiClassifier`] wrapped in [`FallbackClassifier`] |
//!
//! # Defensive Parsing
//!
//! The external model is asked for a single JSON object with exactly four
//! fields (`sentiment`, `urgency`, `category`, `summary`), but the response
//! is treated as an untrusted string: the first balanced `{...}` substring
//! is extracted and decoded in isolation. Missing or non-numeric `sentiment`
//! / `urgency` default to 0 / 3 before clamping; a missing `category` or
//! `summary` fails the parse and triggers the heuristic fallback.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::models::Category;

// ============ Keyword tables ============
//
// These lists and their evaluation order are a fixed contract: the heuristic
// is the only classifier guaranteed available, and seed data and tests rely
// on it being deterministic. First match wins per field.

const POSITIVE_KEYWORDS: &[&str] = &[
    "love", "great", "awesome", "amazing", "excellent", "thank", "perfect",
];
const FAILURE_KEYWORDS: &[&str] = &["bug", "broken", "fail", "error", "crash", "wrong"];
const OUTAGE_KEYWORDS: &[&str] = &["down", "outage", "urgent", "critical", "unusable"];

const URGENCY_CRITICAL_KEYWORDS: &[&str] = &["outage", "critical", "urgent", "down"];
const URGENCY_HIGH_KEYWORDS: &[&str] = &["broken", "fail", "error"];
const URGENCY_LOW_KEYWORDS: &[&str] = &["feature", "request", "would be nice", "please add"];

/// Category keyword lists, evaluated in this exact order; earlier categories
/// win on keyword overlap.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Bug,
        &["bug", "broken", "crash", "glitch", "doesn't work", "error"],
    ),
    (
        Category::Feature,
        &["feature", "request", "would be nice", "please add", "support for"],
    ),
    (
        Category::Docs,
        &["doc", "documentation", "tutorial", "guide", "readme", "example"],
    ),
    (
        Category::Performance,
        &["slow", "lag", "performance", "latency", "timeout"],
    ),
    (
        Category::Billing,
        &["billing", "invoice", "charge", "payment", "refund", "price", "subscription"],
    ),
    (
        Category::Outage,
        &["down", "outage", "offline", "unavailable", "can't access"],
    ),
    (
        Category::Praise,
        &["love", "great", "awesome", "amazing", "thank", "excellent", "perfect"],
    ),
];

/// Maximum length of the derived summary, in characters.
const SUMMARY_CHARS: usize = 50;

/// The scoring signal produced for one feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Sentiment in [-1, 1].
    pub sentiment: f64,
    /// Urgency in [1, 5].
    pub urgency: i64,
    pub category: Category,
    /// Short human-readable digest of the input text.
    pub summary: String,
}

/// A text classification strategy.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Strategy name, used in logs and the run summary.
    fn name(&self) -> &str;

    /// Classify a single piece of feedback text.
    async fn classify(&self, text: &str) -> Result<Classification>;
}

// ============ Heuristic classifier ============

/// Deterministic keyword-based classifier.
///
/// Pure function of the input text: the same input always yields the same
/// `{sentiment, urgency, category}` triple. Never fails.
pub struct HeuristicClassifier;

#[async_trait]
impl Classifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        Ok(heuristic_classify(text))
    }
}

/// Classify text with the fixed keyword tables.
///
/// Exposed as a free function so the generator seed path and tests can call
/// it without going through the async trait.
pub fn heuristic_classify(text: &str) -> Classification {
    let lower = text.to_lowercase();

    let sentiment = if contains_any(&lower, POSITIVE_KEYWORDS) {
        0.7
    } else if contains_any(&lower, FAILURE_KEYWORDS) {
        -0.6
    } else if contains_any(&lower, OUTAGE_KEYWORDS) {
        -0.9
    } else {
        0.0
    };

    let urgency = if contains_any(&lower, URGENCY_CRITICAL_KEYWORDS) {
        5
    } else if contains_any(&lower, URGENCY_HIGH_KEYWORDS) {
        4
    } else if contains_any(&lower, URGENCY_LOW_KEYWORDS) {
        2
    } else {
        3
    };

    let category = CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(cat, _)| *cat)
        .unwrap_or(Category::Other);

    Classification {
        sentiment,
        urgency,
        category,
        summary: summarize(text),
    }
}

fn contains_any(lower_text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| lower_text.contains(kw))
}

/// First 50 characters of the input, ellipsis-appended when truncated.
fn summarize(text: &str) -> String {
    if text.chars().count() > SUMMARY_CHARS {
        let truncated: String = text.chars().take(SUMMARY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

// ============ OpenAI classifier ============

/// Classifier backed by the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable at call time. Any
/// failure — missing key, network error, timeout, malformed response — is
/// surfaced as an error and handled by the [`FallbackClassifier`] wrapper.
pub struct OpenAiClassifier {
    model: String,
    timeout_secs: u64,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("classifier.model required for OpenAI provider"))?;

        Ok(Self {
            model,
            timeout_secs: config.timeout_secs,
        })
    }
}

const CLASSIFY_PROMPT: &str = "You are a feedback triage classifier. \
Respond with a single JSON object and nothing else, with exactly these fields: \
\"sentiment\" (number in [-1, 1]), \"urgency\" (integer in [1, 5]), \
\"category\" (one of: bug, feature, docs, performance, billing, outage, praise, other), \
\"summary\" (string, at most 50 characters).";

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": CLASSIFY_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

        parse_classification(content)
    }
}

/// Parse a classification out of an untrusted model response.
///
/// Extracts the first balanced `{...}` substring (the surrounding response
/// may contain prose), decodes it, clamps numeric fields, and requires
/// `category` and `summary` to be present strings.
pub fn parse_classification(response: &str) -> Result<Classification> {
    let json_str = extract_json_object(response)
        .ok_or_else(|| anyhow::anyhow!("No JSON object found in classifier response"))?;

    let value: serde_json::Value = serde_json::from_str(json_str)?;

    let sentiment = value
        .get("sentiment")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0);

    let urgency = (value
        .get("urgency")
        .and_then(|v| v.as_f64())
        .unwrap_or(3.0)
        .round() as i64)
        .clamp(1, 5);

    let category: Category = value
        .get("category")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Classifier response missing 'category'"))?
        .parse()
        .unwrap_or(Category::Other);

    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Classifier response missing 'summary'"))?
        .to_string();

    Ok(Classification {
        sentiment,
        urgency,
        category,
        summary,
    })
}

/// Extract the first balanced `{...}` substring from a string.
///
/// Tracks brace depth and string/escape state so braces inside JSON string
/// values do not terminate the scan. Returns `None` when no balanced object
/// exists.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

// ============ Fallback composition ============

/// Tries a primary strategy and recovers with the heuristic on any error.
///
/// This is the fail-soft boundary required by the pipeline: classification
/// failures are logged and absorbed here, never surfaced to the run.
pub struct FallbackClassifier {
    primary: Box<dyn Classifier>,
}

impl FallbackClassifier {
    pub fn new(primary: Box<dyn Classifier>) -> Self {
        Self { primary }
    }
}

#[async_trait]
impl Classifier for FallbackClassifier {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        match self.primary.classify(text).await {
            Ok(classification) => Ok(classification),
            Err(e) => {
                tracing::warn!(
                    classifier = self.primary.name(),
                    error = %e,
                    "Primary classifier failed, falling back to heuristic"
                );
                Ok(heuristic_classify(text))
            }
        }
    }
}

/// Create the appropriate [`Classifier`] based on configuration.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the OpenAI classifier
/// cannot be initialized (missing model).
pub fn create_classifier(config: &ClassifierConfig) -> Result<Box<dyn Classifier>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(HeuristicClassifier)),
        "openai" => Ok(Box::new(FallbackClassifier::new(Box::new(
            OpenAiClassifier::new(config)?,
        )))),
        other => bail!("Unknown classifier provider: {}", other),
    }
}
