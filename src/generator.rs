//! Synthetic feedback generation.
//!
//! Produces randomized but weighted feedback items from per-category
//! template lists with `{slot}` substitution from fixed vocabularies. This
//! simulates collection from external channels; the output is demo/seed
//! data, not the object of correctness testing — the only contract is
//! syntactically valid, non-empty text.

use rand::Rng;
use uuid::Uuid;

use crate::models::{Category, FeedbackItem, Source};

/// Category selection weights, summing to 100.
const CATEGORY_WEIGHTS: &[(Category, u32)] = &[
    (Category::Bug, 25),
    (Category::Outage, 15),
    (Category::Performance, 15),
    (Category::Billing, 10),
    (Category::Docs, 10),
    (Category::Feature, 15),
    (Category::Praise, 10),
];

const BUG_TEMPLATES: &[&str] = &[
    "Found a bug while {action} on {platform}, got error {error_code}",
    "{product} keeps crashing on my {device} {timeframe}",
    "Something is broken: {action} fails with {error_code} every time",
];

const OUTAGE_TEMPLATES: &[&str] = &[
    "{product} has been completely unusable for {duration}, is there an outage?",
    "Everything went offline {timeframe} and I still can't access {product}",
    "Urgent: {product} is unavailable for our whole {plan} team",
];

const PERFORMANCE_TEMPLATES: &[&str] = &[
    "{product} is painfully slow when {action}, I'm {emotion}",
    "Performance has tanked {timeframe}, pages take {duration} to load",
    "Terrible lag on {platform} since the last release",
];

const BILLING_TEMPLATES: &[&str] = &[
    "I was charged twice on the {plan} plan, please refund",
    "The invoice from {timeframe} shows {count} seats we never had",
    "Why did the price of the {plan} subscription change without notice?",
];

const DOCS_TEMPLATES: &[&str] = &[
    "The documentation for {feature} is out of date",
    "Couldn't find a guide for {action} anywhere in the docs",
    "The tutorial skips the {feature} setup entirely, very {emotion}",
];

const FEATURE_TEMPLATES: &[&str] = &[
    "Please add {feature} to {product}",
    "Feature request: {feature} support on {platform}",
    "It would be nice to have {feature} for {plan} customers",
];

const PRAISE_TEMPLATES: &[&str] = &[
    "Love {feature}, it saved me {duration} this week",
    "{product} is awesome, great work from the team",
    "Thank you for shipping {feature}, works perfectly on my {device}",
];

/// Slot vocabularies for template substitution.
const SLOT_VOCAB: &[(&str, &[&str])] = &[
    (
        "platform",
        &["macOS", "Windows", "Linux", "iOS", "Android", "the web app"],
    ),
    ("device", &["laptop", "phone", "tablet", "work machine"]),
    (
        "emotion",
        &["frustrated", "annoyed", "confused", "disappointed", "impressed"],
    ),
    (
        "error_code",
        &["500", "502", "ERR_TIMEOUT", "E1001", "0x80070057"],
    ),
    (
        "action",
        &[
            "exporting a report",
            "saving my work",
            "logging in",
            "uploading a file",
            "switching workspaces",
        ],
    ),
    (
        "feature",
        &[
            "dark mode",
            "offline sync",
            "keyboard shortcuts",
            "bulk editing",
            "custom fields",
        ],
    ),
    (
        "duration",
        &["a few minutes", "two hours", "all morning", "days"],
    ),
    (
        "timeframe",
        &[
            "this morning",
            "yesterday",
            "since the last update",
            "over the weekend",
        ],
    ),
    ("plan", &["free", "pro", "team", "enterprise"]),
    ("count", &["three", "five", "a dozen", "hundreds of"]),
    (
        "product",
        &["the dashboard", "the mobile app", "the API", "the editor"],
    ),
];

fn templates_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Bug => BUG_TEMPLATES,
        Category::Outage => OUTAGE_TEMPLATES,
        Category::Performance => PERFORMANCE_TEMPLATES,
        Category::Billing => BILLING_TEMPLATES,
        Category::Docs => DOCS_TEMPLATES,
        Category::Feature => FEATURE_TEMPLATES,
        Category::Praise => PRAISE_TEMPLATES,
        // Not generated directly; "other" only appears via classification.
        Category::Other => BUG_TEMPLATES,
    }
}

/// Pick a category according to [`CATEGORY_WEIGHTS`].
fn pick_category(rng: &mut impl Rng) -> Category {
    let total: u32 = CATEGORY_WEIGHTS.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (category, weight) in CATEGORY_WEIGHTS {
        if roll < *weight {
            return *category;
        }
        roll -= weight;
    }
    // Weights sum to `total`, so the loop always returns.
    unreachable!("weighted pick exhausted");
}

/// Replace `{slot}` tokens with random vocabulary entries until none remain.
///
/// Order-independent repeated replacement: each pass substitutes the first
/// remaining token, so slots introduced by earlier substitutions would also
/// be resolved. Unknown slot names are stripped to guarantee termination.
fn fill_slots(template: &str, rng: &mut impl Rng) -> String {
    let mut text = template.to_string();

    while let Some(start) = text.find('{') {
        let Some(len) = text[start..].find('}') else {
            break;
        };
        let end = start + len;
        let slot = &text[start + 1..end];

        let replacement = SLOT_VOCAB
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, words)| words[rng.gen_range(0..words.len())])
            .unwrap_or("");

        text.replace_range(start..=end, replacement);
    }

    text
}

/// Generate `n` synthetic feedback items.
///
/// Category is weighted, source is uniform over the source enum, and
/// `created_at` is randomized within the trailing 24-hour window. Items are
/// unclassified; the pipeline classifies them before aggregation.
pub fn generate(n: usize) -> Vec<FeedbackItem> {
    let mut rng = rand::thread_rng();
    let now = chrono::Utc::now().timestamp();

    (0..n)
        .map(|_| {
            let category = pick_category(&mut rng);
            let templates = templates_for(category);
            let template = templates[rng.gen_range(0..templates.len())];

            FeedbackItem {
                id: Uuid::new_v4().to_string(),
                source: Source::ALL[rng.gen_range(0..Source::ALL.len())],
                created_at: now - rng.gen_range(0..86_400),
                raw_text: fill_slots(template, &mut rng),
                sentiment: None,
                urgency: None,
                category: None,
                cluster_id: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_100() {
        let total: u32 = CATEGORY_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_generate_count_and_validity() {
        let items = generate(40);
        assert_eq!(items.len(), 40);
        for item in &items {
            assert!(!item.raw_text.is_empty());
            assert!(item.sentiment.is_none());
            assert!(item.category.is_none());
        }
    }

    #[test]
    fn test_no_unresolved_slots() {
        // Every template for every category must substitute cleanly.
        let items = generate(200);
        for item in &items {
            assert!(
                !item.raw_text.contains('{') && !item.raw_text.contains('}'),
                "unresolved slot in: {}",
                item.raw_text
            );
        }
    }

    #[test]
    fn test_created_at_in_trailing_day() {
        let now = chrono::Utc::now().timestamp();
        for item in generate(50) {
            assert!(item.created_at <= now);
            assert!(item.created_at > now - 86_400 - 5);
        }
    }

    #[test]
    fn test_fill_slots_known_vocab() {
        let mut rng = rand::thread_rng();
        let filled = fill_slots("Please add {feature} to {product}", &mut rng);
        assert!(!filled.contains('{'));
        assert!(filled.starts_with("Please add "));
    }

    #[test]
    fn test_fill_slots_unknown_slot_terminates() {
        let mut rng = rand::thread_rng();
        let filled = fill_slots("hello {nonexistent} world", &mut rng);
        assert_eq!(filled, "hello  world");
    }
}
