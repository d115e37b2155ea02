//! Content processing: cleaning, quality scoring, CAPTCHA heuristics, and
//! structured-field harvesting.
//!
//! These are pure functions over extracted text (the DOM probe in
//! [`detect_captcha`] being the one exception). The pattern sets are
//! heuristics, tuned freely; the invariants that matter are the
//! meaningfulness thresholds and that normalization is idempotent.

pub mod chunker;
mod dedup;
mod detect;

pub use chunker::{Chunk, ChunkSummary, chunk_content, summarize_chunks};
pub use dedup::Deduplicator;
pub use detect::{ContentKind, detect_content_type, type_confidence};

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::browser::PageDriver;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static NAV_TOKENS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Home|Login|Sign Up|Menu|Search|More|Categories|Topics|Latest|Hot)\b")
        .expect("valid regex")
});

static FOOTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:©|\b(?:Copyright|All rights reserved|Privacy Policy|Terms of Service)\b).*$",
    )
    .expect("valid regex")
});

static ELLIPSIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}").expect("valid regex"));

static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.!?])").expect("valid regex"));

static MEANINGFUL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(article|news|report|analysis|study|research|data|information)\b",
        r"(?i)\b(company|business|market|stock|investment|finance)\b",
        r"(?i)\b(price|value|growth|revenue|profit|earnings)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const CAPTCHA_PHRASES: &[&str] = &[
    "recaptcha",
    "hcaptcha",
    "cloudflare",
    "prove you are human",
    "i am not a robot",
    "verify you are human",
    "security challenge",
    "anti-bot",
    "bot detection",
    "access denied",
    "please complete the security check",
];

const CAPTCHA_SELECTORS: &[&str] = &[
    "iframe[src*=\"recaptcha\"]",
    "iframe[src*=\"hcaptcha\"]",
    "div[class*=\"captcha\"]",
    "div[id*=\"captcha\"]",
    "div[class*=\"recaptcha\"]",
    "div[id*=\"recaptcha\"]",
    "div[class*=\"hcaptcha\"]",
    "div[id*=\"hcaptcha\"]",
    "div[class*=\"cloudflare\"]",
    "div[id*=\"cloudflare\"]",
];

/// Normalize extracted text: strip boilerplate nav/footer tokens, collapse
/// whitespace, squeeze runaway punctuation. Applying it twice yields the
/// same output.
pub fn normalize(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let stripped = FOOTER_RE.replace_all(content, "");
    let stripped = NAV_TOKENS_RE.replace_all(&stripped, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    // Punctuation fixes run after collapsing and in this order; swapping
    // them can leave a dot run a second pass would squeeze differently.
    let fixed = SPACE_BEFORE_PUNCT_RE.replace_all(&collapsed, "$1");
    let squeezed = ELLIPSIS_RE.replace_all(&fixed, "...");

    squeezed.trim().to_string()
}

/// Quality metrics for a block of extracted text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub word_count: usize,
    pub line_count: usize,
    pub char_count: usize,
    pub quality_score: f64,
    pub has_meaningful_content: bool,
}

impl ContentMetrics {
    pub fn empty() -> Self {
        Self {
            word_count: 0,
            line_count: 0,
            char_count: 0,
            quality_score: 0.0,
            has_meaningful_content: false,
        }
    }
}

/// Score content on length, word density, vocabulary diversity, and
/// domain-term hits. "Meaningful" requires >100 chars, >10 words, and a
/// score above 0.3.
pub fn assess_quality(content: &str) -> ContentMetrics {
    if content.is_empty() {
        return ContentMetrics::empty();
    }

    let word_count = content.split_whitespace().count();
    let line_count = content.lines().count();
    let char_count = content.chars().count();

    let mut score: f64 = 0.0;

    if char_count > 500 {
        score += 0.3;
    } else if char_count > 100 {
        score += 0.1;
    }

    if word_count > 50 {
        score += 0.2;
    } else if word_count > 10 {
        score += 0.1;
    }

    let unique_words = content
        .to_lowercase()
        .split_whitespace()
        .collect::<std::collections::HashSet<_>>()
        .len();
    if unique_words > 20 {
        score += 0.2;
    } else if unique_words > 5 {
        score += 0.1;
    }

    let meaningful_hits: usize = MEANINGFUL_RES
        .iter()
        .map(|re| re.find_iter(content).count())
        .sum();
    if meaningful_hits > 0 {
        score += 0.3;
    }

    let quality_score = score.min(1.0);
    let has_meaningful_content = char_count > 100 && word_count > 10 && quality_score > 0.3;

    ContentMetrics {
        word_count,
        line_count,
        char_count,
        quality_score,
        has_meaningful_content,
    }
}

/// Content-only CAPTCHA heuristic: starved pages are suspect outright,
/// lowish pages only when a known challenge phrase appears.
pub fn captcha_from_text(content: &str) -> Option<String> {
    let metrics = assess_quality(content);
    if metrics.char_count < 500 {
        return Some(format!(
            "Insufficient content length: {} chars",
            metrics.char_count
        ));
    }
    if metrics.char_count < 1000 {
        let lower = content.to_lowercase();
        if CAPTCHA_PHRASES.iter().any(|p| lower.contains(p)) {
            return Some("CAPTCHA pattern found in low-content page".to_string());
        }
    }
    None
}

/// Full CAPTCHA detection: content heuristic plus a DOM probe for known
/// challenge widgets. Never errors; probe failures count as "not detected".
pub async fn detect_captcha(page: &dyn PageDriver, content: &str) -> (bool, String) {
    if let Some(reason) = captcha_from_text(content) {
        return (true, reason);
    }

    for selector in CAPTCHA_SELECTORS {
        match page.element_count(selector).await {
            Ok(count) if count > 0 => {
                return (true, format!("CAPTCHA element found: {selector}"));
            }
            _ => continue,
        }
    }

    (false, "No CAPTCHA detected".to_string())
}

// ---------------------------------------------------------------------------
// Structured extraction
// ---------------------------------------------------------------------------

static TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Z][^\n]+)$").expect("valid regex"));
static USER_MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_]+)").expect("valid regex"));
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b|\b\w+ \d{1,2}, \d{4}\b").expect("valid regex")
});
static STOCK_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("valid regex"));
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\d+\.?\d*|\d+\.?\d*\s*(?:USD|EUR|GBP)").expect("valid regex"));
static PERCENTAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*%").expect("valid regex"));

/// Harvested elements, shaped per content kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredElements {
    Forum {
        topics: Vec<String>,
        users: Vec<String>,
    },
    News {
        headlines: Vec<String>,
        dates: Vec<String>,
    },
    Financial {
        stock_symbols: Vec<String>,
        prices: Vec<String>,
        percentages: Vec<String>,
    },
    General {},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredData {
    pub content_type: String,
    pub metrics: ContentMetrics,
    pub extracted_elements: StructuredElements,
}

fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Regex-harvest typed elements from text for the given kind.
pub fn extract_structured(content: &str, kind: &str) -> StructuredData {
    let elements = match kind {
        "forum" => {
            let topics = TOPIC_RE
                .captures_iter(content)
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
                .filter(|t| t.len() > 10)
                .collect();
            let users = dedup_preserving_order(
                USER_MENTION_RE
                    .captures_iter(content)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string())),
            );
            StructuredElements::Forum { topics, users }
        }
        "news" => {
            let headlines = content
                .lines()
                .map(str::trim)
                .filter(|line| {
                    line.len() > 20
                        && line.len() < 200
                        && !line.starts_with("http")
                        && !line.starts_with("www")
                        && !line.starts_with('©')
                        && !line.starts_with("Copyright")
                })
                .take(10)
                .map(str::to_string)
                .collect();
            let dates = dedup_preserving_order(
                DATE_RE.find_iter(content).map(|m| m.as_str().to_string()),
            );
            StructuredElements::News { headlines, dates }
        }
        "financial" => StructuredElements::Financial {
            stock_symbols: dedup_preserving_order(
                STOCK_SYMBOL_RE
                    .find_iter(content)
                    .map(|m| m.as_str().to_string()),
            ),
            prices: dedup_preserving_order(
                PRICE_RE.find_iter(content).map(|m| m.as_str().to_string()),
            ),
            percentages: dedup_preserving_order(
                PERCENTAGE_RE
                    .find_iter(content)
                    .map(|m| m.as_str().to_string()),
            ),
        },
        _ => StructuredElements::General {},
    };

    StructuredData {
        content_type: kind.to_string(),
        metrics: assess_quality(content),
        extracted_elements: elements,
    }
}

/// TTL used by the service-level deduplicator when none is configured.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(3600);
