//! Content-type classification by pattern scoring.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    News,
    Forum,
    Financial,
    Ecommerce,
    Blog,
    General,
    Unknown,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Forum => "forum",
            Self::Financial => "financial",
            Self::Ecommerce => "ecommerce",
            Self::Blog => "blog",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

static KIND_PATTERNS: Lazy<Vec<(ContentKind, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        (
            ContentKind::News,
            compile(&[
                r"\b(breaking|news|report|article|headline)\b",
                r"\b(published|updated|posted)\b",
                r"\b(journalist|reporter|correspondent)\b",
            ]),
        ),
        (
            ContentKind::Forum,
            compile(&[
                r"\b(post|thread|topic|discussion)\b",
                r"\b(reply|comment|user|member)\b",
                r"\b(forum|board|community)\b",
            ]),
        ),
        (
            ContentKind::Financial,
            compile(&[
                r"\b(stock|share|price|market|trading)\b",
                r"\b(earnings|revenue|profit|loss)\b",
                r"\b(investment|portfolio|dividend)\b",
            ]),
        ),
        (
            ContentKind::Ecommerce,
            compile(&[
                r"\b(price|buy|sell|product|shopping)\b",
                r"\b(cart|checkout|payment|shipping)\b",
                r"\b(review|rating|customer)\b",
            ]),
        ),
        (
            ContentKind::Blog,
            compile(&[
                r"\b(blog|post|author|published)\b",
                r"\b(opinion|thoughts|insights)\b",
                r"\b(categories|tags|archive)\b",
            ]),
        ),
    ]
});

/// Best-scoring content kind for the text, `General` when nothing matches.
pub fn detect_content_type(content: &str) -> ContentKind {
    if content.is_empty() {
        return ContentKind::Unknown;
    }

    let lower = content.to_lowercase();
    let mut best: Option<(ContentKind, usize)> = None;

    for (kind, patterns) in KIND_PATTERNS.iter() {
        let score: usize = patterns.iter().map(|re| re.find_iter(&lower).count()).sum();
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((*kind, score));
        }
    }

    best.map(|(kind, _)| kind).unwrap_or(ContentKind::General)
}

/// Confidence in [0, 1] for a detected kind: match density normalized per
/// hundred words.
pub fn type_confidence(content: &str, kind: ContentKind) -> f64 {
    if matches!(kind, ContentKind::General | ContentKind::Unknown) {
        return 0.0;
    }

    let patterns = KIND_PATTERNS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, p)| p);
    let Some(patterns) = patterns else {
        return 0.0;
    };

    let word_count = content.split_whitespace().count();
    if word_count == 0 {
        return 0.0;
    }

    let lower = content.to_lowercase();
    let total_matches: usize = patterns.iter().map(|re| re.find_iter(&lower).count()).sum();

    (total_matches as f64 / (word_count as f64 / 100.0)).min(1.0)
}
