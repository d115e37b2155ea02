//! Semantic chunking: split text at detected structural boundaries into
//! size-bounded pieces, preferring the boundary kinds a content type is
//! known for.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::detect::ContentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Paragraph,
    Sentence,
    Heading,
    ListItem,
    Quote,
    TableRow,
    /// Tail content after the last accepted boundary.
    Remaining,
    /// Produced when an oversized run is split at sentence edges.
    Split,
}

fn boundary_pattern(kind: BoundaryKind) -> Option<&'static Regex> {
    static PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
    static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));
    static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*#{1,6}\s+").expect("valid regex"));
    static LIST_ITEM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\n\s*[-*•]\s+").expect("valid regex"));
    static QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*>\s+").expect("valid regex"));
    static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\|.*\|").expect("valid regex"));

    match kind {
        BoundaryKind::Paragraph => Some(&PARAGRAPH),
        BoundaryKind::Sentence => Some(&SENTENCE),
        BoundaryKind::Heading => Some(&HEADING),
        BoundaryKind::ListItem => Some(&LIST_ITEM),
        BoundaryKind::Quote => Some(&QUOTE),
        BoundaryKind::TableRow => Some(&TABLE_ROW),
        BoundaryKind::Remaining | BoundaryKind::Split => None,
    }
}

/// Per-content-kind chunking rules.
#[derive(Debug, Clone)]
struct ChunkRules {
    min_size: usize,
    max_size: usize,
    preferred_boundaries: &'static [BoundaryKind],
}

fn rules_for(kind: ContentKind) -> ChunkRules {
    use BoundaryKind::*;
    match kind {
        ContentKind::News => ChunkRules {
            min_size: 100,
            max_size: 1000,
            preferred_boundaries: &[Paragraph, Sentence],
        },
        ContentKind::Forum => ChunkRules {
            min_size: 50,
            max_size: 500,
            preferred_boundaries: &[Paragraph, ListItem],
        },
        ContentKind::Financial => ChunkRules {
            min_size: 200,
            max_size: 800,
            preferred_boundaries: &[Paragraph, Sentence, TableRow],
        },
        ContentKind::Blog => ChunkRules {
            min_size: 150,
            max_size: 1200,
            preferred_boundaries: &[Paragraph, Heading, Quote],
        },
        _ => ChunkRules {
            min_size: 100,
            max_size: 1000,
            preferred_boundaries: &[Paragraph, Sentence],
        },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub size: usize,
    pub word_count: usize,
    pub is_split: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub chunk_type: BoundaryKind,
    pub start_index: usize,
    pub end_index: usize,
    pub confidence: f64,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub total_chunks: usize,
    pub total_content_length: usize,
    pub average_chunk_length: f64,
}

struct Boundary {
    position: usize,
    kind: BoundaryKind,
    confidence: f64,
}

/// Confidence for a boundary at `position`: base 0.5 plus the boundary
/// kind's weight, content density on both sides, and sentence punctuation
/// in the surrounding window.
fn boundary_confidence(content: &str, position: usize, kind: BoundaryKind) -> f64 {
    let mut confidence: f64 = 0.5;

    confidence += match kind {
        BoundaryKind::Heading => 0.4,
        BoundaryKind::Paragraph => 0.3,
        BoundaryKind::Sentence => 0.2,
        BoundaryKind::ListItem | BoundaryKind::Quote | BoundaryKind::TableRow => 0.2,
        BoundaryKind::Remaining | BoundaryKind::Split => 0.0,
    };

    let words_before = content[..position].split_whitespace().count();
    let words_after = content[position..].split_whitespace().count();
    if words_before > 10 && words_after > 10 {
        confidence += 0.1;
    }

    let window_start = floor_char_boundary(content, position.saturating_sub(50));
    let window_end = floor_char_boundary(content, (position + 50).min(content.len()));
    let window = &content[window_start..window_end];
    if window.contains(['.', '!', '?']) {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

fn find_boundaries(content: &str, rules: &ChunkRules) -> Vec<Boundary> {
    let mut boundaries: Vec<Boundary> = rules
        .preferred_boundaries
        .iter()
        .filter_map(|kind| boundary_pattern(*kind).map(|re| (*kind, re)))
        .flat_map(|(kind, re)| {
            re.find_iter(content)
                .map(move |m| (kind, m.start()))
                .collect::<Vec<_>>()
        })
        .map(|(kind, position)| Boundary {
            position,
            kind,
            confidence: boundary_confidence(content, position, kind),
        })
        .collect();

    boundaries.sort_by_key(|b| b.position);
    boundaries
}

/// Largest index `<= at` that is a char boundary.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut at = at.min(s.len());
    while at > 0 && !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

fn make_chunk(
    content: &str,
    kind: BoundaryKind,
    start: usize,
    end: usize,
    confidence: f64,
    is_split: bool,
) -> Chunk {
    Chunk {
        content: content.to_string(),
        chunk_type: kind,
        start_index: start,
        end_index: end,
        confidence,
        metadata: ChunkMetadata {
            size: content.len(),
            word_count: content.split_whitespace().count(),
            is_split,
        },
    }
}

/// Split an oversized run at sentence edges, never producing pieces below
/// the minimum size or above the maximum.
fn split_large_run(content: &str, start_index: usize, rules: &ChunkRules) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = 0usize;

    while current < content.len() {
        let hard_end = floor_char_boundary(content, (current + rules.max_size).min(content.len()));
        let floor = current + rules.max_size / 2;

        // Prefer ending on sentence punctuation inside the upper half of the
        // window.
        let mut best_split = hard_end;
        let bytes = content.as_bytes();
        let mut i = hard_end;
        while i > floor.min(hard_end) {
            i -= 1;
            if matches!(bytes.get(i), Some(b'.') | Some(b'!') | Some(b'?')) {
                best_split = i + 1;
                break;
            }
        }
        let best_split = floor_char_boundary(content, best_split).max(current + 1);

        let piece = content[current..best_split].trim();
        if piece.len() >= rules.min_size {
            chunks.push(make_chunk(
                piece,
                BoundaryKind::Split,
                start_index + current,
                start_index + best_split,
                0.6,
                true,
            ));
        }
        current = best_split;
    }

    chunks
}

/// Chunk text along detected semantic boundaries. Boundaries below the
/// confidence threshold are skipped; undersized fragments merge forward;
/// oversized runs are split at sentence edges.
pub fn chunk_content(content: &str, kind: ContentKind, confidence_threshold: f64) -> Vec<Chunk> {
    if content.is_empty() {
        return Vec::new();
    }

    let rules = rules_for(kind);
    let boundaries = find_boundaries(content, &rules);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    for boundary in &boundaries {
        if boundary.confidence < confidence_threshold {
            continue;
        }
        if boundary.position <= start {
            continue;
        }

        let piece = content[start..boundary.position].trim();
        if piece.len() < rules.min_size {
            continue;
        }

        if piece.len() > rules.max_size {
            chunks.extend(split_large_run(piece, start, &rules));
        } else {
            chunks.push(make_chunk(
                piece,
                boundary.kind,
                start,
                boundary.position,
                boundary.confidence,
                false,
            ));
        }
        start = boundary.position;
    }

    if start < content.len() {
        let tail = content[start..].trim();
        if tail.len() >= rules.min_size {
            if tail.len() > rules.max_size {
                chunks.extend(split_large_run(tail, start, &rules));
            } else {
                chunks.push(make_chunk(
                    tail,
                    BoundaryKind::Remaining,
                    start,
                    content.len(),
                    0.5,
                    false,
                ));
            }
        }
    }

    chunks
}

pub fn summarize_chunks(chunks: &[Chunk]) -> ChunkSummary {
    let total_length: usize = chunks.iter().map(|c| c.metadata.size).sum();
    ChunkSummary {
        total_chunks: chunks.len(),
        total_content_length: total_length,
        average_chunk_length: if chunks.is_empty() {
            0.0
        } else {
            total_length as f64 / chunks.len() as f64
        },
    }
}
