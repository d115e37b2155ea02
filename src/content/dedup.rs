//! Time-bounded content deduplication.
//!
//! Fingerprints are xxh3 digests of whitespace-collapsed, lowercased text,
//! kept in a concurrent map with a TTL. Seeing the same fingerprint twice
//! within the TTL marks the second occurrence as a duplicate.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

static COLLAPSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DedupStats {
    pub tracked_fingerprints: usize,
    pub ttl_secs: u64,
}

pub struct Deduplicator {
    fingerprints: DashMap<u64, Instant>,
    ttl: Duration,
}

impl Deduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            fingerprints: DashMap::new(),
            ttl,
        }
    }

    fn fingerprint(content: &str) -> u64 {
        let normalized = COLLAPSE_RE
            .replace_all(content.trim(), " ")
            .to_lowercase();
        xxh3_64(normalized.as_bytes())
    }

    /// Returns true when the content was already seen within the TTL.
    /// Fresh content is recorded as a side effect.
    pub fn is_duplicate(&self, content: &str) -> bool {
        let now = Instant::now();
        self.purge_expired(now);

        let key = Self::fingerprint(content);
        if self.fingerprints.contains_key(&key) {
            return true;
        }
        self.fingerprints.insert(key, now);
        false
    }

    fn purge_expired(&self, now: Instant) {
        self.fingerprints
            .retain(|_, seen_at| now.duration_since(*seen_at) <= self.ttl);
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            tracked_fingerprints: self.fingerprints.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
