//! Durable per-site learned state.
//!
//! One sqlite file holds a row per site origin: session data, cookies,
//! access statistics, and the learned blobs (extraction patterns, timing,
//! characteristics, anti-detection rules, optimal selectors). Reads are
//! concurrent under WAL; every read-modify-write runs inside one writer
//! critical section so concurrent updates to an origin never lose fields.
//!
//! Store failures are logged by callers and never fail the owning
//! operation.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Current schema version, recorded in `schema_version` after migration.
pub const DB_VERSION: i64 = 2;

/// Performance metrics keep at most this many samples per timing series.
pub const MAX_PERF_SAMPLES: usize = 100;

/// EMA smoothing factor for the per-site success rate.
pub const SUCCESS_RATE_ALPHA: f64 = 0.1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS site_memory (
    site_url TEXT PRIMARY KEY,
    session_data TEXT NOT NULL DEFAULT '{}',
    cookies TEXT NOT NULL DEFAULT '[]',
    last_accessed REAL NOT NULL DEFAULT 0,
    access_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0,
    custom_data TEXT NOT NULL DEFAULT '{}',
    extraction_patterns TEXT NOT NULL DEFAULT '{}',
    performance_metrics TEXT NOT NULL DEFAULT '{}',
    timing_patterns TEXT NOT NULL DEFAULT '{}',
    site_characteristics TEXT NOT NULL DEFAULT '{}',
    anti_detection_rules TEXT NOT NULL DEFAULT '{}',
    optimal_selectors TEXT NOT NULL DEFAULT '{}',
    created_at REAL NOT NULL DEFAULT 0,
    updated_at REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_site_memory_last_accessed ON site_memory(last_accessed);
CREATE INDEX IF NOT EXISTS idx_site_memory_access_count ON site_memory(access_count);
CREATE INDEX IF NOT EXISTS idx_site_memory_success_rate ON site_memory(success_rate);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    migrated_at REAL NOT NULL DEFAULT 0
);
"#;

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// One site's learned record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMemory {
    pub site_url: String,
    pub session_data: Value,
    pub cookies: Value,
    pub last_accessed: f64,
    pub access_count: i64,
    pub success_rate: f64,
    pub custom_data: Value,
    pub extraction_patterns: Value,
    pub performance_metrics: Value,
    pub timing_patterns: Value,
    pub site_characteristics: Value,
    pub anti_detection_rules: Value,
    pub optimal_selectors: Value,
}

impl SiteMemory {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            session_data: empty_object(),
            cookies: Value::Array(Vec::new()),
            last_accessed: unix_now(),
            access_count: 0,
            success_rate: 0.0,
            custom_data: empty_object(),
            extraction_patterns: empty_object(),
            performance_metrics: empty_object(),
            timing_patterns: empty_object(),
            site_characteristics: empty_object(),
            anti_detection_rules: empty_object(),
            optimal_selectors: empty_object(),
        }
    }
}

/// A navigation's timing observation, folded into the rolling performance
/// windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfSample {
    pub load_time: Option<f64>,
    pub dom_ready_time: Option<f64>,
    pub response_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteMemoryStats {
    pub total_sites: i64,
    pub avg_success_rate: f64,
    pub avg_access_count: f64,
    pub most_recent_access: f64,
    pub total_accesses: i64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteSortBy {
    AccessCount,
    SuccessRate,
    LastAccessed,
}

impl SiteSortBy {
    fn column(self) -> &'static str {
        match self {
            Self::AccessCount => "access_count",
            Self::SuccessRate => "success_rate",
            Self::LastAccessed => "last_accessed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site_url: String,
    pub access_count: i64,
    pub success_rate: f64,
    pub last_accessed: f64,
}

pub struct SiteMemoryStore {
    pool: SqlitePool,
    ttl: Duration,
    /// Serializes read-modify-write update paths so two concurrent updates
    /// to one origin cannot interleave between read and write.
    writer: Mutex<()>,
}

impl SiteMemoryStore {
    /// Open (or create) the store at `db_path` and bring the schema up to
    /// the current version.
    pub async fn open(db_path: &Path, ttl: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create site memory data directory")?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to open site memory database")?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize site memory schema")?;

        let store = Self {
            pool,
            ttl,
            writer: Mutex::new(()),
        };
        store.migrate().await;

        info!("Site memory store opened at {}", db_path.display());
        Ok(store)
    }

    async fn schema_version(&self) -> i64 {
        sqlx::query("SELECT MAX(version) AS v FROM schema_version")
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .and_then(|row| row.try_get::<Option<i64>, _>("v").ok().flatten())
            .unwrap_or(0)
    }

    /// Best-effort migration: add columns introduced after v1, then record
    /// the version. A failure leaves the existing schema usable.
    async fn migrate(&self) {
        let current = self.schema_version().await;
        if current >= DB_VERSION {
            return;
        }

        if current < 2 {
            const V2_COLUMNS: &[(&str, &str)] = &[
                ("extraction_patterns", "TEXT NOT NULL DEFAULT '{}'"),
                ("performance_metrics", "TEXT NOT NULL DEFAULT '{}'"),
                ("timing_patterns", "TEXT NOT NULL DEFAULT '{}'"),
                ("site_characteristics", "TEXT NOT NULL DEFAULT '{}'"),
                ("anti_detection_rules", "TEXT NOT NULL DEFAULT '{}'"),
                ("optimal_selectors", "TEXT NOT NULL DEFAULT '{}'"),
                ("updated_at", "REAL NOT NULL DEFAULT 0"),
            ];
            for (name, definition) in V2_COLUMNS {
                let sql = format!("ALTER TABLE site_memory ADD COLUMN {name} {definition}");
                if let Err(e) = sqlx::query(&sql).execute(&self.pool).await {
                    let msg = e.to_string().to_lowercase();
                    if !msg.contains("duplicate column") {
                        warn!("Site memory migration step failed ({name}): {e}");
                    }
                }
            }
        }

        let result = sqlx::query(
            "INSERT OR REPLACE INTO schema_version (version, migrated_at) VALUES (?, ?)",
        )
        .bind(DB_VERSION)
        .bind(unix_now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => info!("Site memory schema migrated to version {DB_VERSION}"),
            Err(e) => warn!("Failed to record site memory schema version: {e}"),
        }
    }

    pub async fn get(&self, site_url: &str) -> Result<Option<SiteMemory>> {
        let row = sqlx::query(
            r"SELECT session_data, cookies, last_accessed, access_count, success_rate,
                     custom_data, extraction_patterns, performance_metrics, timing_patterns,
                     site_characteristics, anti_detection_rules, optimal_selectors
              FROM site_memory WHERE site_url = ?",
        )
        .bind(site_url)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query site memory")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let blob = |name: &str| -> Value {
            row.try_get::<String, _>(name)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_else(empty_object)
        };

        Ok(Some(SiteMemory {
            site_url: site_url.to_string(),
            session_data: blob("session_data"),
            cookies: blob("cookies"),
            last_accessed: row.try_get("last_accessed").unwrap_or(0.0),
            access_count: row.try_get("access_count").unwrap_or(0),
            success_rate: row.try_get("success_rate").unwrap_or(0.0),
            custom_data: blob("custom_data"),
            extraction_patterns: blob("extraction_patterns"),
            performance_metrics: blob("performance_metrics"),
            timing_patterns: blob("timing_patterns"),
            site_characteristics: blob("site_characteristics"),
            anti_detection_rules: blob("anti_detection_rules"),
            optimal_selectors: blob("optimal_selectors"),
        }))
    }

    /// Upsert a record. The original `created_at` is preserved across
    /// replaces; `updated_at` always advances.
    pub async fn put(&self, memory: &SiteMemory) -> Result<()> {
        let now = unix_now();
        let encode = |v: &Value| serde_json::to_string(v).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            r"INSERT OR REPLACE INTO site_memory
              (site_url, session_data, cookies, last_accessed, access_count, success_rate,
               custom_data, extraction_patterns, performance_metrics, timing_patterns,
               site_characteristics, anti_detection_rules, optimal_selectors, created_at, updated_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                      COALESCE((SELECT created_at FROM site_memory WHERE site_url = ?), ?), ?)",
        )
        .bind(&memory.site_url)
        .bind(encode(&memory.session_data))
        .bind(encode(&memory.cookies))
        .bind(if memory.last_accessed > 0.0 {
            memory.last_accessed
        } else {
            now
        })
        .bind(memory.access_count)
        .bind(memory.success_rate)
        .bind(encode(&memory.custom_data))
        .bind(encode(&memory.extraction_patterns))
        .bind(encode(&memory.performance_metrics))
        .bind(encode(&memory.timing_patterns))
        .bind(encode(&memory.site_characteristics))
        .bind(encode(&memory.anti_detection_rules))
        .bind(encode(&memory.optimal_selectors))
        .bind(&memory.site_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save site memory")?;

        debug!(site_url = %memory.site_url, "site memory saved");
        Ok(())
    }

    /// Record an access outcome: bump the counter, advance `last_accessed`,
    /// fold the outcome into the EMA success rate, and append any timing
    /// samples to their capped windows.
    pub async fn update_access(
        &self,
        site_url: &str,
        success: bool,
        perf: Option<PerfSample>,
    ) -> Result<()> {
        let _writer = self.writer.lock().await;

        let mut memory = self
            .get(site_url)
            .await?
            .unwrap_or_else(|| SiteMemory::new(site_url));

        memory.access_count += 1;
        memory.last_accessed = unix_now();

        let outcome = if success { 1.0 } else { 0.0 };
        memory.success_rate =
            (1.0 - SUCCESS_RATE_ALPHA) * memory.success_rate + SUCCESS_RATE_ALPHA * outcome;

        if let Some(perf) = perf {
            if !memory.performance_metrics.is_object() {
                memory.performance_metrics = empty_object();
            }
            let metrics = memory
                .performance_metrics
                .as_object_mut()
                .expect("normalized to an object above");
            for (key, value) in [
                ("load_time", perf.load_time),
                ("dom_ready_time", perf.dom_ready_time),
                ("response_time", perf.response_time),
            ] {
                let Some(value) = value else { continue };
                let samples = metrics
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(window) = samples.as_array_mut() {
                    window.push(json!(value));
                    if window.len() > MAX_PERF_SAMPLES {
                        let excess = window.len() - MAX_PERF_SAMPLES;
                        window.drain(..excess);
                    }
                    let avg = window
                        .iter()
                        .filter_map(Value::as_f64)
                        .sum::<f64>()
                        / window.len() as f64;
                    metrics.insert(format!("{key}_avg"), json!(avg));
                }
            }
        }

        self.put(&memory).await
    }

    async fn merge_blob(
        &self,
        site_url: &str,
        field: &str,
        updates: &Map<String, Value>,
    ) -> Result<()> {
        let _writer = self.writer.lock().await;

        let mut memory = self
            .get(site_url)
            .await?
            .unwrap_or_else(|| SiteMemory::new(site_url));

        let blob = match field {
            "extraction_patterns" => &mut memory.extraction_patterns,
            "timing_patterns" => &mut memory.timing_patterns,
            "optimal_selectors" => &mut memory.optimal_selectors,
            "site_characteristics" => &mut memory.site_characteristics,
            "anti_detection_rules" => &mut memory.anti_detection_rules,
            _ => &mut memory.custom_data,
        };
        if !blob.is_object() {
            *blob = empty_object();
        }
        let target = blob
            .as_object_mut()
            .expect("normalized to an object above");
        for (key, value) in updates {
            target.insert(key.clone(), value.clone());
        }

        self.put(&memory).await
    }

    pub async fn update_extraction_patterns(
        &self,
        site_url: &str,
        patterns: &Map<String, Value>,
    ) -> Result<()> {
        self.merge_blob(site_url, "extraction_patterns", patterns).await
    }

    pub async fn update_timing_patterns(
        &self,
        site_url: &str,
        timing: &Map<String, Value>,
    ) -> Result<()> {
        self.merge_blob(site_url, "timing_patterns", timing).await
    }

    pub async fn update_optimal_selectors(
        &self,
        site_url: &str,
        selectors: &Map<String, Value>,
    ) -> Result<()> {
        self.merge_blob(site_url, "optimal_selectors", selectors).await
    }

    pub async fn update_site_characteristics(
        &self,
        site_url: &str,
        characteristics: &Map<String, Value>,
    ) -> Result<()> {
        self.merge_blob(site_url, "site_characteristics", characteristics)
            .await
    }

    /// Remove rows whose last access is older than the TTL. Returns the
    /// number deleted.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let cutoff = unix_now() - self.ttl.as_secs_f64();
        let result = sqlx::query("DELETE FROM site_memory WHERE last_accessed < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to clean up expired site memories")?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("Cleaned up {deleted} expired site memories");
        }
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<SiteMemoryStats> {
        let row = sqlx::query(
            r"SELECT COUNT(*) AS total_sites,
                     COALESCE(AVG(success_rate), 0.0) AS avg_success_rate,
                     COALESCE(AVG(access_count), 0.0) AS avg_access_count,
                     COALESCE(MAX(last_accessed), 0.0) AS most_recent_access,
                     COALESCE(SUM(access_count), 0) AS total_accesses
              FROM site_memory",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to query site memory stats")?;

        Ok(SiteMemoryStats {
            total_sites: row.try_get("total_sites").unwrap_or(0),
            avg_success_rate: row.try_get("avg_success_rate").unwrap_or(0.0),
            avg_access_count: row.try_get("avg_access_count").unwrap_or(0.0),
            most_recent_access: row.try_get("most_recent_access").unwrap_or(0.0),
            total_accesses: row.try_get("total_accesses").unwrap_or(0),
            ttl_secs: self.ttl.as_secs(),
        })
    }

    /// Top sites by the given column. The sort key is a closed enum, so no
    /// caller-controlled SQL reaches the query string.
    pub async fn top(&self, limit: u32, sort_by: SiteSortBy) -> Result<Vec<SiteSummary>> {
        let sql = format!(
            "SELECT site_url, access_count, success_rate, last_accessed
             FROM site_memory ORDER BY {} DESC LIMIT ?",
            sort_by.column()
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query top sites")?;

        Ok(rows
            .into_iter()
            .map(|row| SiteSummary {
                site_url: row.try_get("site_url").unwrap_or_default(),
                access_count: row.try_get("access_count").unwrap_or(0),
                success_rate: row.try_get("success_rate").unwrap_or(0.0),
                last_accessed: row.try_get("last_accessed").unwrap_or(0.0),
            })
            .collect())
    }

    /// Sites whose extraction patterns contain `key` equal to `value`.
    pub async fn search_by_pattern(&self, key: &str, value: &Value) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT site_url, extraction_patterns FROM site_memory")
            .fetch_all(&self.pool)
            .await
            .context("Failed to scan extraction patterns")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let site_url: String = row.try_get("site_url").ok()?;
                let raw: String = row.try_get("extraction_patterns").ok()?;
                let patterns: Value = serde_json::from_str(&raw).ok()?;
                (patterns.get(key) == Some(value)).then_some(site_url)
            })
            .collect())
    }
}
