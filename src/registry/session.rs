//! Session record: one browser context + page, its configuration snapshot,
//! statistics counters, and the lock that serializes its operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::browser::PageDriver;
use crate::config::{SessionConfig, SessionLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Expired,
    Error,
}

impl SessionStatus {
    /// Expired and Error are terminal.
    fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Error)
    }
}

/// Which counter an operation outcome bumps.
#[derive(Debug, Clone)]
pub enum StatsEvent {
    Request,
    Navigate,
    Extract,
    Interact,
    Screenshot,
    Error(String),
}

/// Monotonic per-session counters. Every event also counts as a request.
#[derive(Debug, Default)]
pub struct SessionStats {
    requests: AtomicU64,
    pages_loaded: AtomicU64,
    screenshots: AtomicU64,
    interactions: AtomicU64,
    errors: AtomicU64,
    total_duration_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub requests: u64,
    pub pages_loaded: u64,
    pub screenshots: u64,
    pub interactions: u64,
    pub errors: u64,
    pub total_duration_secs: f64,
    pub last_error: Option<String>,
}

impl SessionStats {
    pub fn record(&self, event: &StatsEvent, duration: Option<Duration>) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match event {
            StatsEvent::Request | StatsEvent::Extract => {}
            StatsEvent::Navigate => {
                self.pages_loaded.fetch_add(1, Ordering::Relaxed);
            }
            StatsEvent::Interact => {
                self.interactions.fetch_add(1, Ordering::Relaxed);
            }
            StatsEvent::Screenshot => {
                self.screenshots.fetch_add(1, Ordering::Relaxed);
            }
            StatsEvent::Error(message) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(message.clone());
            }
        }
        if let Some(duration) = duration {
            self.total_duration_ms
                .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn pages_loaded(&self) -> u64 {
        self.pages_loaded.load(Ordering::Relaxed)
    }

    pub fn screenshots(&self) -> u64 {
        self.screenshots.load(Ordering::Relaxed)
    }

    pub fn interactions(&self) -> u64 {
        self.interactions.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            pages_loaded: self.pages_loaded.load(Ordering::Relaxed),
            screenshots: self.screenshots.load(Ordering::Relaxed),
            interactions: self.interactions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_duration_secs: self.total_duration_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            last_error: self.last_error.lock().clone(),
        }
    }
}

#[derive(Debug)]
struct SessionMeta {
    status: SessionStatus,
    last_activity: DateTime<Utc>,
    url: Option<String>,
    title: Option<String>,
}

/// Read-only projection of a session for `list`/`stats` callers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub owner: Option<String>,
    pub stats: SessionStatsSnapshot,
}

pub struct Session {
    pub id: String,
    pub config: SessionConfig,
    pub limits: SessionLimits,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    created_mono: Instant,
    meta: Mutex<SessionMeta>,
    pub stats: SessionStats,
    /// The serialization lock: operation executors hold this for the full
    /// duration of a request, so browser-level work on this page is never
    /// concurrent. `None` after the context has been released.
    page: tokio::sync::Mutex<Option<Box<dyn PageDriver>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("limits", &self.limits)
            .field("owner", &self.owner)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        id: String,
        config: SessionConfig,
        limits: SessionLimits,
        owner: Option<String>,
        page: Box<dyn PageDriver>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            config,
            limits,
            owner,
            created_at: now,
            created_mono: Instant::now(),
            meta: Mutex::new(SessionMeta {
                status: SessionStatus::Active,
                last_activity: now,
                url: None,
                title: None,
            }),
            stats: SessionStats::default(),
            page: tokio::sync::Mutex::new(Some(page)),
        }
    }

    /// TTL is measured against creation time, not last activity; a busy
    /// session still expires on schedule.
    pub fn age(&self) -> Duration {
        self.created_mono.elapsed()
    }

    pub fn status(&self) -> SessionStatus {
        self.meta.lock().status
    }

    /// Transition status. Terminal states are sticky.
    pub fn set_status(&self, status: SessionStatus) {
        let mut meta = self.meta.lock();
        if !meta.status.is_terminal() {
            meta.status = status;
        }
    }

    /// Bump last-activity; it never moves backwards.
    pub fn touch(&self) {
        let mut meta = self.meta.lock();
        let now = Utc::now();
        if now > meta.last_activity {
            meta.last_activity = now;
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.meta.lock().last_activity
    }

    pub fn set_location(&self, url: Option<String>, title: Option<String>) {
        let mut meta = self.meta.lock();
        meta.url = url;
        meta.title = title;
    }

    pub fn record_error(&self, message: &str) {
        self.stats.record(&StatsEvent::Error(message.to_string()), None);
    }

    /// Quota counters that have crossed their limits, by name.
    pub fn quota_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.age().as_secs() > self.limits.max_duration_secs {
            violations.push("max_duration".to_string());
        }
        if self.stats.requests() > self.limits.max_requests {
            violations.push("max_requests".to_string());
        }
        if self.stats.pages_loaded() > self.limits.max_pages {
            violations.push("max_pages".to_string());
        }
        if self.stats.screenshots() > self.limits.max_screenshots {
            violations.push("max_screenshots".to_string());
        }
        if self.stats.interactions() > self.limits.max_interactions {
            violations.push("max_interactions".to_string());
        }
        violations
    }

    /// Acquire the per-session operation lock. The guard dereferences to
    /// `None` once the context has been released; executors map that to
    /// `SessionNotFound`.
    pub async fn lock_page(
        &self,
    ) -> tokio::sync::MutexGuard<'_, Option<Box<dyn PageDriver>>> {
        self.page.lock().await
    }

    /// Release the browser context exactly once. Returns true when this
    /// call performed the release. Teardown failures are logged; the
    /// context handle is dropped either way.
    pub async fn close_page(&self) -> bool {
        let page = self.page.lock().await.take();
        match page {
            Some(page) => {
                if let Err(e) = page.close().await {
                    warn!(session_id = %self.id, "context teardown failed: {e}");
                }
                true
            }
            None => false,
        }
    }

    pub fn view(&self) -> SessionView {
        let meta = self.meta.lock();
        SessionView {
            session_id: self.id.clone(),
            status: meta.status,
            created_at: self.created_at,
            last_activity: meta.last_activity,
            url: meta.url.clone(),
            title: meta.title.clone(),
            owner: self.owner.clone(),
            stats: self.stats.snapshot(),
        }
    }
}
