//! Session registry: admission control, lookup with TTL/quota validation,
//! idempotent teardown, and the background reaper.
//!
//! The whole create sequence runs under the registry lock so the active
//! count can never race past the configured cap. Context release happens
//! exactly once per session regardless of which path (close, reaper, get
//! validation, shutdown) triggers it.

mod session;

pub use session::{
    Session, SessionStats, SessionStatsSnapshot, SessionStatus, SessionView, StatsEvent,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::browser::pool::{BrowserPool, block_patterns_for};
use crate::browser::ContextOptions;
use crate::config::{ServiceConfig, SessionConfig, SessionLimits, SessionOptions, validate};
use crate::error::{Result, ServiceError};
use crate::stealth;

pub struct SessionRegistry {
    config: Arc<ServiceConfig>,
    pool: Arc<BrowserPool>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    reaper: SyncMutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl SessionRegistry {
    pub fn new(config: Arc<ServiceConfig>, pool: Arc<BrowserPool>) -> Arc<Self> {
        Arc::new(Self {
            config,
            pool,
            sessions: Mutex::new(HashMap::new()),
            reaper: SyncMutex::new(None),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Start the TTL reaper.
    pub fn start_reaper(self: &Arc<Self>) {
        let registry = Arc::clone(self);
        let interval = Duration::from_secs(self.config.session_cleanup_interval_secs);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if registry.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                registry.reap_expired().await;
            }
            debug!("session reaper exiting");
        });
        *self.reaper.lock() = Some(handle);
    }

    /// Admit a new session. Fails with `ResourceLimit` at the cap; the
    /// whole sequence (count check, context creation, stealth init,
    /// registration) is atomic with respect to other creates.
    pub async fn create(
        &self,
        options: SessionOptions,
        owner: Option<String>,
    ) -> Result<Arc<Session>> {
        options.validate()?;

        let mut sessions = self.sessions.lock().await;

        if sessions.len() >= self.config.max_sessions {
            return Err(ServiceError::resource_limit(
                "sessions",
                self.config.max_sessions as u64,
                sessions.len() as u64,
            ));
        }

        let session_id = format!(
            "sess_{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );

        let profile = stealth::random_profile();
        let session_config = SessionConfig::resolve(&self.config, &options, &profile.user_agent);

        let context_options = ContextOptions {
            viewport: session_config.viewport,
            user_agent: session_config.user_agent.clone(),
            javascript_enabled: session_config.javascript_enabled,
            ignore_https_errors: session_config.ignore_https_errors,
        };
        let page = self
            .pool
            .new_context(&context_options)
            .await
            .map_err(|e| ServiceError::browser("create_session", e))?;

        if session_config.stealth {
            if let Err(e) = stealth::inject(page.as_ref(), &profile).await {
                let _ = page.close().await;
                return Err(ServiceError::browser("create_session", e));
            }
        }

        if !session_config.block_resources.is_empty() {
            let patterns = block_patterns_for(&session_config.block_resources);
            if let Err(e) = page.block_url_patterns(&patterns).await {
                warn!(session_id, "failed to install resource blocking: {e}");
            }
        }

        let session = Arc::new(Session::new(
            session_id.clone(),
            session_config,
            SessionLimits::default(),
            owner.clone(),
            page,
        ));
        sessions.insert(session_id.clone(), Arc::clone(&session));

        info!(session_id, ?owner, "session created");
        Ok(session)
    }

    /// Resolve a session id. Expired or quota-exhausted sessions are closed
    /// and removed before the error returns; a successful lookup bumps
    /// last-activity.
    pub async fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        validate::validate_session_id(session_id)?;

        let session = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| ServiceError::session_not_found(session_id))?
        };

        if session.age() > self.config.session_ttl() {
            session.set_status(SessionStatus::Expired);
            self.remove_and_close(session_id).await;
            return Err(ServiceError::invalid_session(session_id, "Session expired"));
        }

        let violations = session.quota_violations();
        if !violations.is_empty() {
            session.set_status(SessionStatus::Expired);
            self.remove_and_close(session_id).await;
            return Err(ServiceError::invalid_session(
                session_id,
                format!("Session limits exceeded: {}", violations.join(", ")),
            ));
        }

        session.touch();
        Ok(session)
    }

    /// Close a session: remove the record, then release its context. The
    /// record is removed even when teardown fails. A second close reports
    /// `SessionNotFound`.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        validate::validate_session_id(session_id)?;

        let session = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .remove(session_id)
                .ok_or_else(|| ServiceError::session_not_found(session_id))?
        };

        session.close_page().await;
        info!(session_id, "session closed");
        Ok(())
    }

    /// Remove and tear down without surfacing errors (validation and reaper
    /// paths).
    async fn remove_and_close(&self, session_id: &str) {
        let session = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(session_id)
        };
        if let Some(session) = session {
            session.close_page().await;
        }
    }

    /// Increment counters for an operation outcome. Silent no-op when the
    /// session is gone.
    pub async fn update_stats(
        &self,
        session_id: &str,
        event: StatsEvent,
        duration: Option<Duration>,
    ) {
        let session = {
            let sessions = self.sessions.lock().await;
            sessions.get(session_id).cloned()
        };
        if let Some(session) = session {
            session.stats.record(&event, duration);
        }
    }

    pub async fn list(&self, owner: Option<&str>) -> Vec<SessionView> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|session| match owner {
                Some(owner) => session.owner.as_deref() == Some(owner),
                None => true,
            })
            .map(|session| session.view())
            .collect()
    }

    /// Validated stats projection for one session.
    pub async fn stats(&self, session_id: &str) -> Result<SessionView> {
        let session = self.get(session_id).await?;
        Ok(session.view())
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Liveness of the shared browser process.
    pub async fn browser_healthy(&self) -> bool {
        self.pool.healthy().await
    }

    /// One reaper pass: collect ids past TTL under the registry lock, then
    /// close them outside it so in-flight operations are not blocked behind
    /// the scan.
    pub async fn reap_expired(&self) {
        let ttl = self.config.session_ttl();
        let expired: Vec<String> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, session)| session.age() > ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };

        for session_id in expired {
            info!(session_id, "reaping expired session");
            self.remove_and_close(&session_id).await;
        }
    }

    /// Cancel the reaper and close every session.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reaper.lock().take() {
            handle.abort();
        }

        let all: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in all {
            if !session.close_page().await {
                continue;
            }
            debug!(session_id = %session.id, "session closed during shutdown");
        }
        info!("session registry shut down");
    }

    /// Flag every live session as errored; used when the browser process
    /// dies underneath them.
    pub async fn poison_all(&self, reason: &str) {
        let sessions = self.sessions.lock().await;
        for session in sessions.values() {
            session.set_status(SessionStatus::Error);
            session.record_error(reason);
        }
        if !sessions.is_empty() {
            error!("marked {} sessions as errored: {reason}", sessions.len());
        }
    }
}
