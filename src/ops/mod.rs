//! Operation executors.
//!
//! Every executor follows the same frame: resolve the session through the
//! registry (which enforces TTL and quotas), hold the per-session lock for
//! the whole request, pace the request, act against the page, then record
//! the outcome into stats, site memory, the pacer, and the monitor.

mod batch;
mod extract;
mod interact;
mod navigate;
mod screenshot;
pub mod types;

pub use types::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;

use crate::config::{ServiceConfig, validate};
use crate::content::Deduplicator;
use crate::error::{Result, ServiceError};
use crate::humanize::MouseSettings;
use crate::monitor::ResourceMonitor;
use crate::pacer::AdaptivePacer;
use crate::registry::{Session, SessionRegistry, SessionStatus, StatsEvent};
use crate::site_memory::{PerfSample, SiteMemoryStore};

pub struct Operations {
    pub(crate) config: Arc<ServiceConfig>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) pacer: Arc<AdaptivePacer>,
    pub(crate) site_memory: Option<Arc<SiteMemoryStore>>,
    pub(crate) monitor: Arc<ResourceMonitor>,
    pub(crate) dedup: Arc<Deduplicator>,
    pub(crate) mouse: MouseSettings,
    /// Outcome of the previous operation; the pacer consumes it on the next
    /// wait, so failures slow the following request down.
    last_outcome: AtomicBool,
}

impl Operations {
    pub fn new(
        config: Arc<ServiceConfig>,
        registry: Arc<SessionRegistry>,
        pacer: Arc<AdaptivePacer>,
        site_memory: Option<Arc<SiteMemoryStore>>,
        monitor: Arc<ResourceMonitor>,
    ) -> Self {
        let dedup = Arc::new(Deduplicator::new(Duration::from_secs(
            config.content_deduplication_ttl_secs,
        )));
        let mouse = MouseSettings {
            bezier_points: config.mouse_movement_bezier_points,
            min_step_delay: config.mouse_movement_min_delay,
            max_step_delay: config.mouse_movement_max_delay,
            reaction_delay_min: config.mouse_movement_reaction_delay_min,
            reaction_delay_max: config.mouse_movement_reaction_delay_max,
        };
        Self {
            config,
            registry,
            pacer,
            site_memory,
            monitor,
            dedup,
            mouse,
            last_outcome: AtomicBool::new(true),
        }
    }

    /// Sleep the adaptive delay, feeding the pacer the previous outcome.
    pub(crate) async fn pace(&self) {
        if self.config.enable_adaptive_rate_limiting {
            let previous = self.last_outcome.load(Ordering::Relaxed);
            self.pacer.wait(previous).await;
        }
    }

    pub(crate) fn set_outcome(&self, success: bool) {
        self.last_outcome.store(success, Ordering::Relaxed);
    }

    /// Resolve an explicit timeout (validating its bounds) or fall back to
    /// the session default.
    pub(crate) fn resolve_timeout(
        &self,
        requested: Option<u64>,
        session: &Session,
    ) -> Result<Duration> {
        match requested {
            Some(timeout_ms) => {
                validate::validate_timeout(timeout_ms)?;
                Ok(Duration::from_millis(timeout_ms))
            }
            None => Ok(session.config.timeout()),
        }
    }

    /// Record an operation outcome into session stats and the monitor.
    pub(crate) async fn record_outcome(
        &self,
        session: &Session,
        event: StatsEvent,
        duration: Option<Duration>,
        success: bool,
    ) {
        session.stats.record(&event, duration);
        let response_time = duration.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        self.monitor
            .record(&session.id, success, response_time, 0.0, 0.0);
        self.set_outcome(success);

        // A failed operation on a dead browser means the context is gone for
        // good; flip the session into its terminal error state.
        if !success && !self.registry.browser_healthy().await {
            session.set_status(SessionStatus::Error);
        }
    }

    /// Fold an access outcome into site memory; failures are logged and
    /// never surface.
    pub(crate) async fn record_site_access(
        &self,
        origin: &str,
        success: bool,
        perf: Option<PerfSample>,
    ) {
        if !self.config.enable_site_memory {
            return;
        }
        if let Some(store) = &self.site_memory
            && let Err(e) = store.update_access(origin, success, perf).await
        {
            warn!(origin, "site memory update failed: {e}");
        }
    }

    /// Map a missing page handle (session closed mid-wait) to the error a
    /// cancelled waiter sees.
    pub(crate) fn require_page<'a>(
        session_id: &str,
        guard: &'a tokio::sync::MutexGuard<'_, Option<Box<dyn crate::browser::PageDriver>>>,
    ) -> Result<&'a dyn crate::browser::PageDriver> {
        guard
            .as_deref()
            .ok_or_else(|| ServiceError::session_not_found(session_id))
    }
}
