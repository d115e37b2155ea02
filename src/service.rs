//! Application container.
//!
//! All service state is constructed here at startup and wired through
//! explicit handles; nothing lives in hidden module globals. The methods on
//! [`PagePilot`] are the core API the transport layer maps onto.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::browser::pool::BrowserPool;
use crate::browser::BrowserDriver;
use crate::config::{ServiceConfig, SessionOptions};
use crate::error::{Result, ServiceError};
use crate::monitor::{MonitorSummary, ResourceMonitor};
use crate::ops::{
    BatchRequest, BatchResult, CaptchaDetectionResult, ExtractRequest, ExtractResult,
    InteractRequest, InteractResult, NavigateRequest, NavigateResult, Operations,
    ScreenshotRequest, ScreenshotResult, StructuredExtractResult,
};
use crate::pacer::{AdaptivePacer, PacerSettings, PacerStats};
use crate::registry::{SessionRegistry, SessionView};
use crate::site_memory::SiteMemoryStore;

pub struct PagePilot {
    config: Arc<ServiceConfig>,
    pool: Arc<BrowserPool>,
    registry: Arc<SessionRegistry>,
    pacer: Arc<AdaptivePacer>,
    site_memory: Option<Arc<SiteMemoryStore>>,
    monitor: Arc<ResourceMonitor>,
    ops: Operations,
}

impl PagePilot {
    /// Launch the shared browser and assemble the service.
    pub async fn start(config: ServiceConfig) -> Result<Self> {
        let pool = BrowserPool::launch(&config)
            .await
            .map_err(|e| ServiceError::configuration("browser", e.to_string()))?;
        Self::build(config, Arc::new(pool)).await
    }

    /// Assemble the service over an injected browser driver. Tests use this
    /// with the in-memory fake.
    pub async fn with_driver(
        config: ServiceConfig,
        driver: Arc<dyn BrowserDriver>,
    ) -> Result<Self> {
        let pool = Arc::new(BrowserPool::with_driver(driver));
        Self::build(config, pool).await
    }

    async fn build(config: ServiceConfig, pool: Arc<BrowserPool>) -> Result<Self> {
        let config = Arc::new(config);

        let site_memory = if config.enable_site_memory {
            let store = SiteMemoryStore::open(
                &config.site_memory_db_path(),
                Duration::from_secs(config.site_memory_ttl_secs),
            )
            .await
            .map_err(|e| ServiceError::configuration("site_memory", e.to_string()))?;
            Some(Arc::new(store))
        } else {
            None
        };

        if let Some(store) = &site_memory
            && let Err(e) = store.cleanup_expired().await
        {
            warn!("initial site memory cleanup failed: {e}");
        }

        let pacer = Arc::new(AdaptivePacer::new(PacerSettings::from_config(&config)));
        let monitor = ResourceMonitor::new();
        monitor.start(Duration::from_secs(config.monitor_interval_secs));

        let registry = SessionRegistry::new(Arc::clone(&config), Arc::clone(&pool));
        registry.start_reaper();

        let ops = Operations::new(
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&pacer),
            site_memory.clone(),
            Arc::clone(&monitor),
        );

        info!("service container assembled");
        Ok(Self {
            config,
            pool,
            registry,
            pacer,
            site_memory,
            monitor,
            ops,
        })
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    pub async fn create_session(
        &self,
        options: SessionOptions,
        owner: Option<String>,
    ) -> Result<SessionView> {
        let session = self.registry.create(options, owner).await?;
        Ok(session.view())
    }

    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        self.monitor.remove_session(session_id);
        self.registry.close(session_id).await
    }

    /// Validated lookup; bumps last-activity.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionView> {
        let session = self.registry.get(session_id).await?;
        Ok(session.view())
    }

    pub async fn list_sessions(&self, owner: Option<&str>) -> Vec<SessionView> {
        self.registry.list(owner).await
    }

    pub async fn session_stats(&self, session_id: &str) -> Result<SessionView> {
        self.registry.stats(session_id).await
    }

    pub async fn active_session_count(&self) -> usize {
        self.registry.active_count().await
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub async fn navigate(
        &self,
        session_id: &str,
        request: NavigateRequest,
    ) -> Result<NavigateResult> {
        self.ops.navigate(session_id, request).await
    }

    pub async fn extract(
        &self,
        session_id: &str,
        request: ExtractRequest,
    ) -> Result<ExtractResult> {
        self.ops.extract(session_id, request).await
    }

    pub async fn extract_structured(
        &self,
        session_id: &str,
        content_type: Option<String>,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Result<StructuredExtractResult> {
        self.ops
            .extract_structured(session_id, content_type, selector, timeout_ms)
            .await
    }

    pub async fn detect_captcha(
        &self,
        session_id: &str,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    ) -> Result<CaptchaDetectionResult> {
        self.ops.detect_captcha(session_id, selector, timeout_ms).await
    }

    pub async fn interact(
        &self,
        session_id: &str,
        request: InteractRequest,
    ) -> Result<InteractResult> {
        self.ops.interact(session_id, request).await
    }

    pub async fn screenshot(
        &self,
        session_id: &str,
        request: ScreenshotRequest,
    ) -> Result<ScreenshotResult> {
        self.ops.screenshot(session_id, request).await
    }

    pub async fn batch(&self, session_id: &str, request: BatchRequest) -> Result<BatchResult> {
        self.ops.batch(session_id, request).await
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pacer_stats(&self) -> PacerStats {
        self.pacer.stats()
    }

    pub fn monitor_summary(&self) -> MonitorSummary {
        self.monitor.summary()
    }

    pub fn site_memory(&self) -> Option<&Arc<SiteMemoryStore>> {
        self.site_memory.as_ref()
    }

    /// Fan out cancellation, close every session, then take the browser
    /// down.
    pub async fn shutdown(&self) {
        info!("service shutting down");
        self.monitor.stop();
        self.registry.shutdown().await;
        if let Err(e) = self.pool.shutdown().await {
            warn!("browser pool shutdown failed: {e}");
        }
        info!("service shutdown complete");
    }
}
