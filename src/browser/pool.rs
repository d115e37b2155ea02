//! Shared browser process ownership.
//!
//! One long-lived browser is launched at startup; every session gets its own
//! isolated context (cookie jar + page) out of it. If the process dies, the
//! pool relaunches it for new sessions while existing sessions surface
//! errors on their next operation.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{ResourceType, ServiceConfig};

use super::cdp::CdpBrowser;
use super::{BrowserDriver, ContextOptions, PageDriver};

pub struct BrowserPool {
    driver: Mutex<Arc<dyn BrowserDriver>>,
    /// Present when the pool owns a real browser it can relaunch; absent for
    /// injected test drivers.
    relaunch_config: Option<ServiceConfig>,
}

impl BrowserPool {
    /// Launch the shared browser and wrap it in a pool.
    pub async fn launch(config: &ServiceConfig) -> Result<Self> {
        let browser = CdpBrowser::launch(config)
            .await
            .context("Failed to launch shared browser")?;
        info!("Browser pool started");
        Ok(Self {
            driver: Mutex::new(Arc::new(browser)),
            relaunch_config: Some(config.clone()),
        })
    }

    /// Build a pool over an injected driver (tests use the fake here).
    pub fn with_driver(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver: Mutex::new(driver),
            relaunch_config: None,
        }
    }

    /// Create an isolated context+page for a new session.
    ///
    /// Health-checks the process first; a dead browser is relaunched when
    /// the pool owns one, following the check-recover-reuse flow of a
    /// long-running service.
    pub async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn PageDriver>> {
        let mut guard = self.driver.lock().await;

        if !guard.healthy().await {
            match &self.relaunch_config {
                Some(config) => {
                    warn!("Browser health check failed, relaunching");
                    if let Err(e) = guard.close().await {
                        warn!("Failed to close dead browser: {e}");
                    }
                    let fresh = CdpBrowser::launch(config)
                        .await
                        .context("Failed to relaunch browser")?;
                    *guard = Arc::new(fresh);
                }
                None => return Err(anyhow!("browser process is not available")),
            }
        }

        guard.new_context(options).await
    }

    pub async fn healthy(&self) -> bool {
        self.driver.lock().await.healthy().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down browser pool");
        self.driver.lock().await.close().await
    }
}

/// URL glob patterns used to block a resource class at the network layer.
pub fn block_patterns_for(kinds: &[ResourceType]) -> Vec<String> {
    let mut patterns = Vec::new();
    for kind in kinds {
        let extensions: &[&str] = match kind {
            ResourceType::Image => &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"],
            ResourceType::Font => &["woff", "woff2", "ttf", "otf", "eot"],
            ResourceType::Stylesheet => &["css"],
            ResourceType::Script => &["js", "mjs"],
            ResourceType::Media => &["mp4", "webm", "ogg", "mp3", "wav", "m4a"],
            ResourceType::Other => &["swf", "flv"],
        };
        for ext in extensions {
            patterns.push(format!("*.{ext}"));
            patterns.push(format!("*.{ext}?*"));
        }
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_patterns_cover_each_kind() {
        let patterns = block_patterns_for(&[ResourceType::Image, ResourceType::Font]);
        assert!(patterns.iter().any(|p| p == "*.png"));
        assert!(patterns.iter().any(|p| p == "*.woff2"));
        assert!(!patterns.iter().any(|p| p == "*.css"));
    }

    #[tokio::test]
    async fn injected_driver_is_used_without_relaunch() {
        let fake = Arc::new(crate::browser::fake::FakeBrowser::new());
        fake.mark_unhealthy();
        let pool = BrowserPool::with_driver(fake);

        let options = ContextOptions {
            viewport: crate::config::Viewport {
                width: 1280,
                height: 720,
            },
            user_agent: "test".into(),
            javascript_enabled: true,
            ignore_https_errors: true,
        };
        assert!(pool.new_context(&options).await.is_err());
    }
}
