//! Screenshot executor.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::{debug, info};

use crate::browser::{ImageFormat, PageDriver, WaitUntil};
use crate::config::validate;
use crate::error::{Result, ServiceError};
use crate::registry::StatsEvent;

use super::types::{ScreenshotRequest, ScreenshotResult};
use super::Operations;

/// Soft cap for the network-idle wait before capture.
const DYNAMIC_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Soft cap for the image-completeness wait.
const IMAGE_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Proceed once at least half the images have finished loading.
const IMAGES_COMPLETE_JS: &str = r"(() => {
    const images = document.querySelectorAll('img');
    let loaded = 0;
    images.forEach(img => {
        if (img.complete && img.naturalHeight > 0) loaded++;
    });
    return images.length === 0 || loaded / images.length > 0.5;
})()";

impl Operations {
    pub async fn screenshot(
        &self,
        session_id: &str,
        request: ScreenshotRequest,
    ) -> Result<ScreenshotResult> {
        if let Some(selector) = &request.selector {
            validate::validate_selector(selector)?;
        }
        if let Some(quality) = request.quality {
            validate::validate_quality(quality)?;
        }

        let session = self.registry.get(session_id).await?;
        let timeout = self.resolve_timeout(request.timeout_ms, &session)?;

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        self.pace().await;
        let start = Instant::now();

        if request.wait_for_dynamic {
            if let Err(e) = page
                .wait_for_state(WaitUntil::NetworkIdle, DYNAMIC_IDLE_TIMEOUT)
                .await
            {
                debug!(session_id, "network idle wait gave up: {e}");
            }
            self.wait_for_images(page).await;
        }

        // Small pause so captures do not land at mechanical intervals.
        let jitter = rand::rng().random_range(0.2..=0.8);
        tokio::time::sleep(Duration::from_secs_f64(jitter)).await;

        let path = match &request.path {
            Some(path) => PathBuf::from(path),
            None => {
                let unix = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                self.config
                    .screenshots_dir
                    .join(format!("{session_id}_{unix}.png"))
            }
        };

        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        let (format, quality) = if is_jpeg {
            (ImageFormat::Jpeg, request.quality.or(Some(80)))
        } else {
            (ImageFormat::Png, None)
        };

        let capture = async {
            if let Some(selector) = request.selector.as_deref() {
                page.wait_for_visible(selector, timeout).await?;
            }
            page.screenshot(
                request.selector.as_deref(),
                request.full_page,
                format,
                quality,
            )
            .await
        }
        .await;

        drop(guard);

        let bytes = match capture {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_outcome(
                    &session,
                    StatsEvent::Error(format!("screenshot: {e}")),
                    Some(start.elapsed()),
                    false,
                )
                .await;
                return Err(ServiceError::browser("screenshot", e));
            }
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::browser("screenshot", e))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ServiceError::browser("screenshot", e))?;

        self.record_outcome(&session, StatsEvent::Screenshot, Some(start.elapsed()), true)
            .await;

        let result = ScreenshotResult {
            path: path.to_string_lossy().into_owned(),
            selector: request.selector,
            full_page: request.full_page,
            size_bytes: bytes.len() as u64,
            success: true,
            dynamic_content_waited: request.wait_for_dynamic,
        };
        info!(
            session_id,
            path = %result.path,
            size_bytes = result.size_bytes,
            "screenshot captured"
        );
        Ok(result)
    }

    /// Poll the image-completeness probe until it passes or the soft window
    /// runs out. An unreadable probe result ends the wait early.
    async fn wait_for_images(&self, page: &dyn PageDriver) {
        let deadline = Instant::now() + IMAGE_WAIT_TIMEOUT;
        loop {
            match page.evaluate(IMAGES_COMPLETE_JS).await {
                Ok(value) => match value.as_bool() {
                    Some(true) | None => return,
                    Some(false) => {}
                },
                Err(_) => return,
            }
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}
