//! Navigation executor.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::validate;
use crate::error::{Result, ServiceError};
use crate::humanize;
use crate::registry::StatsEvent;
use crate::site_memory::PerfSample;

use super::types::{NavigateRequest, NavigateResult};
use super::Operations;

/// Initial attempt plus up to this many retries with 1s/2s/4s backoff.
const MAX_NAVIGATION_RETRIES: u32 = 3;

/// Cap on the soft post-navigation DOMContentLoaded wait.
const CONTENT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

impl Operations {
    pub async fn navigate(
        &self,
        session_id: &str,
        request: NavigateRequest,
    ) -> Result<NavigateResult> {
        let url = validate::validate_url(&request.url, self.config.max_url_length)?;
        let origin = validate::site_origin(&url);

        let session = self.registry.get(session_id).await?;
        let timeout = self
            .resolve_timeout(request.timeout_ms, &session)?
            .min(Duration::from_millis(self.config.max_page_load_timeout_ms));

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        self.pace().await;

        let site_memory_loaded = match (&self.site_memory, self.config.enable_site_memory) {
            (Some(store), true) => match store.get(&origin).await {
                Ok(memory) => {
                    if let Some(memory) = &memory {
                        debug!(origin, access_count = memory.access_count, "site memory loaded");
                    }
                    memory.is_some()
                }
                Err(e) => {
                    warn!(origin, "site memory read failed: {e}");
                    false
                }
            },
            _ => false,
        };

        let start = Instant::now();

        let mut navigation = Ok(());
        for attempt in 0..=MAX_NAVIGATION_RETRIES {
            navigation = page.goto(url.as_str(), request.wait_until, timeout).await;
            match &navigation {
                Ok(()) => break,
                Err(e) if attempt < MAX_NAVIGATION_RETRIES => {
                    warn!(
                        session_id,
                        attempt = attempt + 1,
                        "navigation attempt failed, retrying: {e}"
                    );
                    tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
                }
                Err(_) => {}
            }
        }

        if let Err(e) = navigation {
            let elapsed = start.elapsed();
            drop(guard);
            self.record_site_access(&origin, false, None).await;
            self.record_outcome(
                &session,
                StatsEvent::Error(format!("navigate: {e}")),
                Some(elapsed),
                false,
            )
            .await;
            let error = if e.to_string().contains("timed out") {
                ServiceError::browser_timeout("navigate", timeout.as_millis() as u64)
            } else {
                ServiceError::browser("navigate", e)
            };
            return Err(error);
        }

        // Give late content a chance to settle; a slow page is not an error.
        let settle = CONTENT_SETTLE_TIMEOUT.min(timeout);
        if let Err(e) = page
            .wait_for_state(crate::browser::WaitUntil::DomContentLoaded, settle)
            .await
        {
            debug!(session_id, "content settle wait gave up: {e}");
        }

        if self.config.enable_enhanced_mouse_movement {
            let _ = humanize::mouse_wiggle(page, 2).await;
            let word_count = page
                .inner_text("body")
                .await
                .map(|text| text.split_whitespace().count())
                .unwrap_or(0);
            humanize::reading_delay(word_count, timeout).await;
        } else {
            humanize::gaussian_delay(1.0, 0.3).await;
        }

        let final_url = page
            .current_url()
            .await
            .unwrap_or_else(|_| url.to_string());
        let title = page.title().await.unwrap_or_default();
        drop(guard);

        session.set_location(Some(final_url.clone()), Some(title.clone()));

        let duration = start.elapsed();
        let secs = duration.as_secs_f64();
        self.record_site_access(
            &origin,
            true,
            Some(PerfSample {
                load_time: Some(secs),
                response_time: Some(secs),
                ..Default::default()
            }),
        )
        .await;
        self.record_outcome(&session, StatsEvent::Navigate, Some(duration), true)
            .await;

        let result = NavigateResult {
            url: final_url,
            title,
            duration_ms: duration.as_millis() as u64,
            success: true,
            site_memory_loaded,
        };
        info!(
            session_id,
            url = %result.url,
            duration_ms = result.duration_ms,
            "navigation completed"
        );
        Ok(result)
    }
}
