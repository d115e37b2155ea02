//! Element interaction executor with human-like behavior.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::info;

use crate::browser::{MouseButton, PageDriver};
use crate::config::validate;
use crate::error::{Result, ServiceError};
use crate::humanize;
use crate::registry::StatsEvent;

use super::types::{InteractRequest, InteractResult, InteractionAction};
use super::Operations;

async fn random_pause(min_ms: u64, max_ms: u64) {
    let pause = rand::rng().random_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(pause)).await;
}

impl Operations {
    pub async fn interact(
        &self,
        session_id: &str,
        request: InteractRequest,
    ) -> Result<InteractResult> {
        validate::validate_selector(&request.selector)?;
        if request.action.requires_value() && request.value.as_deref().unwrap_or("").is_empty() {
            return Err(ServiceError::validation(
                "value",
                format!("value required for {} action", request.action.as_str()),
            ));
        }

        let session = self.registry.get(session_id).await?;
        let timeout = self.resolve_timeout(request.timeout_ms, &session)?;

        let guard = session.lock_page().await;
        let page = Self::require_page(session_id, &guard)?;

        self.pace().await;
        let start = Instant::now();

        let outcome = self.perform_interaction(page, &request, timeout).await;
        drop(guard);

        match outcome {
            Ok(()) => {
                self.record_outcome(&session, StatsEvent::Interact, Some(start.elapsed()), true)
                    .await;
                info!(
                    session_id,
                    action = request.action.as_str(),
                    selector = %request.selector,
                    "interaction completed"
                );
                Ok(InteractResult {
                    action: request.action,
                    selector: request.selector,
                    success: true,
                })
            }
            Err(e) => {
                self.record_outcome(
                    &session,
                    StatsEvent::Error(format!("interact: {e}")),
                    Some(start.elapsed()),
                    false,
                )
                .await;
                Err(ServiceError::browser("interact", e))
            }
        }
    }

    async fn perform_interaction(
        &self,
        page: &dyn PageDriver,
        request: &InteractRequest,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let selector = request.selector.as_str();
        page.wait_for_visible(selector, timeout).await?;

        if self.config.enable_enhanced_mouse_movement && request.action.is_pointer() {
            humanize::human_move(page, selector, &self.mouse).await?;
        }
        humanize::element_timing(page, selector).await;

        match request.action {
            InteractionAction::Click => {
                self.pointer_click(page, selector, request, MouseButton::Left, 1)
                    .await?;
                random_pause(50, 150).await;
            }
            InteractionAction::DoubleClick => {
                self.pointer_click(page, selector, request, MouseButton::Left, 2)
                    .await?;
                random_pause(100, 200).await;
            }
            InteractionAction::RightClick => {
                self.pointer_click(page, selector, request, MouseButton::Right, 1)
                    .await?;
                random_pause(100, 200).await;
            }
            InteractionAction::Type => {
                let value = request.value.as_deref().unwrap_or_default();
                page.focus(selector).await?;
                page.clear_input(selector).await?;
                // One keystroke at a time; instant pastes are a bot tell.
                for ch in value.chars() {
                    page.insert_text(&ch.to_string()).await?;
                    tokio::time::sleep(humanize::keystroke_delay()).await;
                }
            }
            InteractionAction::Select => {
                let value = request.value.as_deref().unwrap_or_default();
                page.select_option(selector, value).await?;
                random_pause(100, 200).await;
            }
            InteractionAction::Scroll => {
                page.scroll_into_view(selector).await?;
                if let Some(offset) = request
                    .value
                    .as_deref()
                    .and_then(|v| v.parse::<i64>().ok())
                {
                    page.scroll_by(offset).await?;
                }
                random_pause(100, 300).await;
            }
            InteractionAction::Hover => {
                self.hover_center(page, selector).await?;
                random_pause(200, 500).await;
            }
        }

        Ok(())
    }

    async fn pointer_click(
        &self,
        page: &dyn PageDriver,
        selector: &str,
        request: &InteractRequest,
        button: MouseButton,
        click_count: u8,
    ) -> anyhow::Result<()> {
        if request.options.hover_first {
            self.hover_center(page, selector).await?;
            random_pause(100, 300).await;
        }

        let bounds = page
            .element_box(selector)
            .await?
            .ok_or_else(|| anyhow::anyhow!("element not found: {selector}"))?;
        let (x, y) = bounds.center();
        page.click_at(x, y, button, click_count).await
    }

    async fn hover_center(
        &self,
        page: &dyn PageDriver,
        selector: &str,
    ) -> anyhow::Result<()> {
        let bounds = page
            .element_box(selector)
            .await?
            .ok_or_else(|| anyhow::anyhow!("element not found: {selector}"))?;
        let (x, y) = bounds.center();
        page.mouse_move(x, y).await
    }
}
