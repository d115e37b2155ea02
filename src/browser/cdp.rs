//! Chromium-backed driver implementation.
//!
//! All CDP specifics live here: executable discovery, launch flags, the
//! handler event loop, isolated-context creation, emulation overrides, and
//! the JavaScript snippets backing element queries. The rest of the crate
//! only sees the [`PageDriver`]/[`BrowserDriver`] traits.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetScriptExecutionDisabledParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams,
    MouseButton as CdpMouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
    Viewport as ScreenshotClip,
};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::config::{ServiceConfig, Viewport};

use super::{ContextOptions, ElementBox, ImageFormat, MouseButton, PageDriver, WaitUntil};
use super::BrowserDriver;

/// Poll interval for readiness/visibility checks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quiet window used to approximate network-idle.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Find a Chrome/Chromium executable with platform-specific search paths.
/// `CHROMIUM_PATH` overrides all other methods.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser via 'which': {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium when nothing is installed locally.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pagepilot")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

/// The shared browser process plus its CDP event-handler task.
pub struct CdpBrowser {
    browser: Arc<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    user_data_dir: PathBuf,
}

impl CdpBrowser {
    /// Launch one long-lived browser with the automation-suppressing flag
    /// set. Called once at service startup.
    pub async fn launch(config: &ServiceConfig) -> Result<Self> {
        let chrome_path = match find_browser_executable().await {
            Ok(path) => path,
            Err(_) => download_managed_browser().await?,
        };

        let user_data_dir = std::env::temp_dir().join(format!(
            "pagepilot_chrome_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&user_data_dir)
            .context("Failed to create user data directory")?;

        let mut config_builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(
                config.default_viewport.width,
                config.default_viewport.height,
            )
            .user_data_dir(user_data_dir.clone())
            .chrome_executable(chrome_path);

        if config.headless {
            config_builder = config_builder.headless_mode(HeadlessMode::default());
        } else {
            config_builder = config_builder.with_head();
        }

        config_builder = config_builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--ignore-certificate-errors")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-breakpad")
            .arg("--disable-hang-monitor")
            .arg("--disable-ipc-flooding-protection")
            .arg("--disable-prompt-on-repost")
            .arg("--metrics-recording-only")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {e}"))?;

        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = task::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    let error_msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide cannot deserialize;
                    // those are not fatal to the connection.
                    let benign = error_msg
                        .contains("data did not match any variant of untagged enum Message")
                        || error_msg.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("Suppressed benign CDP serialization error: {error_msg}");
                    } else {
                        error!("Browser handler error: {e:?}");
                    }
                }
            }
            info!("Browser handler task completed");
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler: Mutex::new(Some(handler_task)),
            user_data_dir,
        })
    }
}

#[async_trait]
impl BrowserDriver for CdpBrowser {
    async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn PageDriver>> {
        let ctx = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?;
        let context_id = ctx.result.browser_context_id.clone();

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow!("Failed to build target params: {e}"))?;
        let page = self
            .browser
            .new_page(target)
            .await
            .context("Failed to create page in context")?;

        page.execute(NetworkEnableParams::default())
            .await
            .context("Failed to enable network domain")?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(options.viewport.width as i64)
            .height(options.viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow!("Failed to build viewport params: {e}"))?;
        page.execute(metrics)
            .await
            .context("Failed to set viewport")?;

        page.execute(SetUserAgentOverrideParams {
            user_agent: options.user_agent.clone(),
            accept_language: Some("en-US,en;q=0.9".to_string()),
            platform: None,
            user_agent_metadata: None,
        })
        .await
        .context("Failed to set user agent")?;

        if !options.javascript_enabled {
            page.execute(SetScriptExecutionDisabledParams { value: true })
                .await
                .context("Failed to disable script execution")?;
        }

        page.execute(SetIgnoreCertificateErrorsParams {
            ignore: options.ignore_https_errors,
        })
        .await
        .context("Failed to set certificate error policy")?;

        Ok(Box::new(CdpPage {
            page,
            browser: Arc::clone(&self.browser),
            context_id,
            viewport: options.viewport,
        }))
    }

    async fn healthy(&self) -> bool {
        self.browser.version().await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        info!("Closing browser process");
        if let Err(e) = self
            .browser
            .execute(chromiumoxide::cdp::browser_protocol::browser::CloseParams::default())
            .await
        {
            warn!("Browser close command failed: {e}");
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            warn!(
                "Failed to clean up user data dir {}: {e}",
                self.user_data_dir.display()
            );
        }
        Ok(())
    }
}

/// One page in its own browser context.
pub struct CdpPage {
    page: Page,
    browser: Arc<Browser>,
    context_id: chromiumoxide::cdp::browser_protocol::browser::BrowserContextId,
    viewport: Viewport,
}

impl CdpPage {
    /// JSON-encode a selector into a JS string literal.
    fn js_str(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }

    async fn eval_value(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .context("JS evaluation failed")?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| anyhow!("Failed to read JS result: {e}"))
    }

    async fn ready_state(&self) -> Result<String> {
        let value = self.eval_value("document.readyState").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Poll `document.readyState` until it reaches at least `target`.
    async fn wait_ready_state(&self, target: &str, deadline: Instant) -> Result<()> {
        loop {
            let state = self.ready_state().await.unwrap_or_default();
            let reached = match target {
                "interactive" => state == "interactive" || state == "complete",
                _ => state == "complete",
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("timed out waiting for readyState {target}"));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Approximate network-idle: document complete, then the resource-entry
    /// count stable across one quiet window.
    async fn wait_network_idle(&self, deadline: Instant) -> Result<()> {
        self.wait_ready_state("complete", deadline).await?;
        let count_expr = "performance.getEntriesByType('resource').length";
        loop {
            let before = self.eval_value(count_expr).await?.as_u64().unwrap_or(0);
            tokio::time::sleep(NETWORK_IDLE_WINDOW).await;
            let after = self.eval_value(count_expr).await?.as_u64().unwrap_or(0);
            if before == after {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("timed out waiting for network idle"));
            }
        }
    }

    async fn dispatch_mouse(
        &self,
        event_type: DispatchMouseEventType,
        x: f64,
        y: f64,
        button: Option<CdpMouseButton>,
        click_count: Option<i64>,
    ) -> Result<()> {
        let mut builder = DispatchMouseEventParams::builder()
            .r#type(event_type)
            .x(x)
            .y(y);
        if let Some(button) = button {
            builder = builder.button(button);
        }
        if let Some(count) = click_count {
            builder = builder.click_count(count);
        }
        let params = builder
            .build()
            .map_err(|e| anyhow!("Failed to build mouse event: {e}"))?;
        self.page
            .execute(params)
            .await
            .context("Mouse event dispatch failed")?;
        Ok(())
    }
}

fn cdp_button(button: MouseButton) -> CdpMouseButton {
    match button {
        MouseButton::Left => CdpMouseButton::Left,
        MouseButton::Middle => CdpMouseButton::Middle,
        MouseButton::Right => CdpMouseButton::Right,
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation timed out after {timeout:?}"))?
            .context("navigation failed")?;
        self.wait_for_state(wait, deadline.saturating_duration_since(Instant::now()))
            .await
    }

    async fn wait_for_state(&self, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        match wait {
            WaitUntil::Commit => Ok(()),
            WaitUntil::DomContentLoaded => self.wait_ready_state("interactive", deadline).await,
            WaitUntil::Load => self.wait_ready_state("complete", deadline).await,
            WaitUntil::NetworkIdle => self.wait_network_idle(deadline).await,
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self.page.url().await.context("Failed to read page URL")?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .context("Failed to read page title")?;
        Ok(title.unwrap_or_default())
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        self.eval_value(expression).await
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let expr = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()",
            sel = Self::js_str(selector)
        );
        loop {
            if self.eval_value(&expr).await?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("timed out waiting for visible: {selector}"));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.innerText : ''; }})()",
            sel = Self::js_str(selector)
        );
        Ok(self
            .eval_value(&expr)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.textContent : ''; }})()",
            sel = Self::js_str(selector)
        );
        Ok(self
            .eval_value(&expr)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn html(&self, selector: Option<&str>) -> Result<String> {
        let expr = match selector {
            Some(sel) => format!(
                "(() => {{ const el = document.querySelector({sel}); return el ? el.innerHTML : ''; }})()",
                sel = Self::js_str(sel)
            ),
            None => "document.documentElement.outerHTML".to_string(),
        };
        Ok(self
            .eval_value(&expr)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>> {
        let expr = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                const r = el.getBoundingClientRect();
                return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
            }})()",
            sel = Self::js_str(selector)
        );
        let value = self.eval_value(&expr).await?;
        if value.is_null() {
            return Ok(None);
        }
        let get = |key: &str| value.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(Some(ElementBox {
            x: get("x"),
            y: get("y"),
            width: get("width"),
            height: get("height"),
        }))
    }

    async fn element_kind(&self, selector: &str) -> Result<String> {
        let expr = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return 'unknown';
                const tag = el.tagName.toLowerCase();
                const role = el.getAttribute('role') || '';
                const className = (typeof el.className === 'string') ? el.className : '';
                if (tag === 'a' || role === 'link') return 'link';
                if (tag === 'button' || role === 'button') return 'button';
                if (tag === 'input' || tag === 'textarea' || role === 'textbox') return 'input';
                if (tag === 'select' || role === 'combobox') return 'select';
                if (className.includes('menu') || role === 'menu') return 'menu';
                if (tag === 'img' || tag === 'video') return 'media';
                return tag;
            }})()",
            sel = Self::js_str(selector)
        );
        Ok(self
            .eval_value(&expr)
            .await?
            .as_str()
            .unwrap_or("unknown")
            .to_string())
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        let expr = format!(
            "document.querySelectorAll({sel}).length",
            sel = Self::js_str(selector)
        );
        Ok(self.eval_value(&expr).await?.as_u64().unwrap_or(0) as usize)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, None, None)
            .await
    }

    async fn click_at(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        click_count: u8,
    ) -> Result<()> {
        let button = cdp_button(button);
        self.dispatch_mouse(
            DispatchMouseEventType::MousePressed,
            x,
            y,
            Some(button.clone()),
            Some(i64::from(click_count)),
        )
        .await?;
        self.dispatch_mouse(
            DispatchMouseEventType::MouseReleased,
            x,
            y,
            Some(button.clone()),
            Some(i64::from(click_count)),
        )
        .await
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) el.focus(); return !!el; }})()",
            sel = Self::js_str(selector)
        );
        let found = self.eval_value(&expr).await?.as_bool().unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(anyhow!("element not found: {selector}"))
        }
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        let expr = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()",
            sel = Self::js_str(selector)
        );
        let found = self.eval_value(&expr).await?.as_bool().unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(anyhow!("element not found: {selector}"))
        }
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.page
            .execute(InsertTextParams {
                text: text.to_string(),
            })
            .await
            .context("Text insertion failed")?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let expr = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = {val};
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()",
            sel = Self::js_str(selector),
            val = Self::js_str(value)
        );
        let found = self.eval_value(&expr).await?.as_bool().unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(anyhow!("element not found: {selector}"))
        }
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) el.scrollIntoView({{ block: 'center' }}); return !!el; }})()",
            sel = Self::js_str(selector)
        );
        self.eval_value(&expr).await?;
        Ok(())
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<()> {
        let expr = format!("(() => {{ window.scrollBy(0, {delta_y}); return true; }})()");
        self.eval_value(&expr).await?;
        Ok(())
    }

    async fn screenshot(
        &self,
        selector: Option<&str>,
        full_page: bool,
        format: ImageFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>> {
        let clip = match selector {
            Some(sel) => {
                let bounds = self
                    .element_box(sel)
                    .await?
                    .ok_or_else(|| anyhow!("element not found: {sel}"))?;
                Some(ScreenshotClip {
                    x: bounds.x,
                    y: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                    scale: 1.0,
                })
            }
            None => None,
        };

        let params = CaptureScreenshotParams {
            format: Some(match format {
                ImageFormat::Png => CaptureScreenshotFormat::Png,
                ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            }),
            quality: quality.map(i64::from),
            clip,
            capture_beyond_viewport: Some(full_page),
            ..Default::default()
        };

        self.page
            .screenshot(params)
            .await
            .context("Screenshot capture failed")
    }

    async fn add_init_script(&self, source: &str) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams {
                source: source.to_string(),
                include_command_line_api: None,
                world_name: None,
                run_immediately: None,
            })
            .await
            .context("Failed to register init script")?;
        Ok(())
    }

    async fn set_user_agent(
        &self,
        user_agent: &str,
        accept_language: Option<&str>,
        platform: Option<&str>,
    ) -> Result<()> {
        self.page
            .execute(SetUserAgentOverrideParams {
                user_agent: user_agent.to_string(),
                accept_language: accept_language.map(str::to_string),
                platform: platform.map(str::to_string),
                user_agent_metadata: None,
            })
            .await
            .context("Failed to override user agent")?;
        Ok(())
    }

    async fn block_url_patterns(&self, patterns: &[String]) -> Result<()> {
        self.page
            .execute(SetBlockedUrLsParams {
                urls: patterns.to_vec(),
            })
            .await
            .context("Failed to set blocked URL patterns")?;
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page cleanly: {e}");
        }
        self.browser
            .execute(DisposeBrowserContextParams {
                browser_context_id: self.context_id.clone(),
            })
            .await
            .context("Failed to dispose browser context")?;
        Ok(())
    }
}
