//! Browser abstraction layer.
//!
//! The core never touches the CDP binding directly: sessions hold a boxed
//! [`PageDriver`] and the pool hands out contexts through [`BrowserDriver`].
//! The real implementation lives in [`cdp`]; tests inject the in-memory
//! driver from [`fake`].

pub mod cdp;
pub mod fake;
pub mod pool;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Viewport;

pub use pool::BrowserPool;

/// Navigation wait conditions, mirroring the operation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    #[default]
    NetworkIdle,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// Options applied when a fresh context+page is created for a session.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub viewport: Viewport,
    pub user_agent: String,
    pub javascript_enabled: bool,
    pub ignore_https_errors: bool,
}

/// Capability surface of one isolated page. Everything a session can do to
/// its browser context goes through this trait, which keeps the engine
/// testable against [`fake::FakePage`].
///
/// Implementations return `anyhow::Result`; operation executors translate
/// failures into typed `BrowserOperation` errors.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait according to `wait`. The timeout covers the whole
    /// navigation including the wait stage.
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> anyhow::Result<()>;

    /// Best-effort wait for a load state already in progress.
    async fn wait_for_state(&self, wait: WaitUntil, timeout: Duration) -> anyhow::Result<()>;

    async fn current_url(&self) -> anyhow::Result<String>;
    async fn title(&self) -> anyhow::Result<String>;

    /// Evaluate a JS expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value>;

    /// Poll until the selector matches a visible element.
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;

    /// Visible text only (hidden elements excluded).
    async fn inner_text(&self, selector: &str) -> anyhow::Result<String>;
    /// Full text content including hidden nodes.
    async fn text_content(&self, selector: &str) -> anyhow::Result<String>;
    /// Inner HTML of the selector, or the full document when `None`.
    async fn html(&self, selector: Option<&str>) -> anyhow::Result<String>;

    async fn element_box(&self, selector: &str) -> anyhow::Result<Option<ElementBox>>;
    /// Coarse element classification (link/button/input/select/menu/media)
    /// used for human-mimicry timing.
    async fn element_kind(&self, selector: &str) -> anyhow::Result<String>;
    async fn element_count(&self, selector: &str) -> anyhow::Result<usize>;

    async fn mouse_move(&self, x: f64, y: f64) -> anyhow::Result<()>;
    async fn click_at(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        click_count: u8,
    ) -> anyhow::Result<()>;

    async fn focus(&self, selector: &str) -> anyhow::Result<()>;
    async fn clear_input(&self, selector: &str) -> anyhow::Result<()>;
    /// Insert text into the focused element.
    async fn insert_text(&self, text: &str) -> anyhow::Result<()>;
    async fn select_option(&self, selector: &str, value: &str) -> anyhow::Result<()>;
    async fn scroll_into_view(&self, selector: &str) -> anyhow::Result<()>;
    async fn scroll_by(&self, delta_y: i64) -> anyhow::Result<()>;

    async fn screenshot(
        &self,
        selector: Option<&str>,
        full_page: bool,
        format: ImageFormat,
        quality: Option<u8>,
    ) -> anyhow::Result<Vec<u8>>;

    /// Register a script evaluated on every new document (stealth init).
    async fn add_init_script(&self, source: &str) -> anyhow::Result<()>;
    async fn set_user_agent(
        &self,
        user_agent: &str,
        accept_language: Option<&str>,
        platform: Option<&str>,
    ) -> anyhow::Result<()>;
    async fn block_url_patterns(&self, patterns: &[String]) -> anyhow::Result<()>;

    fn viewport(&self) -> Viewport;

    /// Release the page and its browser context. Must be safe to call once;
    /// the session record guarantees it is not called twice.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Handle to the shared browser process.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Create an isolated context (own cookie jar) with one page in it.
    async fn new_context(&self, options: &ContextOptions) -> anyhow::Result<Box<dyn PageDriver>>;

    /// Liveness probe against the underlying process.
    async fn healthy(&self) -> bool;

    async fn close(&self) -> anyhow::Result<()>;
}
