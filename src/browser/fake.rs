//! In-memory browser driver for tests.
//!
//! The engine is exercised against this driver instead of a live Chromium:
//! pages are described up front, navigation failures can be injected, and
//! context teardown is counted so release-exactly-once behavior is
//! observable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::Viewport;

use super::{
    BrowserDriver, ContextOptions, ElementBox, ImageFormat, MouseButton, PageDriver, WaitUntil,
};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub kind: String,
    pub text: String,
    pub visible: bool,
    pub bounds: ElementBox,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            kind: "div".to_string(),
            text: String::new(),
            visible: true,
            bounds: ElementBox {
                x: 100.0,
                y: 100.0,
                width: 200.0,
                height: 40.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePageContent {
    pub title: String,
    pub text: String,
    pub html: String,
    pub elements: HashMap<String, FakeElement>,
}

/// Shared world state: the sites the fake browser can "navigate" to plus
/// counters used by tests.
#[derive(Default)]
pub struct FakeWorld {
    pages: Mutex<HashMap<String, FakePageContent>>,
    fail_next_navigations: AtomicUsize,
    /// How long each navigation "takes" (lets tests observe overlap).
    nav_delay_ms: AtomicUsize,
    pub contexts_created: AtomicUsize,
    pub contexts_closed: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeWorld {
    pub fn add_page(&self, url: &str, content: FakePageContent) {
        self.pages.lock().insert(url.to_string(), content);
    }

    /// Make the next `n` navigations fail with a synthetic network error.
    pub fn fail_next_navigations(&self, n: usize) {
        self.fail_next_navigations.store(n, Ordering::SeqCst);
    }

    pub fn set_nav_delay(&self, delay: Duration) {
        self.nav_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    fn page_for(&self, url: &str) -> Option<FakePageContent> {
        self.pages.lock().get(url).cloned()
    }
}

pub struct FakeBrowser {
    pub world: Arc<FakeWorld>,
    healthy: AtomicBool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            world: Arc::new(FakeWorld::default()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Convenience: a browser whose world already contains one page with a
    /// body element.
    pub fn with_page(url: &str, title: &str, text: &str) -> Self {
        let browser = Self::new();
        let mut content = FakePageContent {
            title: title.to_string(),
            text: text.to_string(),
            html: format!("<html><body>{text}</body></html>"),
            ..Default::default()
        };
        content.elements.insert(
            "body".to_string(),
            FakeElement {
                kind: "body".to_string(),
                text: text.to_string(),
                ..Default::default()
            },
        );
        browser.world.add_page(url, content);
        browser
    }

    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn PageDriver>> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(anyhow!("browser process is gone"));
        }
        self.world.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            world: Arc::clone(&self.world),
            viewport: options.viewport,
            current_url: Mutex::new(String::from("about:blank")),
            closed: AtomicBool::new(false),
        }))
    }

    async fn healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct FakePage {
    world: Arc<FakeWorld>,
    viewport: Viewport,
    current_url: Mutex<String>,
    closed: AtomicBool,
}

impl FakePage {
    fn content(&self) -> FakePageContent {
        let url = self.current_url.lock().clone();
        self.world.page_for(&url).unwrap_or_default()
    }

    fn element(&self, selector: &str) -> Option<FakeElement> {
        self.content().elements.get(selector).cloned()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(anyhow!("page is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;

        let in_flight = self.world.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.world.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let delay = self.world.nav_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.world.in_flight.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.world.fail_next_navigations.load(Ordering::SeqCst);
        if remaining > 0 {
            self.world
                .fail_next_navigations
                .store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("net::ERR_CONNECTION_RESET"));
        }

        if self.world.page_for(url).is_none() {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED: {url}"));
        }
        *self.current_url.lock() = url.to_string();
        Ok(())
    }

    async fn wait_for_state(&self, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        self.ensure_open()
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_url.lock().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.content().title)
    }

    async fn evaluate(&self, _expression: &str) -> Result<serde_json::Value> {
        self.ensure_open()?;
        Ok(serde_json::Value::Null)
    }

    async fn wait_for_visible(&self, selector: &str, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        match self.element(selector) {
            Some(el) if el.visible => Ok(()),
            Some(_) => Err(anyhow!("element not visible: {selector}")),
            None => Err(anyhow!("element not found: {selector}")),
        }
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        self.ensure_open()?;
        if selector == "body" {
            return Ok(self.content().text);
        }
        Ok(self.element(selector).map(|e| e.text).unwrap_or_default())
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        self.inner_text(selector).await
    }

    async fn html(&self, selector: Option<&str>) -> Result<String> {
        self.ensure_open()?;
        match selector {
            None => Ok(self.content().html),
            Some(sel) => Ok(self.element(sel).map(|e| e.text).unwrap_or_default()),
        }
    }

    async fn element_box(&self, selector: &str) -> Result<Option<ElementBox>> {
        Ok(self.element(selector).map(|e| e.bounds))
    }

    async fn element_kind(&self, selector: &str) -> Result<String> {
        Ok(self
            .element(selector)
            .map(|e| e.kind)
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        Ok(usize::from(self.element(selector).is_some()))
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> Result<()> {
        self.ensure_open()
    }

    async fn click_at(
        &self,
        _x: f64,
        _y: f64,
        _button: MouseButton,
        _click_count: u8,
    ) -> Result<()> {
        self.ensure_open()
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        self.ensure_open()?;
        self.element(selector)
            .map(|_| ())
            .ok_or_else(|| anyhow!("element not found: {selector}"))
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        self.focus(selector).await
    }

    async fn insert_text(&self, _text: &str) -> Result<()> {
        self.ensure_open()
    }

    async fn select_option(&self, selector: &str, _value: &str) -> Result<()> {
        self.focus(selector).await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.focus(selector).await
    }

    async fn scroll_by(&self, _delta_y: i64) -> Result<()> {
        self.ensure_open()
    }

    async fn screenshot(
        &self,
        selector: Option<&str>,
        _full_page: bool,
        _format: ImageFormat,
        _quality: Option<u8>,
    ) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if let Some(sel) = selector
            && self.element(sel).is_none()
        {
            return Err(anyhow!("element not found: {sel}"));
        }
        // A minimal PNG header followed by filler, enough to land on disk.
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(1024, 0);
        Ok(bytes)
    }

    async fn add_init_script(&self, _source: &str) -> Result<()> {
        self.ensure_open()
    }

    async fn set_user_agent(
        &self,
        _user_agent: &str,
        _accept_language: Option<&str>,
        _platform: Option<&str>,
    ) -> Result<()> {
        self.ensure_open()
    }

    async fn block_url_patterns(&self, _patterns: &[String]) -> Result<()> {
        self.ensure_open()
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("context already closed"));
        }
        self.world.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
