//! Global service configuration.
//!
//! One flat struct with every recognized option and its documented default.
//! The container is built from this at startup; nothing reads configuration
//! from hidden global state afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Viewport;

/// Resource classes that can be blocked per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Image,
    Font,
    Stylesheet,
    Script,
    Media,
    Other,
}

/// Main configuration for the automation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    // ------------------------------------------------------------------
    // Session management
    // ------------------------------------------------------------------
    /// Hard cap on concurrently active sessions. Admission past this cap
    /// fails with `ResourceLimit`.
    pub max_sessions: usize,
    /// Session lifetime in seconds, measured from creation (not last
    /// activity).
    pub session_ttl_secs: u64,
    /// How often the background reaper scans for expired sessions.
    pub session_cleanup_interval_secs: u64,

    // ------------------------------------------------------------------
    // Browser
    // ------------------------------------------------------------------
    pub headless: bool,
    /// Default per-operation timeout in milliseconds.
    pub default_timeout_ms: u64,
    /// Ceiling for page-load waits in milliseconds.
    pub max_page_load_timeout_ms: u64,
    /// Resource classes blocked in new sessions unless overridden.
    pub block_resources: Vec<ResourceType>,
    pub default_viewport: Viewport,
    pub enable_stealth: bool,

    // ------------------------------------------------------------------
    // Request limits
    // ------------------------------------------------------------------
    pub max_url_length: usize,

    // ------------------------------------------------------------------
    // Caching (external key-value collaborator; settings carried for it)
    // ------------------------------------------------------------------
    pub enable_cache: bool,
    pub cache_ttl_secs: u64,

    // ------------------------------------------------------------------
    // Adaptive pacing
    // ------------------------------------------------------------------
    pub enable_adaptive_rate_limiting: bool,
    pub adaptive_rate_base_delay: f64,
    pub adaptive_rate_min_delay: f64,
    pub adaptive_rate_max_delay: f64,
    pub adaptive_rate_success_increment: f64,
    pub adaptive_rate_failure_decrement: f64,

    // ------------------------------------------------------------------
    // Site memory
    // ------------------------------------------------------------------
    pub enable_site_memory: bool,
    /// Rows idle longer than this are removed by `cleanup_expired`.
    pub site_memory_ttl_secs: u64,

    // ------------------------------------------------------------------
    // Content processing
    // ------------------------------------------------------------------
    pub enable_semantic_chunking: bool,
    pub semantic_chunking_confidence_threshold: f64,
    pub enable_content_deduplication: bool,
    pub content_deduplication_ttl_secs: u64,

    // ------------------------------------------------------------------
    // Human-mimicry mouse movement
    // ------------------------------------------------------------------
    pub enable_enhanced_mouse_movement: bool,
    pub mouse_movement_bezier_points: usize,
    /// Seconds between intermediate mouse positions (lower bound).
    pub mouse_movement_min_delay: f64,
    pub mouse_movement_max_delay: f64,
    /// Pre-click reaction pause bounds in seconds.
    pub mouse_movement_reaction_delay_min: f64,
    pub mouse_movement_reaction_delay_max: f64,

    // ------------------------------------------------------------------
    // Resource monitoring
    // ------------------------------------------------------------------
    /// Seconds between resource samples.
    pub monitor_interval_secs: u64,

    // ------------------------------------------------------------------
    // Filesystem layout
    // ------------------------------------------------------------------
    /// Root for data owned by the service (site-memory database lives at
    /// `<data_dir>/site_memory.db`).
    pub data_dir: PathBuf,
    /// Directory for default screenshot paths.
    pub screenshots_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_sessions: 20,
            session_ttl_secs: 300,
            session_cleanup_interval_secs: 60,
            headless: true,
            default_timeout_ms: 30_000,
            max_page_load_timeout_ms: 60_000,
            block_resources: vec![
                ResourceType::Image,
                ResourceType::Font,
                ResourceType::Stylesheet,
            ],
            default_viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            enable_stealth: true,
            max_url_length: 2048,
            enable_cache: true,
            cache_ttl_secs: 300,
            enable_adaptive_rate_limiting: true,
            adaptive_rate_base_delay: 2.0,
            adaptive_rate_min_delay: 0.5,
            adaptive_rate_max_delay: 10.0,
            adaptive_rate_success_increment: 0.1,
            adaptive_rate_failure_decrement: 0.2,
            enable_site_memory: true,
            site_memory_ttl_secs: 86_400,
            enable_semantic_chunking: true,
            semantic_chunking_confidence_threshold: 0.7,
            enable_content_deduplication: true,
            content_deduplication_ttl_secs: 3_600,
            enable_enhanced_mouse_movement: true,
            mouse_movement_bezier_points: 20,
            mouse_movement_min_delay: 0.01,
            mouse_movement_max_delay: 0.03,
            mouse_movement_reaction_delay_min: 0.1,
            mouse_movement_reaction_delay_max: 0.3,
            monitor_interval_secs: 30,
            data_dir: PathBuf::from("data"),
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}

impl ServiceConfig {
    /// Build a config from `PAGEPILOT_*` environment overrides on top of the
    /// defaults. Only a handful of deployment-level knobs are env-tunable;
    /// everything else is set programmatically.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("PAGEPILOT_MAX_SESSIONS") {
            config.max_sessions = v;
        }
        if let Some(v) = env_parse::<u64>("PAGEPILOT_SESSION_TTL") {
            config.session_ttl_secs = v;
        }
        if let Some(v) = env_parse::<u64>("PAGEPILOT_SESSION_CLEANUP_INTERVAL") {
            config.session_cleanup_interval_secs = v;
        }
        if let Some(v) = env_parse::<bool>("PAGEPILOT_HEADLESS") {
            config.headless = v;
        }
        if let Some(v) = env_parse::<u64>("PAGEPILOT_DEFAULT_TIMEOUT") {
            config.default_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("PAGEPILOT_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PAGEPILOT_SCREENSHOTS_DIR") {
            config.screenshots_dir = PathBuf::from(v);
        }

        config
    }

    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs)
    }

    pub fn default_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.default_timeout_ms)
    }

    pub fn site_memory_db_path(&self) -> PathBuf {
        self.data_dir.join("site_memory.db")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
