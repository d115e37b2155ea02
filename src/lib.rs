//! pagepilot: multi-tenant headless-browser automation service.
//!
//! Clients create long-lived sessions, each owning one isolated browser
//! context, and drive them through high-level operations (navigate,
//! extract, interact, screenshot, batch). The engine admits sessions under
//! a global cap, serializes operations per session while running sessions
//! in parallel, enforces TTL and usage quotas, paces requests adaptively
//! from success/failure feedback, and persists learned per-site behavior.

pub mod browser;
pub mod config;
pub mod content;
pub mod error;
pub mod humanize;
pub mod monitor;
pub mod ops;
pub mod pacer;
pub mod registry;
pub mod service;
pub mod site_memory;
pub mod stealth;

pub use browser::{BrowserDriver, BrowserPool, PageDriver, WaitUntil};
pub use config::{
    BrowserKind, ResourceType, ServiceConfig, SessionConfig, SessionLimits, SessionOptions,
    Viewport,
};
pub use content::{Chunk, ContentKind, Deduplicator, chunk_content};
pub use error::{Result, ServiceError};
pub use monitor::ResourceMonitor;
pub use ops::{
    BatchOperation, BatchRequest, BatchResult, ExtractRequest, ExtractResult, ExtractType,
    InteractRequest, InteractResult, InteractionAction, NavigateRequest, NavigateResult,
    Operations, ScreenshotRequest, ScreenshotResult,
};
pub use pacer::{AdaptivePacer, PacerSettings, PacerStats};
pub use registry::{
    Session, SessionRegistry, SessionStats, SessionStatsSnapshot, SessionStatus, SessionView,
    StatsEvent,
};
pub use service::PagePilot;
pub use site_memory::{PerfSample, SiteMemory, SiteMemoryStore, SiteSortBy};
pub use stealth::StealthProfile;
