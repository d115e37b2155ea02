//! Per-session configuration: request-time overrides and the resolved
//! snapshot a session carries for its whole life.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

use super::{ResourceType, ServiceConfig};

pub const MIN_VIEWPORT_DIMENSION: u32 = 100;
pub const MAX_VIEWPORT_DIMENSION: u32 = 4096;
pub const MAX_USER_AGENT_LENGTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

/// User-supplied session overrides. Unknown keys are rejected at parse time,
/// so a typo'd option surfaces as a `ValidationError` instead of being
/// silently ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionOptions {
    pub viewport: Option<Viewport>,
    pub user_agent: Option<String>,
    pub stealth: Option<bool>,
    pub block_resources: Option<Vec<ResourceType>>,
    pub timeout_ms: Option<u64>,
    pub javascript_enabled: Option<bool>,
    pub ignore_https_errors: Option<bool>,
    pub browser_kind: Option<BrowserKind>,
}

impl SessionOptions {
    /// Parse overrides from a JSON value, mapping both unknown keys and
    /// malformed values to `ValidationError`.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ServiceError::validation("session_config", e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(viewport) = &self.viewport {
            super::validate::validate_viewport(viewport)?;
        }
        if let Some(ua) = &self.user_agent {
            if ua.is_empty() || ua.len() > MAX_USER_AGENT_LENGTH {
                return Err(ServiceError::validation(
                    "user_agent",
                    format!("length must be 1..={MAX_USER_AGENT_LENGTH}"),
                ));
            }
        }
        if let Some(timeout_ms) = self.timeout_ms {
            super::validate::validate_timeout(timeout_ms)?;
        }
        Ok(())
    }
}

/// Resolved configuration snapshot held by a session. Built once at
/// admission by layering validated user overrides on the service defaults
/// and a randomly drawn stealth profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub viewport: Viewport,
    pub user_agent: String,
    pub stealth: bool,
    pub block_resources: Vec<ResourceType>,
    pub timeout_ms: u64,
    pub javascript_enabled: bool,
    pub ignore_https_errors: bool,
    pub browser_kind: BrowserKind,
}

impl SessionConfig {
    /// Merge user overrides over service defaults. `fallback_user_agent` is
    /// the stealth profile's draw, used when the caller did not pin one.
    pub fn resolve(
        service: &ServiceConfig,
        options: &SessionOptions,
        fallback_user_agent: &str,
    ) -> Self {
        Self {
            viewport: options.viewport.unwrap_or(service.default_viewport),
            user_agent: options
                .user_agent
                .clone()
                .unwrap_or_else(|| fallback_user_agent.to_string()),
            stealth: options.stealth.unwrap_or(service.enable_stealth),
            block_resources: options
                .block_resources
                .clone()
                .unwrap_or_else(|| service.block_resources.clone()),
            timeout_ms: options.timeout_ms.unwrap_or(service.default_timeout_ms),
            javascript_enabled: options.javascript_enabled.unwrap_or(true),
            ignore_https_errors: options.ignore_https_errors.unwrap_or(true),
            browser_kind: options.browser_kind.unwrap_or_default(),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Hard per-session quotas. Crossing any of these expires the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionLimits {
    pub max_duration_secs: u64,
    pub max_requests: u64,
    pub max_pages: u64,
    pub max_screenshots: u64,
    pub max_interactions: u64,
    /// Advisory only; enforced by the resource monitor's capacity signal,
    /// not by the registry.
    pub max_memory_mib: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,
            max_requests: 1000,
            max_pages: 100,
            max_screenshots: 50,
            max_interactions: 500,
            max_memory_mib: 512,
        }
    }
}
