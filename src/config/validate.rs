//! Input validation for the core API surface.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{Result, ServiceError};

use super::session::{MAX_VIEWPORT_DIMENSION, MIN_VIEWPORT_DIMENSION, Viewport};

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const MAX_SELECTOR_LENGTH: usize = 1_000;

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sess_[0-9a-f]{8}$").expect("session id pattern is valid")
});

/// Session ids are a literal `sess_` prefix followed by 8 lowercase hex
/// characters.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if SESSION_ID_RE.is_match(session_id) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "session_id",
            format!("'{session_id}' does not match sess_[0-9a-f]{{8}}"),
        ))
    }
}

/// Parse and bound-check a navigation URL. Returns the parsed URL so callers
/// can extract the origin without re-parsing.
pub fn validate_url(raw: &str, max_length: usize) -> Result<Url> {
    if raw.is_empty() {
        return Err(ServiceError::validation("url", "must not be empty"));
    }
    if raw.len() > max_length {
        return Err(ServiceError::validation(
            "url",
            format!("length {} exceeds maximum {max_length}", raw.len()),
        ));
    }
    let parsed =
        Url::parse(raw).map_err(|e| ServiceError::validation("url", format!("parse error: {e}")))?;
    if parsed.host_str().is_none() {
        return Err(ServiceError::validation("url", "missing host"));
    }
    Ok(parsed)
}

pub fn validate_selector(selector: &str) -> Result<()> {
    if selector.is_empty() {
        return Err(ServiceError::validation("selector", "must not be empty"));
    }
    if selector.len() > MAX_SELECTOR_LENGTH {
        return Err(ServiceError::validation(
            "selector",
            format!("length exceeds maximum {MAX_SELECTOR_LENGTH}"),
        ));
    }
    Ok(())
}

/// Operation timeouts are bounded to 1s..=300s.
pub fn validate_timeout(timeout_ms: u64) -> Result<()> {
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(ServiceError::validation(
            "timeout",
            format!("{timeout_ms}ms is outside {MIN_TIMEOUT_MS}..={MAX_TIMEOUT_MS}"),
        ));
    }
    Ok(())
}

pub fn validate_viewport(viewport: &Viewport) -> Result<()> {
    let range = MIN_VIEWPORT_DIMENSION..=MAX_VIEWPORT_DIMENSION;
    if !range.contains(&viewport.width) || !range.contains(&viewport.height) {
        return Err(ServiceError::validation(
            "viewport",
            format!(
                "{}x{} is outside {MIN_VIEWPORT_DIMENSION}..={MAX_VIEWPORT_DIMENSION} per dimension",
                viewport.width, viewport.height
            ),
        ));
    }
    Ok(())
}

/// JPEG quality, when given, must be 1..=100.
pub fn validate_quality(quality: u8) -> Result<()> {
    if !(1..=100).contains(&quality) {
        return Err(ServiceError::validation(
            "quality",
            format!("{quality} is outside 1..=100"),
        ));
    }
    Ok(())
}

/// Extract a site origin (`scheme://host[:port]`) used as the site-memory
/// key.
pub fn site_origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}
