//! Typed errors for the session and operation engine.
//!
//! Every failure the service surfaces maps to one of these kinds, each
//! with a stable string code the transport layer can rely on. Infrastructure
//! code (browser plumbing, file I/O) uses `anyhow` internally and is wrapped
//! into `BrowserOperation` at executor boundaries.

use serde_json::{Map, Value};
use thiserror::Error;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Session exists but is no longer usable (expired TTL or exhausted
    /// quota). The registry closes and removes the session before returning
    /// this.
    #[error("invalid session {session_id}: {reason}")]
    InvalidSession { session_id: String, reason: String },

    #[error("browser operation '{operation}' failed: {cause}")]
    BrowserOperation {
        operation: String,
        cause: String,
        details: Option<Map<String, Value>>,
    },

    #[error("validation failed for '{field}': {cause}")]
    Validation { field: String, cause: String },

    #[error("resource limit reached for {resource}: {current}/{limit}")]
    ResourceLimit {
        resource: String,
        limit: u64,
        current: u64,
    },

    #[error("configuration error for '{field}': {cause}")]
    Configuration { field: String, cause: String },

    #[error("cache error: {0}")]
    Cache(String),
}

impl ServiceError {
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    pub fn invalid_session(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSession {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    pub fn browser(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::BrowserOperation {
            operation: operation.into(),
            cause: cause.to_string(),
            details: None,
        }
    }

    pub fn browser_with_details(
        operation: impl Into<String>,
        cause: impl ToString,
        details: Map<String, Value>,
    ) -> Self {
        Self::BrowserOperation {
            operation: operation.into(),
            cause: cause.to_string(),
            details: Some(details),
        }
    }

    /// Timeout variant of a browser failure, so callers can distinguish
    /// cancellation-by-deadline from protocol errors.
    pub fn browser_timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        let mut details = Map::new();
        details.insert("timeout_ms".into(), Value::from(timeout_ms));
        Self::BrowserOperation {
            operation: operation.into(),
            cause: "timeout".into(),
            details: Some(details),
        }
    }

    pub fn validation(field: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            cause: cause.into(),
        }
    }

    pub fn resource_limit(resource: impl Into<String>, limit: u64, current: u64) -> Self {
        Self::ResourceLimit {
            resource: resource.into(),
            limit,
            current,
        }
    }

    pub fn configuration(field: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            cause: cause.into(),
        }
    }

    /// Stable machine-readable code for each error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::InvalidSession { .. } => "INVALID_SESSION",
            Self::BrowserOperation { .. } => "BROWSER_OPERATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ResourceLimit { .. } => "RESOURCE_LIMIT_EXCEEDED",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
        }
    }

    /// Structured details map for the transport layer. Always includes the
    /// error code; variant-specific fields are merged in.
    pub fn details(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("error_code".into(), Value::from(self.error_code()));
        match self {
            Self::SessionNotFound { session_id } | Self::InvalidSession { session_id, .. } => {
                map.insert("session_id".into(), Value::from(session_id.clone()));
            }
            Self::BrowserOperation {
                operation, details, ..
            } => {
                map.insert("operation".into(), Value::from(operation.clone()));
                if let Some(extra) = details {
                    for (k, v) in extra {
                        map.insert(k.clone(), v.clone());
                    }
                }
            }
            Self::Validation { field, .. } | Self::Configuration { field, .. } => {
                map.insert("field".into(), Value::from(field.clone()));
            }
            Self::ResourceLimit {
                resource,
                limit,
                current,
            } => {
                map.insert("resource".into(), Value::from(resource.clone()));
                map.insert("limit".into(), Value::from(*limit));
                map.insert("current".into(), Value::from(*current));
            }
            Self::Cache(_) => {}
        }
        map
    }

    /// Whether the underlying cause was a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::BrowserOperation { cause, .. } if cause == "timeout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_per_kind() {
        assert_eq!(
            ServiceError::session_not_found("sess_0badf00d").error_code(),
            "SESSION_NOT_FOUND"
        );
        assert_eq!(
            ServiceError::validation("url", "too long").error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            ServiceError::resource_limit("sessions", 20, 20).error_code(),
            "RESOURCE_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn details_carry_variant_fields() {
        let details = ServiceError::resource_limit("sessions", 1, 1).details();
        assert_eq!(details["resource"], Value::from("sessions"));
        assert_eq!(details["limit"], Value::from(1u64));
        assert_eq!(details["error_code"], Value::from("RESOURCE_LIMIT_EXCEEDED"));
    }

    #[test]
    fn timeout_variant_is_distinguishable() {
        let err = ServiceError::browser_timeout("navigate", 30_000);
        assert!(err.is_timeout());
        assert_eq!(err.details()["timeout_ms"], Value::from(30_000u64));

        let err = ServiceError::browser("navigate", "net::ERR_CONNECTION_RESET");
        assert!(!err.is_timeout());
    }
}
