//! Validation boundary tests for the configuration layer.

use pagepilot::config::{SessionOptions, Viewport, validate};
use pagepilot::{ServiceConfig, ServiceError};

#[test]
fn defaults_match_documented_values() {
    let config = ServiceConfig::default();
    assert_eq!(config.max_sessions, 20);
    assert_eq!(config.session_ttl_secs, 300);
    assert_eq!(config.session_cleanup_interval_secs, 60);
    assert_eq!(config.default_timeout_ms, 30_000);
    assert_eq!(config.max_page_load_timeout_ms, 60_000);
    assert!(config.headless);
    assert_eq!(config.max_url_length, 2048);
    assert_eq!(config.site_memory_ttl_secs, 86_400);
    assert_eq!(config.semantic_chunking_confidence_threshold, 0.7);
    assert_eq!(config.content_deduplication_ttl_secs, 3_600);
    assert_eq!(config.mouse_movement_bezier_points, 20);
}

#[test]
fn session_id_shape() {
    assert!(validate::validate_session_id("sess_0123abcd").is_ok());
    assert!(validate::validate_session_id("sess_0123ABCD").is_err());
    assert!(validate::validate_session_id("sess_0123abc").is_err());
    assert!(validate::validate_session_id("sess_0123abcde").is_err());
    assert!(validate::validate_session_id("session_0123abcd").is_err());
    assert!(validate::validate_session_id("").is_err());
}

#[test]
fn url_length_boundary() {
    let max = ServiceConfig::default().max_url_length;
    let base = "https://example.com/";
    let padding = "a".repeat(max - base.len());
    let exactly_max = format!("{base}{padding}");
    assert_eq!(exactly_max.len(), max);
    assert!(validate::validate_url(&exactly_max, max).is_ok());

    let over = format!("{exactly_max}a");
    let err = validate::validate_url(&over, max).unwrap_err();
    assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "url"));
}

#[test]
fn url_must_parse_with_host() {
    assert!(validate::validate_url("not a url", 2048).is_err());
    assert!(validate::validate_url("file:///etc/passwd", 2048).is_err());
    assert!(validate::validate_url("https://example.com/path?q=1", 2048).is_ok());
}

#[test]
fn viewport_boundaries() {
    assert!(validate::validate_viewport(&Viewport { width: 100, height: 100 }).is_ok());
    assert!(validate::validate_viewport(&Viewport { width: 4096, height: 4096 }).is_ok());
    assert!(validate::validate_viewport(&Viewport { width: 99, height: 500 }).is_err());
    assert!(validate::validate_viewport(&Viewport { width: 4097, height: 100 }).is_err());
    assert!(validate::validate_viewport(&Viewport { width: 1920, height: 4097 }).is_err());
}

#[test]
fn timeout_boundaries() {
    assert!(validate::validate_timeout(999).is_err());
    assert!(validate::validate_timeout(1_000).is_ok());
    assert!(validate::validate_timeout(300_000).is_ok());
    assert!(validate::validate_timeout(300_001).is_err());
}

#[test]
fn selector_length_boundary() {
    assert!(validate::validate_selector(&"a".repeat(1000)).is_ok());
    assert!(validate::validate_selector(&"a".repeat(1001)).is_err());
    assert!(validate::validate_selector("").is_err());
}

#[test]
fn quality_boundaries() {
    assert!(validate::validate_quality(1).is_ok());
    assert!(validate::validate_quality(100).is_ok());
    assert!(validate::validate_quality(0).is_err());
}

#[test]
fn unknown_session_option_keys_are_rejected() {
    let err = SessionOptions::from_json(serde_json::json!({
        "viewport": { "width": 1280, "height": 720 },
        "not_a_real_option": true,
    }))
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));
}

#[test]
fn session_option_values_are_validated() {
    let options = SessionOptions::from_json(serde_json::json!({
        "viewport": { "width": 50, "height": 720 },
    }))
    .unwrap();
    assert!(options.validate().is_err());

    let options = SessionOptions::from_json(serde_json::json!({
        "user_agent": "x".repeat(501),
    }))
    .unwrap();
    assert!(options.validate().is_err());

    let options = SessionOptions::from_json(serde_json::json!({
        "timeout_ms": 500,
    }))
    .unwrap();
    assert!(options.validate().is_err());

    let options = SessionOptions::from_json(serde_json::json!({
        "viewport": { "width": 1280, "height": 720 },
        "stealth": false,
        "timeout_ms": 5000,
    }))
    .unwrap();
    assert!(options.validate().is_ok());
}

#[test]
fn resolve_layers_overrides_on_defaults() {
    let service = ServiceConfig::default();
    let options = SessionOptions {
        viewport: Some(Viewport { width: 800, height: 600 }),
        stealth: Some(false),
        ..Default::default()
    };
    let resolved = pagepilot::SessionConfig::resolve(&service, &options, "fallback-ua");
    assert_eq!(resolved.viewport.width, 800);
    assert!(!resolved.stealth);
    assert_eq!(resolved.user_agent, "fallback-ua");
    assert_eq!(resolved.timeout_ms, service.default_timeout_ms);
    assert!(resolved.javascript_enabled);
}
