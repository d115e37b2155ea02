//! End-to-end operation scenarios over the service container with the
//! in-memory browser driver.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use pagepilot::browser::fake::{FakeBrowser, FakeElement, FakePageContent};
use pagepilot::ops::{
    BatchOperation, BatchRequest, ExtractRequest, ExtractType, InteractRequest, InteractionAction,
    NavigateRequest, ScreenshotRequest,
};
use pagepilot::{PagePilot, ServiceConfig, ServiceError, SessionOptions};
use tempfile::TempDir;

// Parsed URLs serialize with a trailing slash; the fake world is keyed by
// the exact navigated string.
const EXAMPLE_URL: &str = "https://example.com/";

fn example_body() -> String {
    "This domain is for use in illustrative examples in documents. \
     You may use this domain in literature without prior coordination or asking for permission. "
        .repeat(6)
}

fn example_world() -> Arc<FakeBrowser> {
    let browser = FakeBrowser::new();
    let mut content = FakePageContent {
        title: "Example Domain".to_string(),
        text: example_body(),
        html: format!("<html><body>{}</body></html>", example_body()),
        ..Default::default()
    };
    content.elements.insert(
        "body".into(),
        FakeElement {
            kind: "body".into(),
            text: example_body(),
            ..Default::default()
        },
    );
    content.elements.insert(
        "h1".into(),
        FakeElement {
            kind: "h1".into(),
            text: "Example Domain".into(),
            ..Default::default()
        },
    );
    content.elements.insert(
        "a#more".into(),
        FakeElement {
            kind: "link".into(),
            text: "More information".into(),
            ..Default::default()
        },
    );
    content.elements.insert(
        "input#q".into(),
        FakeElement {
            kind: "input".into(),
            ..Default::default()
        },
    );
    browser.world.add_page(EXAMPLE_URL, content);
    Arc::new(browser)
}

fn test_config(data_dir: &TempDir) -> ServiceConfig {
    ServiceConfig {
        enable_adaptive_rate_limiting: false,
        enable_enhanced_mouse_movement: false,
        data_dir: data_dir.path().join("data"),
        screenshots_dir: data_dir.path().join("screenshots"),
        ..ServiceConfig::default()
    }
}

async fn service_with(config: ServiceConfig, browser: Arc<FakeBrowser>) -> PagePilot {
    PagePilot::with_driver(config, browser)
        .await
        .expect("service builds")
}

#[tokio::test]
async fn resource_limit_on_second_session() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        max_sessions: 1,
        ..test_config(&dir)
    };
    let service = service_with(config, example_world()).await;

    service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("first session");

    let err = service
        .create_session(SessionOptions::default(), None)
        .await
        .unwrap_err();
    match err {
        ServiceError::ResourceLimit {
            resource,
            limit,
            current,
        } => {
            assert_eq!(resource, "sessions");
            assert_eq!(limit, 1);
            assert_eq!(current, 1);
        }
        other => panic!("expected ResourceLimit, got {other:?}"),
    }
    service.shutdown().await;
}

#[tokio::test]
async fn navigate_updates_session_and_counters() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");

    let result = service
        .navigate(
            &session.session_id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::NetworkIdle,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    assert!(result.success);
    assert_eq!(result.url, EXAMPLE_URL);
    assert!(!result.title.is_empty());

    let stats = service.session_stats(&session.session_id).await.expect("stats");
    assert_eq!(stats.stats.pages_loaded, 1);
    assert_eq!(stats.url.as_deref(), Some(EXAMPLE_URL));
    service.shutdown().await;
}

#[tokio::test]
async fn extract_text_from_selector() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let result = service
        .extract(
            &id,
            ExtractRequest {
                extract_type: ExtractType::Text,
                selector: Some("h1".to_string()),
                timeout_ms: None,
            },
        )
        .await
        .expect("extract");

    let content = result.content.as_str().expect("text content");
    assert!(!content.is_empty());

    let raw = &result.data["raw_content"];
    assert!(raw["length"].as_u64().unwrap() as usize >= content.chars().count());
    // The page has substantial body content; no CAPTCHA condition applies.
    assert_eq!(raw["is_captcha"], serde_json::json!(false));
    service.shutdown().await;
}

#[tokio::test]
async fn extract_table_fails_when_absent() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let err = service
        .extract(
            &id,
            ExtractRequest {
                extract_type: ExtractType::Table,
                selector: None,
                timeout_ms: None,
            },
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::BrowserOperation { operation, .. } => {
            assert_eq!(operation, "extract_table");
        }
        other => panic!("expected BrowserOperation, got {other:?}"),
    }
    service.shutdown().await;
}

#[tokio::test]
async fn ttl_expiry_invalidates_and_unlists() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        session_ttl_secs: 1,
        ..test_config(&dir)
    };
    let service = service_with(config, example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let err = service.get_session(&session.session_id).await.unwrap_err();
    match err {
        ServiceError::InvalidSession { reason, .. } => {
            assert!(reason.contains("Session expired"));
        }
        other => panic!("expected InvalidSession, got {other:?}"),
    }
    assert!(service.list_sessions(None).await.is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn close_session_is_idempotent_to_callers() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");

    service
        .close_session(&session.session_id)
        .await
        .expect("first close");
    let err = service.close_session(&session.session_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound { .. }));
    service.shutdown().await;
}

#[tokio::test]
async fn interact_requires_value_for_type_actions() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");

    let err = service
        .interact(
            &session.session_id,
            InteractRequest {
                action: InteractionAction::Type,
                selector: "input#q".to_string(),
                value: None,
                options: Default::default(),
                timeout_ms: None,
            },
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::Validation { field, .. } => assert_eq!(field, "value"),
        other => panic!("expected Validation, got {other:?}"),
    }
    service.shutdown().await;
}

#[tokio::test]
async fn interact_click_and_type_succeed() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let click = service
        .interact(
            &id,
            InteractRequest {
                action: InteractionAction::Click,
                selector: "a#more".to_string(),
                value: None,
                options: Default::default(),
                timeout_ms: None,
            },
        )
        .await
        .expect("click");
    assert!(click.success);

    let typed = service
        .interact(
            &id,
            InteractRequest {
                action: InteractionAction::Type,
                selector: "input#q".to_string(),
                value: Some("query".to_string()),
                options: Default::default(),
                timeout_ms: None,
            },
        )
        .await
        .expect("type");
    assert!(typed.success);

    let stats = service.session_stats(&id).await.expect("stats");
    assert_eq!(stats.stats.interactions, 2);
    service.shutdown().await;
}

#[tokio::test]
async fn screenshot_writes_default_path() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let screenshots_dir = config.screenshots_dir.clone();
    let service = service_with(config, example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let result = service
        .screenshot(&id, ScreenshotRequest::default())
        .await
        .expect("screenshot");

    assert!(result.success);
    assert!(result.size_bytes > 0);
    let path = std::path::Path::new(&result.path);
    assert!(path.starts_with(&screenshots_dir));
    let name = path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with(&format!("{id}_")));
    assert!(name.ends_with(".png"));
    assert!(path.exists());

    let stats = service.session_stats(&id).await.expect("stats");
    assert_eq!(stats.stats.screenshots, 1);
    service.shutdown().await;
}

#[tokio::test]
async fn batch_preserves_order_and_captures_failures() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    let request = BatchRequest {
        operations: vec![
            BatchOperation::Navigate(NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            }),
            BatchOperation::Extract(ExtractRequest {
                extract_type: ExtractType::Text,
                selector: Some("h1".to_string()),
                timeout_ms: Some(2_000),
            }),
            BatchOperation::Extract(ExtractRequest {
                extract_type: ExtractType::Text,
                selector: Some("#does-not-exist".to_string()),
                timeout_ms: Some(2_000),
            }),
            BatchOperation::DetectCaptcha {
                selector: None,
                timeout_ms: None,
            },
        ],
        parallel: true,
        max_concurrent: 2,
    };

    let result = service.batch(&id, request).await.expect("batch");

    assert_eq!(result.total_operations, 4);
    assert_eq!(result.results.len(), 4);
    let names: Vec<&str> = result
        .results
        .iter()
        .map(|r| r.operation.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["navigate", "extract", "extract", "detect_captcha"]
    );

    assert!(result.results[0].success);
    assert!(result.results[1].success);
    assert!(!result.results[2].success, "missing selector must fail");
    assert!(result.results[2].error.is_some());
    assert!(result.results[3].success);
    assert_eq!(result.successful_operations, 3);
    assert_eq!(result.failed_operations, 1);
    assert!(!result.success);
    service.shutdown().await;
}

#[tokio::test]
async fn parallel_batch_never_overlaps_page_work() {
    let dir = TempDir::new().unwrap();
    let browser = example_world();
    let world = Arc::clone(&browser.world);
    world.set_nav_delay(std::time::Duration::from_millis(50));

    let service = service_with(test_config(&dir), browser).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");

    let navigate = || {
        BatchOperation::Navigate(NavigateRequest {
            url: EXAMPLE_URL.to_string(),
            wait_until: pagepilot::WaitUntil::Load,
            timeout_ms: None,
        })
    };
    let request = BatchRequest {
        operations: vec![navigate(), navigate(), navigate(), navigate()],
        parallel: true,
        max_concurrent: 2,
    };

    let result = service
        .batch(&session.session_id, request)
        .await
        .expect("batch");
    assert_eq!(result.results.len(), 4);
    assert!(result.success);

    // The per-session lock serializes the underlying page operations even
    // in a parallel batch.
    assert_eq!(world.max_in_flight.load(Ordering::SeqCst), 1);
    service.shutdown().await;
}

#[tokio::test]
async fn operation_input_validation() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    // Unparseable URL.
    let err = service
        .navigate(
            &id,
            NavigateRequest {
                url: "definitely not a url".into(),
                wait_until: Default::default(),
                timeout_ms: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "url"));

    // Timeout outside 1s..=300s.
    for bad_timeout in [999, 300_001] {
        let err = service
            .navigate(
                &id,
                NavigateRequest {
                    url: EXAMPLE_URL.into(),
                    wait_until: Default::default(),
                    timeout_ms: Some(bad_timeout),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "timeout"));
    }

    // Screenshot quality out of range.
    let err = service
        .screenshot(
            &id,
            ScreenshotRequest {
                quality: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { ref field, .. } if field == "quality"));

    // Operations against unknown sessions.
    let err = service
        .navigate(
            "sess_ffffffff",
            NavigateRequest {
                url: EXAMPLE_URL.into(),
                wait_until: Default::default(),
                timeout_ms: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound { .. }));
    service.shutdown().await;
}

#[tokio::test]
async fn detect_captcha_reports_clean_page() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.into(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let result = service
        .detect_captcha(&id, None, None)
        .await
        .expect("detect");
    assert!(!result.is_captcha);
    assert!(result.content_length > 0);
    assert_eq!(result.url, EXAMPLE_URL);
    service.shutdown().await;
}

#[tokio::test]
async fn structured_extraction_attaches_page_metadata() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.into(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let result = service
        .extract_structured(&id, Some("news".into()), None, None)
        .await
        .expect("extract_structured");
    assert!(result.success);
    assert_eq!(result.content_type, "news");
    assert_eq!(result.data["page_metadata"]["url"], EXAMPLE_URL);
    service.shutdown().await;
}

#[tokio::test]
async fn pacer_sees_operation_outcomes() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        enable_adaptive_rate_limiting: true,
        adaptive_rate_base_delay: 0.01,
        adaptive_rate_min_delay: 0.001,
        adaptive_rate_max_delay: 0.05,
        ..test_config(&dir)
    };
    let service = service_with(config, example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    for _ in 0..2 {
        service
            .navigate(
                &id,
                NavigateRequest {
                    url: EXAMPLE_URL.into(),
                    wait_until: pagepilot::WaitUntil::Load,
                    timeout_ms: None,
                },
            )
            .await
            .expect("navigate");
    }

    let stats = service.pacer_stats();
    assert_eq!(stats.total_requests, 2);
    assert!(stats.success_rate >= 0.1 && stats.success_rate <= 1.0);
    assert!(stats.current_delay >= 0.001 && stats.current_delay <= 0.05);
    service.shutdown().await;
}

#[tokio::test]
async fn site_memory_records_navigation_outcomes() {
    let dir = TempDir::new().unwrap();
    let service = service_with(test_config(&dir), example_world()).await;
    let session = service
        .create_session(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.session_id.clone();

    service
        .navigate(
            &id,
            NavigateRequest {
                url: EXAMPLE_URL.to_string(),
                wait_until: pagepilot::WaitUntil::Load,
                timeout_ms: None,
            },
        )
        .await
        .expect("navigate");

    let store = service.site_memory().expect("site memory enabled");
    let memory = store
        .get("https://example.com")
        .await
        .expect("query")
        .expect("origin recorded");
    assert_eq!(memory.access_count, 1);
    assert!(memory.success_rate > 0.0);
    service.shutdown().await;
}
