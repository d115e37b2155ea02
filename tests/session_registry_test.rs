//! Session registry behavior against the in-memory browser driver:
//! admission cap, TTL validation, idempotent close, exactly-once context
//! release, and counter monotonicity.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pagepilot::browser::fake::FakeBrowser;
use pagepilot::browser::pool::BrowserPool;
use pagepilot::registry::{SessionRegistry, StatsEvent};
use pagepilot::{ServiceConfig, ServiceError, SessionOptions};

fn example_body() -> String {
    "This domain is for use in illustrative examples in documents. ".repeat(12)
}

fn test_config() -> ServiceConfig {
    ServiceConfig {
        enable_adaptive_rate_limiting: false,
        enable_enhanced_mouse_movement: false,
        ..ServiceConfig::default()
    }
}

fn registry_with(config: ServiceConfig) -> (Arc<SessionRegistry>, Arc<FakeBrowser>) {
    let fake = Arc::new(FakeBrowser::with_page(
        "https://example.com",
        "Example Domain",
        &example_body(),
    ));
    let pool = Arc::new(BrowserPool::with_driver(fake.clone()));
    let registry = SessionRegistry::new(Arc::new(config), pool);
    (registry, fake)
}

#[tokio::test]
async fn create_assigns_well_formed_ids() {
    let (registry, fake) = registry_with(test_config());
    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");

    let id = &session.id;
    assert!(id.starts_with("sess_"));
    assert_eq!(id.len(), 13);
    assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(
        fake.world
            .contexts_created
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn admission_rejects_past_the_cap() {
    let config = ServiceConfig {
        max_sessions: 1,
        ..test_config()
    };
    let (registry, _fake) = registry_with(config);

    registry
        .create(SessionOptions::default(), None)
        .await
        .expect("first create fits");

    let err = registry
        .create(SessionOptions::default(), None)
        .await
        .expect_err("second create must be rejected");
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

    assert_eq!(registry.active_count().await, 1);
}

#[tokio::test]
async fn get_bumps_last_activity() {
    let (registry, _fake) = registry_with(test_config());
    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let before_call = Utc::now();
    let fetched = registry.get(&session.id).await.expect("get");
    assert!(fetched.last_activity() >= before_call);
}

#[tokio::test]
async fn get_validates_id_shape_and_existence() {
    let (registry, _fake) = registry_with(test_config());

    let err = registry.get("not-a-session").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));

    let err = registry.get("sess_00000000").await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound { .. }));
}

#[tokio::test]
async fn ttl_expiry_closes_and_removes_the_session() {
    let config = ServiceConfig {
        session_ttl_secs: 1,
        ..test_config()
    };
    let (registry, fake) = registry_with(config);

    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.id.clone();

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let err = registry.get(&id).await.unwrap_err();
    match err {
        ServiceError::InvalidSession { reason, .. } => {
            assert!(reason.contains("Session expired"), "reason: {reason}");
        }
        other => panic!("expected InvalidSession, got {other:?}"),
    }

    assert!(registry.list(None).await.is_empty());
    assert_eq!(
        fake.world
            .contexts_closed
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn close_is_idempotent_and_releases_once() {
    let (registry, fake) = registry_with(test_config());
    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.id.clone();

    registry.close(&id).await.expect("first close succeeds");
    let err = registry.close(&id).await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound { .. }));

    // The context was torn down exactly once.
    assert_eq!(
        fake.world
            .contexts_closed
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn quota_breach_invalidates_the_session() {
    let (registry, _fake) = registry_with(test_config());
    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.id.clone();

    // Default request quota is 1000; push past it.
    for _ in 0..1001 {
        registry.update_stats(&id, StatsEvent::Request, None).await;
    }

    let err = registry.get(&id).await.unwrap_err();
    match err {
        ServiceError::InvalidSession { reason, .. } => {
            assert!(reason.contains("max_requests"), "reason: {reason}");
        }
        other => panic!("expected InvalidSession, got {other:?}"),
    }
    assert!(registry.list(None).await.is_empty());
}

#[tokio::test]
async fn counters_update_monotonically() {
    let (registry, _fake) = registry_with(test_config());
    let session = registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    let id = session.id.clone();

    let mut previous = 0;
    for _ in 0..10 {
        registry
            .update_stats(&id, StatsEvent::Navigate, Some(Duration::from_millis(5)))
            .await;
        let snapshot = session.stats.snapshot();
        assert!(snapshot.pages_loaded >= previous);
        previous = snapshot.pages_loaded;
    }
    assert_eq!(session.stats.snapshot().pages_loaded, 10);
    assert_eq!(session.stats.snapshot().requests, 10);
    assert!(session.stats.snapshot().total_duration_secs > 0.0);

    // Unknown ids are a silent no-op.
    registry
        .update_stats("sess_ffffffff", StatsEvent::Request, None)
        .await;
}

#[tokio::test]
async fn list_filters_by_owner() {
    let (registry, _fake) = registry_with(test_config());
    registry
        .create(SessionOptions::default(), Some("alice".into()))
        .await
        .expect("create");
    registry
        .create(SessionOptions::default(), Some("bob".into()))
        .await
        .expect("create");

    assert_eq!(registry.list(None).await.len(), 2);
    let alice_only = registry.list(Some("alice")).await;
    assert_eq!(alice_only.len(), 1);
    assert_eq!(alice_only[0].owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn manual_reap_removes_expired_sessions() {
    let config = ServiceConfig {
        session_ttl_secs: 1,
        ..test_config()
    };
    let (registry, fake) = registry_with(config);

    registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    tokio::time::sleep(Duration::from_millis(1200)).await;

    registry.reap_expired().await;
    assert_eq!(registry.active_count().await, 0);
    assert_eq!(
        fake.world
            .contexts_closed
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn shutdown_closes_every_session() {
    let (registry, fake) = registry_with(test_config());
    registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");
    registry
        .create(SessionOptions::default(), None)
        .await
        .expect("create");

    registry.shutdown().await;
    assert_eq!(registry.active_count().await, 0);
    assert_eq!(
        fake.world
            .contexts_closed
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}
