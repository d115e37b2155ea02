//! Site memory store: round-trips, EMA law, window caps, expiry.

use std::time::Duration;

use pagepilot::site_memory::{
    DB_VERSION, MAX_PERF_SAMPLES, PerfSample, SiteMemory, SiteMemoryStore, SiteSortBy,
    SUCCESS_RATE_ALPHA,
};
use serde_json::json;
use tempfile::TempDir;

async fn open_store(ttl: Duration) -> (SiteMemoryStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let store = SiteMemoryStore::open(&dir.path().join("site_memory.db"), ttl)
        .await
        .expect("open store");
    (store, dir)
}

#[tokio::test]
async fn put_get_round_trip() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;

    let mut memory = SiteMemory::new("https://example.com");
    memory.access_count = 7;
    memory.success_rate = 0.85;
    memory.custom_data = json!({"note": "friendly site"});
    memory.extraction_patterns = json!({"headline": "h1.main"});
    memory.cookies = json!([{"name": "sid", "value": "abc"}]);
    store.put(&memory).await.expect("put");

    let loaded = store
        .get("https://example.com")
        .await
        .expect("get")
        .expect("row exists");
    assert_eq!(loaded.site_url, "https://example.com");
    assert_eq!(loaded.access_count, 7);
    assert!((loaded.success_rate - 0.85).abs() < 1e-9);
    assert_eq!(loaded.custom_data, json!({"note": "friendly site"}));
    assert_eq!(loaded.extraction_patterns, json!({"headline": "h1.main"}));
    assert_eq!(loaded.cookies, json!([{"name": "sid", "value": "abc"}]));
}

#[tokio::test]
async fn missing_origin_is_none() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;
    assert!(store.get("https://nowhere.invalid").await.unwrap().is_none());
}

#[tokio::test]
async fn success_rate_follows_ema() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;
    let origin = "https://ema.example.com";

    let outcomes = [true, true, false, true, false, false, true, true, true, false];

    // Independently computed EMA starting from the fresh-record default.
    let mut expected = 0.0f64;
    for &success in &outcomes {
        store.update_access(origin, success, None).await.expect("update");
        let outcome = if success { 1.0 } else { 0.0 };
        expected = (1.0 - SUCCESS_RATE_ALPHA) * expected + SUCCESS_RATE_ALPHA * outcome;
    }

    let memory = store.get(origin).await.unwrap().unwrap();
    assert!(
        (memory.success_rate - expected).abs() < 1e-9,
        "stored {} vs expected {}",
        memory.success_rate,
        expected
    );
    assert_eq!(memory.access_count, outcomes.len() as i64);
}

#[tokio::test]
async fn perf_windows_are_capped_with_running_average() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;
    let origin = "https://perf.example.com";

    for i in 0..(MAX_PERF_SAMPLES + 20) {
        store
            .update_access(
                origin,
                true,
                Some(PerfSample {
                    load_time: Some(i as f64),
                    ..Default::default()
                }),
            )
            .await
            .expect("update");
    }

    let memory = store.get(origin).await.unwrap().unwrap();
    let window = memory.performance_metrics["load_time"].as_array().unwrap();
    assert_eq!(window.len(), MAX_PERF_SAMPLES);

    // Newest samples are retained.
    let last = window.last().unwrap().as_f64().unwrap();
    assert_eq!(last, (MAX_PERF_SAMPLES + 19) as f64);
    let first = window.first().unwrap().as_f64().unwrap();
    assert_eq!(first, 20.0);

    let avg = memory.performance_metrics["load_time_avg"].as_f64().unwrap();
    let expected: f64 =
        window.iter().filter_map(|v| v.as_f64()).sum::<f64>() / window.len() as f64;
    assert!((avg - expected).abs() < 1e-9);
}

#[tokio::test]
async fn blob_updates_merge_fields() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;
    let origin = "https://merge.example.com";

    let mut first = serde_json::Map::new();
    first.insert("headline".into(), json!("h1"));
    store
        .update_extraction_patterns(origin, &first)
        .await
        .expect("update");

    let mut second = serde_json::Map::new();
    second.insert("byline".into(), json!(".author"));
    second.insert("headline".into(), json!("h1.main"));
    store
        .update_extraction_patterns(origin, &second)
        .await
        .expect("update");

    let memory = store.get(origin).await.unwrap().unwrap();
    assert_eq!(memory.extraction_patterns["headline"], json!("h1.main"));
    assert_eq!(memory.extraction_patterns["byline"], json!(".author"));

    let mut selectors = serde_json::Map::new();
    selectors.insert("login".into(), json!("#login-btn"));
    store
        .update_optimal_selectors(origin, &selectors)
        .await
        .expect("update");
    let memory = store.get(origin).await.unwrap().unwrap();
    assert_eq!(memory.optimal_selectors["login"], json!("#login-btn"));
    // Earlier blobs survive unrelated updates.
    assert_eq!(memory.extraction_patterns["byline"], json!(".author"));
}

#[tokio::test]
async fn cleanup_removes_only_expired_rows() {
    let (store, _dir) = open_store(Duration::from_millis(200)).await;

    let mut stale = SiteMemory::new("https://stale.example.com");
    stale.last_accessed = 1.0; // epoch-adjacent, far past the TTL
    store.put(&stale).await.expect("put");

    let fresh = SiteMemory::new("https://fresh.example.com");
    store.put(&fresh).await.expect("put");

    let deleted = store.cleanup_expired().await.expect("cleanup");
    assert_eq!(deleted, 1);
    assert!(store.get("https://stale.example.com").await.unwrap().is_none());
    assert!(store.get("https://fresh.example.com").await.unwrap().is_some());
}

#[tokio::test]
async fn stats_and_top_projections() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;

    for (origin, accesses, rate) in [
        ("https://a.example.com", 5, 0.9),
        ("https://b.example.com", 50, 0.2),
        ("https://c.example.com", 20, 0.7),
    ] {
        let mut memory = SiteMemory::new(origin);
        memory.access_count = accesses;
        memory.success_rate = rate;
        store.put(&memory).await.expect("put");
    }

    let stats = store.stats().await.expect("stats");
    assert_eq!(stats.total_sites, 3);
    assert_eq!(stats.total_accesses, 75);

    let by_access = store.top(2, SiteSortBy::AccessCount).await.expect("top");
    assert_eq!(by_access.len(), 2);
    assert_eq!(by_access[0].site_url, "https://b.example.com");

    let by_rate = store.top(1, SiteSortBy::SuccessRate).await.expect("top");
    assert_eq!(by_rate[0].site_url, "https://a.example.com");
}

#[tokio::test]
async fn search_by_pattern_matches_exact_values() {
    let (store, _dir) = open_store(Duration::from_secs(3600)).await;

    let mut patterns = serde_json::Map::new();
    patterns.insert("layout".into(), json!("grid"));
    store
        .update_extraction_patterns("https://grid.example.com", &patterns)
        .await
        .expect("update");

    let mut other = serde_json::Map::new();
    other.insert("layout".into(), json!("list"));
    store
        .update_extraction_patterns("https://list.example.com", &other)
        .await
        .expect("update");

    let matches = store
        .search_by_pattern("layout", &json!("grid"))
        .await
        .expect("search");
    assert_eq!(matches, vec!["https://grid.example.com".to_string()]);
}

#[tokio::test]
async fn reopen_preserves_data_and_schema_version() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("site_memory.db");

    {
        let store = SiteMemoryStore::open(&path, Duration::from_secs(3600))
            .await
            .expect("open");
        store
            .update_access("https://persist.example.com", true, None)
            .await
            .expect("update");
    }

    let store = SiteMemoryStore::open(&path, Duration::from_secs(3600))
        .await
        .expect("reopen");
    let memory = store
        .get("https://persist.example.com")
        .await
        .unwrap()
        .expect("row survived reopen");
    assert_eq!(memory.access_count, 1);
    // Reopen is idempotent with respect to migration.
    assert_eq!(DB_VERSION, 2);
}
