//! E2E: upstream failures and resolve policies

use std::sync::Arc;

use mockito::Matcher;
use trend_pager::{WatchError, ACTIVE_INCIDENT_KEY};
use watch_common::{KeyValueStore, MemoryStore};

use crate::support::{Upstreams, PROJECT_ID};

#[tokio::test]
async fn test_posthog_error_aborts_tick_and_leaves_cache() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams
        .posthog
        .mock("GET", format!("/api/projects/{}/insights", PROJECT_ID).as_str())
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;
    let pagerduty = upstreams.no_pagerduty_calls().await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "abc"));
    let config = upstreams.config("10", "≥", None);
    let err = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap_err();

    match err {
        WatchError::Upstream { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected upstream error, got {}", other),
    }
    assert_eq!(
        cache.get(ACTIVE_INCIDENT_KEY).await.unwrap().as_deref(),
        Some("abc")
    );
    pagerduty.assert_async().await;
}

#[tokio::test]
async fn test_non_trend_insight_is_invalid_input() {
    let mut upstreams = Upstreams::start().await;
    let _funnel = upstreams
        .posthog
        .mock("GET", format!("/api/projects/{}/insights", PROJECT_ID).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"results": [{"filters": {"insight": "FUNNELS"}, "result": []}]}"#)
        .create_async()
        .await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = upstreams.config("10", "≥", None);
    let err = upstreams
        .reconciler(&config, cache)
        .run_every_minute()
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::InvalidInput(_)));
}

#[tokio::test]
async fn test_missing_insight_is_invalid_input() {
    let mut upstreams = Upstreams::start().await;
    let _empty = upstreams
        .posthog
        .mock("GET", format!("/api/projects/{}/insights", PROJECT_ID).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"results": []}"#)
        .create_async()
        .await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = upstreams.config("10", "≥", None);
    let err = upstreams
        .reconciler(&config, cache)
        .run_every_minute()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("abc123"));
}

#[tokio::test]
async fn test_trigger_rejected_leaves_cache_empty() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[10, 11]").await;
    let _rejected = upstreams
        .pagerduty
        .mock("POST", "/v2/enqueue")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = upstreams.config("10", "≥", None);
    let err = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WatchError::Upstream {
            service: "PagerDuty",
            status: 429,
            ..
        }
    ));
    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_resolve_always_clear() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[1, 2]").await;
    let _resolve = upstreams.resolve("abc", 500).await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "abc"));
    let config = upstreams.config("10", "≥", Some("always_clear"));
    upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_resolve_require_success_retries_next_tick() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[1, 2]").await;
    let failing = upstreams.resolve("abc", 500).await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "abc"));
    let config = upstreams.config("10", "≥", Some("require_success"));
    let reconciler = upstreams.reconciler(&config, cache.clone());

    assert!(reconciler.run_every_minute().await.is_err());
    assert_eq!(
        cache.get(ACTIVE_INCIDENT_KEY).await.unwrap().as_deref(),
        Some("abc")
    );
    failing.remove_async().await;

    let succeeding = upstreams.resolve("abc", 202).await;
    reconciler.run_every_minute().await.unwrap();
    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
    succeeding.assert_async().await;
}
