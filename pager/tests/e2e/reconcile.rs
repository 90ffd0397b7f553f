//! E2E: the four reconciliation transitions

use std::sync::Arc;

use trend_pager::{Action, ACTIVE_INCIDENT_KEY};
use watch_common::{KeyValueStore, MemoryStore};

use crate::support::Upstreams;

#[tokio::test]
async fn test_erroring_trend_triggers_incident() {
    let mut upstreams = Upstreams::start().await;
    let trend = upstreams.trend("[10, 11]").await;
    let trigger = upstreams.trigger("dedup-new").await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = upstreams.config("10", "≥", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Triggered("dedup-new".to_string()));
    assert_eq!(
        cache.get(ACTIVE_INCIDENT_KEY).await.unwrap().as_deref(),
        Some("dedup-new")
    );
    trend.assert_async().await;
    trigger.assert_async().await;
}

#[tokio::test]
async fn test_recovered_trend_resolves_incident() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[5, 6]").await;
    let resolve = upstreams.resolve("abc", 202).await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "abc"));
    let config = upstreams.config("10", "≥", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Resolved("abc".to_string()));
    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
    resolve.assert_async().await;
}

#[tokio::test]
async fn test_open_incident_is_not_duplicated() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[0, 0]").await;
    let pagerduty = upstreams.no_pagerduty_calls().await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "existing"));
    let config = upstreams.config("0", "≤ less than or equal", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Ignored("existing".to_string()));
    assert_eq!(
        cache.get(ACTIVE_INCIDENT_KEY).await.unwrap().as_deref(),
        Some("existing")
    );
    pagerduty.assert_async().await;
}

#[tokio::test]
async fn test_healthy_trend_is_all_clear() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[3, 12, 9]").await;
    let pagerduty = upstreams.no_pagerduty_calls().await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = upstreams.config("10", "≥", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::AllClear);
    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
    pagerduty.assert_async().await;
}

#[tokio::test]
async fn test_empty_data_resolves_open_incident() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[]").await;
    let resolve = upstreams.resolve("stale", 202).await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, "stale"));
    let config = upstreams.config("10", "≥", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Resolved("stale".to_string()));
    resolve.assert_async().await;
}

#[tokio::test]
async fn test_empty_cached_key_counts_as_no_incident() {
    let mut upstreams = Upstreams::start().await;
    let _trend = upstreams.trend("[20, 30]").await;
    let trigger = upstreams.trigger("fresh").await;

    let cache: Arc<dyn KeyValueStore> =
        Arc::new(MemoryStore::with_entry(ACTIVE_INCIDENT_KEY, ""));
    let config = upstreams.config("10", "≥", None);
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Triggered("fresh".to_string()));
    trigger.assert_async().await;
}
