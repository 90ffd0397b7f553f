//! E2E: incident state survives a restart through the SQLite cache

use std::sync::Arc;

use tempfile::tempdir;
use trend_pager::{
    clear_active_incident, read_active_incident, Action, FileConfig, ACTIVE_INCIDENT_KEY,
};
use watch_common::{KeyValueStore, SqliteStore};

use crate::support::Upstreams;

#[tokio::test]
async fn test_incident_lifecycle_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let mut upstreams = Upstreams::start().await;
    let config = upstreams.config("10", "≥", None);

    // First process: trend is erroring, incident opens
    let erroring = upstreams.trend("[50, 60]").await;
    let trigger = upstreams.trigger("persisted-key").await;
    {
        let cache: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(path.clone()).unwrap());
        let action = upstreams
            .reconciler(&config, cache)
            .run_every_minute()
            .await
            .unwrap();
        assert_eq!(action, Action::Triggered("persisted-key".to_string()));
    }
    trigger.assert_async().await;
    erroring.remove_async().await;

    // Second process: trend recovered, the remembered key is resolved
    let _healthy = upstreams.trend("[1, 1]").await;
    let resolve = upstreams.resolve("persisted-key", 202).await;

    let cache: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(path).unwrap());
    let action = upstreams
        .reconciler(&config, cache.clone())
        .run_every_minute()
        .await
        .unwrap();

    assert_eq!(action, Action::Resolved("persisted-key".to_string()));
    assert_eq!(cache.get(ACTIVE_INCIDENT_KEY).await.unwrap(), None);
    resolve.assert_async().await;
}

#[tokio::test]
async fn test_status_and_clear_need_only_the_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.db");

    // Only the schedule section is present; the rest would not validate
    let file_config: FileConfig = toml::from_str(&format!(
        "[schedule]\ncache_path = {:?}\n",
        path.display().to_string()
    ))
    .unwrap();
    let cache_path = file_config.schedule.cache_path.clone().unwrap();
    assert!(file_config.validate().is_err());

    let store = SqliteStore::open(cache_path.clone()).unwrap();
    store
        .set(ACTIVE_INCIDENT_KEY, Some("stale-key"))
        .await
        .unwrap();

    let store = SqliteStore::open(cache_path).unwrap();
    assert_eq!(
        read_active_incident(&store).await.unwrap().as_deref(),
        Some("stale-key")
    );
    assert_eq!(
        clear_active_incident(&store).await.unwrap().as_deref(),
        Some("stale-key")
    );
    assert!(read_active_incident(&store).await.unwrap().is_none());
}
