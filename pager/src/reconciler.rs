//! Incident reconciliation - the per-tick entry point
//!
//! Each tick compares two facts, whether an incident is cached as open and
//! whether the trend is erroring, and performs at most one incident call to
//! bring them back in line.

use std::fmt;
use std::sync::Arc;

use watch_common::KeyValueStore;

use crate::config::{AlertSettings, WatchConfig};
use crate::error::{WatchError, WatchResult};
use crate::evaluator::{self, Verdict};
use crate::pagerduty::{IncidentClient, ACTIVE_INCIDENT_KEY};
use crate::posthog::TrendFetcher;

/// What the reconciler decided to do, before doing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Incident open but the trend recovered
    Resolve(String),
    /// No incident open and the trend is erroring
    Trigger,
    /// Incident open and the trend is still erroring
    AlreadyOpen(String),
    /// No incident open and nothing is wrong
    AllClear,
}

/// Pure decision over (cached incident, verdict).
///
/// [`Verdict::Indeterminate`] counts as not erroring.
pub fn decide(active_incident: Option<&str>, verdict: Verdict) -> Decision {
    match (active_incident, verdict.is_erroring()) {
        (Some(key), false) => Decision::Resolve(key.to_string()),
        (None, true) => Decision::Trigger,
        (Some(key), true) => Decision::AlreadyOpen(key.to_string()),
        (None, false) => Decision::AllClear,
    }
}

/// What a completed tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Resolved(String),
    Triggered(String),
    Ignored(String),
    AllClear,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Resolved(key) => write!(f, "resolved incident {}", key),
            Action::Triggered(key) => write!(f, "triggered incident {}", key),
            Action::Ignored(key) => write!(f, "incident {} already open", key),
            Action::AllClear => write!(f, "all clear"),
        }
    }
}

/// Owns the collaborators for one watched trend
#[derive(Clone)]
pub struct Reconciler {
    fetcher: TrendFetcher,
    incidents: IncidentClient,
    cache: Arc<dyn KeyValueStore>,
    alert: AlertSettings,
}

impl Reconciler {
    /// Wire up the fetcher and incident client from validated config.
    ///
    /// Fails with [`WatchError::InvalidConfiguration`] if the trend URL holds
    /// no insight id.
    pub fn new(config: &WatchConfig, cache: Arc<dyn KeyValueStore>) -> WatchResult<Self> {
        Self::with_client(config, cache, reqwest::Client::new())
    }

    pub fn with_client(
        config: &WatchConfig,
        cache: Arc<dyn KeyValueStore>,
        http_client: reqwest::Client,
    ) -> WatchResult<Self> {
        let fetcher = TrendFetcher::new(http_client.clone(), &config.posthog)?;
        let incidents = IncidentClient::new(
            http_client,
            cache.clone(),
            &config.pagerduty,
            &config.posthog,
            &config.alert,
        );

        Ok(Self {
            fetcher,
            incidents,
            cache,
            alert: config.alert.clone(),
        })
    }

    /// Currently cached dedup key; an empty value counts as none
    pub async fn active_incident(&self) -> WatchResult<Option<String>> {
        read_active_incident(self.cache.as_ref()).await
    }

    /// Fetch the trend and evaluate it against the threshold
    pub async fn evaluate_trend(&self) -> WatchResult<Verdict> {
        let insight = self.fetcher.fetch_latest().await?.ok_or_else(|| {
            WatchError::InvalidInput(format!(
                "no insight found for short id {}",
                self.fetcher.insight_id()
            ))
        })?;

        evaluator::evaluate(&insight, self.alert.threshold, self.alert.operator)
    }

    /// Run one tick: read state and verdict concurrently, then reconcile
    pub async fn run_every_minute(&self) -> WatchResult<Action> {
        let (active_incident, verdict) =
            tokio::try_join!(self.active_incident(), self.evaluate_trend())?;

        tracing::debug!(?active_incident, %verdict, "Reconciling incident state");

        match decide(active_incident.as_deref(), verdict) {
            Decision::Resolve(key) => {
                self.incidents.resolve(&key).await?;
                tracing::info!(dedup_key = %key, "Resolved PagerDuty incident");
                Ok(Action::Resolved(key))
            }
            Decision::Trigger => {
                let key = self.incidents.trigger().await?;
                tracing::info!(dedup_key = %key, "Triggered PagerDuty incident");
                Ok(Action::Triggered(key))
            }
            Decision::AlreadyOpen(key) => {
                tracing::info!(
                    dedup_key = %key,
                    "PagerDuty incident is active, ignoring error for now"
                );
                Ok(Action::Ignored(key))
            }
            Decision::AllClear => {
                tracing::info!("All good, trend within threshold");
                Ok(Action::AllClear)
            }
        }
    }

    /// Forget the cached incident without contacting PagerDuty
    pub async fn clear_active_incident(&self) -> WatchResult<Option<String>> {
        clear_active_incident(self.cache.as_ref()).await
    }
}

/// Read the cached dedup key straight from a store.
///
/// Needs no PostHog or PagerDuty settings, so `status` works before the
/// rest of the config is valid.
pub async fn read_active_incident(cache: &dyn KeyValueStore) -> WatchResult<Option<String>> {
    let key = cache.get(ACTIVE_INCIDENT_KEY).await?;
    Ok(key.filter(|k| !k.is_empty()))
}

/// Drop the cached dedup key, returning the one that was there
pub async fn clear_active_incident(cache: &dyn KeyValueStore) -> WatchResult<Option<String>> {
    let previous = read_active_incident(cache).await?;
    cache.set(ACTIVE_INCIDENT_KEY, None).await?;
    Ok(previous)
}
