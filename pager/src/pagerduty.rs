//! PagerDuty Events API v2 client
//!
//! Triggers and resolves the single incident this watcher owns, keeping the
//! cached dedup key in step with every call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use watch_common::KeyValueStore;

use crate::config::{AlertSettings, PagerDutySettings, PosthogSettings};
use crate::error::{WatchError, WatchResult};

/// Cache key holding the dedup key of the open incident
pub const ACTIVE_INCIDENT_KEY: &str = "pagerduty_active_incident";

/// Default Events API v2 endpoint
pub const DEFAULT_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

const ACCEPT_HEADER: &str = "application/vnd.pagerduty+json;version=2";

/// What a non-success resolve response does to the cached key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Log the failure and clear the key anyway
    #[default]
    AlwaysClear,
    /// Fail the tick and keep the key so the next tick retries
    RequireSuccess,
}

impl std::str::FromStr for ResolvePolicy {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always_clear" => Ok(ResolvePolicy::AlwaysClear),
            "require_success" => Ok(ResolvePolicy::RequireSuccess),
            other => Err(WatchError::InvalidConfiguration(format!(
                "unknown resolve policy '{}' (expected always_clear or require_success)",
                other
            ))),
        }
    }
}

// ============================================================================
// Event Payload Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum EventAction {
    Trigger,
    Resolve,
}

#[derive(Debug, Serialize)]
struct TriggerEvent<'a> {
    routing_key: &'a str,
    event_action: EventAction,
    payload: TriggerPayload<'a>,
    links: Vec<Link<'a>>,
    custom_details: CustomDetails<'a>,
}

#[derive(Debug, Serialize)]
struct TriggerPayload<'a> {
    summary: String,
    source: &'a str,
    severity: &'static str,
}

#[derive(Debug, Serialize)]
struct Link<'a> {
    href: &'a str,
    text: &'static str,
}

#[derive(Debug, Serialize)]
struct CustomDetails<'a> {
    operator: &'a str,
    threshold: &'a str,
}

#[derive(Debug, Serialize)]
struct ResolveEvent<'a> {
    routing_key: &'a str,
    event_action: EventAction,
    dedup_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct EnqueueResponse {
    dedup_key: String,
}

// ============================================================================
// Client
// ============================================================================

/// Sends trigger/resolve events and records the outcome in the cache
#[derive(Clone)]
pub struct IncidentClient {
    http_client: reqwest::Client,
    cache: Arc<dyn KeyValueStore>,
    events_url: Url,
    routing_key: String,
    summary: String,
    source: String,
    trend_url: String,
    operator_label: String,
    threshold_label: String,
    resolve_policy: ResolvePolicy,
}

impl IncidentClient {
    pub fn new(
        http_client: reqwest::Client,
        cache: Arc<dyn KeyValueStore>,
        pagerduty: &PagerDutySettings,
        posthog: &PosthogSettings,
        alert: &AlertSettings,
    ) -> Self {
        Self {
            http_client,
            cache,
            events_url: pagerduty.events_url.clone(),
            routing_key: pagerduty.integration_key.clone(),
            summary: format!("{} - query returned 0", pagerduty.incident_summary),
            source: pagerduty.source.clone(),
            trend_url: posthog.trend_url.to_string(),
            operator_label: alert.operator_label.clone(),
            threshold_label: alert.threshold_label.clone(),
            resolve_policy: pagerduty.resolve_policy,
        }
    }

    /// Open a critical incident and cache its dedup key
    pub async fn trigger(&self) -> WatchResult<String> {
        let event = TriggerEvent {
            routing_key: &self.routing_key,
            event_action: EventAction::Trigger,
            payload: TriggerPayload {
                summary: self.summary.clone(),
                source: &self.source,
                severity: "critical",
            },
            links: vec![Link {
                href: &self.trend_url,
                text: "Posthog Trends API query url",
            }],
            custom_details: CustomDetails {
                operator: &self.operator_label,
                threshold: &self.threshold_label,
            },
        };

        let response = self.enqueue(&event).await?;
        if !response.status().is_success() {
            return Err(WatchError::upstream("PagerDuty", response).await);
        }

        let EnqueueResponse { dedup_key } = response.json().await?;
        self.cache
            .set(ACTIVE_INCIDENT_KEY, Some(dedup_key.as_str()))
            .await?;

        Ok(dedup_key)
    }

    /// Resolve the incident identified by `dedup_key` and clear the cache.
    ///
    /// Under [`ResolvePolicy::AlwaysClear`] a non-success status is only
    /// logged; under [`ResolvePolicy::RequireSuccess`] it fails the call and
    /// the key stays cached.
    pub async fn resolve(&self, dedup_key: &str) -> WatchResult<()> {
        let event = ResolveEvent {
            routing_key: &self.routing_key,
            event_action: EventAction::Resolve,
            dedup_key,
        };

        let response = self.enqueue(&event).await?;
        if !response.status().is_success() {
            match self.resolve_policy {
                ResolvePolicy::RequireSuccess => {
                    return Err(WatchError::upstream("PagerDuty", response).await);
                }
                ResolvePolicy::AlwaysClear => {
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    tracing::warn!(
                        status,
                        %body,
                        dedup_key,
                        "PagerDuty rejected resolve event, clearing cached incident anyway"
                    );
                }
            }
        }

        self.cache.set(ACTIVE_INCIDENT_KEY, None).await?;
        Ok(())
    }

    async fn enqueue<T: Serialize>(&self, event: &T) -> WatchResult<reqwest::Response> {
        let response = self
            .http_client
            .post(self.events_url.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .json(event)
            .send()
            .await?;
        Ok(response)
    }
}
