//! PostHog trend fetcher
//!
//! Resolves the short insight id embedded in a trend URL and pulls the
//! insight's latest computed result from the PostHog REST API.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::config::PosthogSettings;
use crate::error::{WatchError, WatchResult};

static INSIGHT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/insights/([a-zA-Z0-9]+)$").expect("Invalid insight id regex"));

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    results: Vec<Insight>,
}

/// A saved PostHog insight with its cached result
#[derive(Debug, Clone, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub filters: InsightFilters,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub result: Vec<TrendSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightFilters {
    /// Insight kind, e.g. "TRENDS" or "FUNNELS"
    #[serde(default)]
    pub insight: String,
}

/// One series of a trends insight
#[derive(Debug, Clone, Deserialize)]
pub struct TrendSeries {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<f64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Insight id extraction
// ============================================================================

/// Extract the short insight id from a trend URL such as
/// `https://app.posthog.com/insights/abc123`.
///
/// The path must start with `/insights` and end with `/insights/<id>`, where
/// the id is one or more ASCII alphanumerics.
pub fn insight_id_from_url(trend_url: &Url) -> WatchResult<String> {
    let invalid = || WatchError::InvalidConfiguration(format!("not a valid trends URL: {}", trend_url));

    let path = trend_url.path();
    if !path.starts_with("/insights") {
        return Err(invalid());
    }

    INSIGHT_ID_REGEX
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(invalid)
}

// ============================================================================
// Fetcher
// ============================================================================

/// Queries PostHog for the configured trend
#[derive(Clone)]
pub struct TrendFetcher {
    http_client: reqwest::Client,
    api_url: Url,
    api_key: String,
    insight_id: String,
}

impl TrendFetcher {
    /// Build a fetcher; fails if the trend URL carries no insight id
    pub fn new(http_client: reqwest::Client, settings: &PosthogSettings) -> WatchResult<Self> {
        let insight_id = insight_id_from_url(&settings.trend_url)?;

        let mut api_url = settings
            .host
            .join(&format!("/api/projects/{}/insights", settings.project_id))
            .map_err(|e| {
                WatchError::InvalidConfiguration(format!(
                    "cannot build insights URL from host {}: {}",
                    settings.host, e
                ))
            })?;
        api_url
            .query_pairs_mut()
            .append_pair("short_id", &insight_id);

        Ok(Self {
            http_client,
            api_url,
            api_key: settings.api_key.clone(),
            insight_id,
        })
    }

    /// The short id resolved from the trend URL
    pub fn insight_id(&self) -> &str {
        &self.insight_id
    }

    /// The fully-built insights API URL
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Fetch the insight; `None` if PostHog returned no matching insight
    pub async fn fetch_latest(&self) -> WatchResult<Option<Insight>> {
        tracing::debug!(url = %self.api_url, "Fetching PostHog insight");

        let response = self
            .http_client
            .get(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WatchError::upstream("PostHog", response).await);
        }

        let body: InsightsResponse = response.json().await?;
        Ok(body.results.into_iter().next())
    }
}
