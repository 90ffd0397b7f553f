//! Configuration loading
//!
//! Settings come from `.trend-pager.toml` (found by walking up from the current
//! directory, then `~/.config/trend-pager/`) with environment variables taking
//! precedence. [`FileConfig::validate`] turns the raw strings into a typed
//! [`WatchConfig`] once, before the first tick.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use url::Url;

use crate::error::{WatchError, WatchResult};
use crate::evaluator::Operator;
use crate::pagerduty::{ResolvePolicy, DEFAULT_EVENTS_URL};

/// Config file name searched for on disk
pub const CONFIG_FILE_NAME: &str = ".trend-pager.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/trend-pager/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("trend-pager").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// Raw file configuration (.trend-pager.toml)
// ============================================================================

/// Top-level file configuration; every field is optional until validation
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub posthog: PosthogSection,
    #[serde(default)]
    pub alert: AlertSection,
    #[serde(default)]
    pub pagerduty: PagerDutySection,
    #[serde(default)]
    pub schedule: ScheduleSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct PosthogSection {
    pub project_id: Option<String>,
    pub host: Option<String>,
    pub trend_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertSection {
    /// Kept as text: it is echoed verbatim into the incident details
    pub threshold: Option<String>,
    pub operator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PagerDutySection {
    pub integration_key: Option<String>,
    pub incident_summary: Option<String>,
    /// Display name for the event source; defaults to the PostHog host
    pub source: Option<String>,
    pub events_url: Option<String>,
    pub resolve_policy: Option<ResolvePolicy>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    pub cache_path: Option<PathBuf>,
}

fn default_interval() -> u64 {
    60
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            cache_path: None,
        }
    }
}

impl FileConfig {
    /// Load config from .trend-pager.toml
    ///
    /// Falls back to an empty config (to be filled from the environment) when
    /// no file is found.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, relying on environment", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> WatchResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup; set values win over the file
    pub fn with_overrides<F>(mut self, lookup: F) -> WatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };

        set(&mut self.posthog.project_id, "POSTHOG_PROJECT_ID");
        set(&mut self.posthog.host, "POSTHOG_HOST");
        set(&mut self.posthog.trend_url, "POSTHOG_TREND_URL");
        set(&mut self.posthog.api_key, "POSTHOG_API_KEY");
        set(&mut self.alert.threshold, "TREND_THRESHOLD");
        set(&mut self.alert.operator, "TREND_OPERATOR");
        set(&mut self.pagerduty.integration_key, "PAGERDUTY_INTEGRATION_KEY");
        set(&mut self.pagerduty.incident_summary, "PAGERDUTY_INCIDENT_SUMMARY");
        set(&mut self.pagerduty.source, "PAGERDUTY_SOURCE");
        set(&mut self.pagerduty.events_url, "PAGERDUTY_EVENTS_URL");

        if let Some(policy) = lookup("PAGERDUTY_RESOLVE_POLICY").filter(|v| !v.is_empty()) {
            self.pagerduty.resolve_policy = Some(policy.parse()?);
        }

        Ok(self)
    }

    /// Validate every field and build the typed configuration
    pub fn validate(self) -> WatchResult<WatchConfig> {
        let host_text = required(self.posthog.host, "posthog.host")?;
        let host = parse_url(&host_text, "posthog.host")?;
        let trend_url_text = required(self.posthog.trend_url, "posthog.trend_url")?;
        let trend_url = parse_url(&trend_url_text, "posthog.trend_url")?;

        let posthog = PosthogSettings {
            project_id: required(self.posthog.project_id, "posthog.project_id")?,
            host,
            trend_url,
            api_key: required(self.posthog.api_key, "posthog.api_key")?,
        };

        let threshold_label = required(self.alert.threshold, "alert.threshold")?;
        let threshold = threshold_label.trim().parse::<f64>().map_err(|_| {
            WatchError::InvalidConfiguration(format!(
                "alert.threshold '{}' is not a number",
                threshold_label
            ))
        })?;
        if !threshold.is_finite() {
            return Err(WatchError::InvalidConfiguration(format!(
                "alert.threshold '{}' must be a finite number",
                threshold_label
            )));
        }
        let operator_label = required(self.alert.operator, "alert.operator")?;
        let alert = AlertSettings {
            threshold,
            threshold_label,
            operator: Operator::from_label(&operator_label),
            operator_label,
        };

        let events_url = match self.pagerduty.events_url {
            Some(url) => parse_url(&url, "pagerduty.events_url")?,
            None => parse_url(DEFAULT_EVENTS_URL, "pagerduty.events_url")?,
        };
        let pagerduty = PagerDutySettings {
            integration_key: required(self.pagerduty.integration_key, "pagerduty.integration_key")?,
            incident_summary: required(
                self.pagerduty.incident_summary,
                "pagerduty.incident_summary",
            )?,
            source: self.pagerduty.source.unwrap_or(host_text),
            events_url,
            resolve_policy: self.pagerduty.resolve_policy.unwrap_or_default(),
        };

        if self.schedule.interval_secs == 0 {
            return Err(WatchError::InvalidConfiguration(
                "schedule.interval_secs must be greater than zero".to_string(),
            ));
        }
        let schedule = ScheduleSettings {
            interval: Duration::from_secs(self.schedule.interval_secs),
            cache_path: self.schedule.cache_path,
        };

        Ok(WatchConfig {
            posthog,
            alert,
            pagerduty,
            schedule,
        })
    }
}

fn required(value: Option<String>, field: &str) -> WatchResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WatchError::InvalidConfiguration(format!("{} is required", field)))
}

fn parse_url(value: &str, field: &str) -> WatchResult<Url> {
    Url::parse(value).map_err(|e| {
        WatchError::InvalidConfiguration(format!("{} '{}' is not a valid URL: {}", field, value, e))
    })
}

// ============================================================================
// Validated configuration
// ============================================================================

/// Fully validated configuration, built once before the first tick
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub posthog: PosthogSettings,
    pub alert: AlertSettings,
    pub pagerduty: PagerDutySettings,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone)]
pub struct PosthogSettings {
    pub project_id: String,
    pub host: Url,
    pub trend_url: Url,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub threshold: f64,
    /// Threshold as configured, for incident details
    pub threshold_label: String,
    pub operator: Operator,
    /// Operator as configured, for incident details
    pub operator_label: String,
}

#[derive(Debug, Clone)]
pub struct PagerDutySettings {
    pub integration_key: String,
    pub incident_summary: String,
    pub source: String,
    pub events_url: Url,
    pub resolve_policy: ResolvePolicy,
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub interval: Duration,
    pub cache_path: Option<PathBuf>,
}
