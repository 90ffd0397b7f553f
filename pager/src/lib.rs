//! trend-pager - keeps a PagerDuty incident in sync with a PostHog trend
//!
//! Every tick the [`Reconciler`] fetches the configured trend insight, checks
//! its two most recent data points against a threshold, and opens or resolves
//! a PagerDuty incident to match. The open incident's dedup key is kept in an
//! injected [`watch_common::KeyValueStore`] between ticks.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trend_pager::{FileConfig, Reconciler};
//! use watch_common::SqliteStore;
//!
//! let config = FileConfig::load()?.with_env()?.validate()?;
//! let cache = Arc::new(SqliteStore::open(SqliteStore::default_path()?)?);
//! let reconciler = Reconciler::new(&config, cache)?;
//! let action = reconciler.run_every_minute().await?;
//! ```

pub mod config;
pub mod error;
pub mod evaluator;
pub mod monitor;
pub mod pagerduty;
pub mod posthog;
pub mod reconciler;

pub use config::{FileConfig, WatchConfig};
pub use error::{WatchError, WatchResult};
pub use evaluator::{Operator, Verdict};
pub use monitor::{Monitor, MonitorConfig};
pub use pagerduty::{IncidentClient, ResolvePolicy, ACTIVE_INCIDENT_KEY};
pub use posthog::TrendFetcher;
pub use reconciler::{clear_active_incident, read_active_incident, Action, Reconciler};
