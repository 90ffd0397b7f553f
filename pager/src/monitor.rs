//! Scheduler driving the reconciler
//!
//! Runs one tick immediately, then one per interval. Ticks are awaited in
//! sequence so they never overlap; a failed tick is logged and the next one
//! runs on schedule.

use std::future::Future;
use std::time::Duration;

use chrono::Local;
use tokio::time::MissedTickBehavior;

use crate::error::WatchResult;
use crate::reconciler::{Action, Reconciler};

/// Configuration for the monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Whether to run once or continuously
    pub once: bool,
    /// Time between ticks (for continuous mode)
    pub interval: Duration,
}

/// Tick counters for a finished loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub succeeded: u64,
    pub failed: u64,
}

/// The Monitor struct that schedules reconciliation ticks
pub struct Monitor {
    config: MonitorConfig,
    reconciler: Reconciler,
}

impl Monitor {
    pub fn new(config: MonitorConfig, reconciler: Reconciler) -> Self {
        Self { config, reconciler }
    }

    /// Run the monitor (once or until Ctrl-C based on config)
    pub async fn run(&self) -> WatchResult<()> {
        if self.config.once {
            self.run_once().await.map(|_| ())
        } else {
            let stats = self
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await;
            tracing::info!(
                succeeded = stats.succeeded,
                failed = stats.failed,
                "Monitor stopped"
            );
            Ok(())
        }
    }

    /// Run a single tick; errors propagate to the caller
    pub async fn run_once(&self) -> WatchResult<Action> {
        tracing::debug!(
            "[{}] Starting tick",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.reconciler.run_every_minute().await
    }

    /// Tick on the configured interval until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> TickStats
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Starting continuous monitor (interval: {}s)",
            self.config.interval.as_secs_f64()
        );

        let mut stats = TickStats::default();
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(action) => {
                            stats.succeeded += 1;
                            tracing::debug!(%action, "Tick complete");
                        }
                        Err(e) => {
                            stats.failed += 1;
                            tracing::error!("Tick failed: {}", e);
                        }
                    }
                }
            }
        }

        stats
    }
}
