use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use trend_pager::{
    clear_active_incident, read_active_incident, FileConfig, Monitor, MonitorConfig, Reconciler,
    WatchConfig,
};
use watch_common::{KeyValueStore, SqliteStore};

#[derive(Parser)]
#[command(name = "trend-pager")]
#[command(about = "Watch a PostHog trend and keep a PagerDuty incident in sync with it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: search for .trend-pager.toml)
    #[arg(long, short, env = "TREND_PAGER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Path to the incident cache database
    #[arg(long, env = "TREND_PAGER_CACHE", global = true)]
    cache: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the incident with the trend every interval
    Run {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
        /// Seconds between ticks (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Fetch and evaluate the trend without touching PagerDuty
    Check,
    /// Show the cached incident key
    Status,
    /// Forget the cached incident key without resolving it
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    watch_common::init_tracing("trend_pager")?;

    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => FileConfig::load_from_path(path)?,
        None => FileConfig::load()?,
    };

    // The cache comes first so status/clear work even when the rest of the
    // config does not validate
    let cache_path = match cli
        .cache
        .clone()
        .or_else(|| file_config.schedule.cache_path.clone())
    {
        Some(path) => path,
        None => SqliteStore::default_path()?,
    };
    let cache: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(cache_path)?);

    match cli.command {
        Commands::Status => match read_active_incident(cache.as_ref()).await? {
            Some(key) => println!("Active incident: {}", key),
            None => println!("No active incident"),
        },
        Commands::Clear => match clear_active_incident(cache.as_ref()).await? {
            Some(key) => println!("Cleared cached incident {}", key),
            None => println!("No active incident to clear"),
        },
        Commands::Run { once, interval } => {
            let config = file_config.with_env()?.validate()?;
            let reconciler = Reconciler::new(&config, cache)?;
            run_monitor(&config, reconciler, once, interval).await?;
        }
        Commands::Check => {
            let config = file_config.with_env()?.validate()?;
            let reconciler = Reconciler::new(&config, cache)?;
            let verdict = reconciler.evaluate_trend().await?;
            println!(
                "Trend is {} (threshold {} {})",
                verdict, config.alert.operator, config.alert.threshold
            );
        }
    }

    Ok(())
}

async fn run_monitor(
    config: &WatchConfig,
    reconciler: Reconciler,
    once: bool,
    interval: Option<u64>,
) -> Result<()> {
    let interval = match interval {
        Some(0) => anyhow::bail!("--interval must be greater than zero"),
        Some(secs) => std::time::Duration::from_secs(secs),
        None => config.schedule.interval,
    };

    let monitor = Monitor::new(MonitorConfig { once, interval }, reconciler);

    if once {
        let action = monitor.run_once().await?;
        println!("{}", action);
        Ok(())
    } else {
        monitor.run().await?;
        Ok(())
    }
}
