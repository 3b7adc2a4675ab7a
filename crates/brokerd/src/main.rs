//! brokerd — the sandbox broker daemon.
//!
//! Single binary that assembles the broker:
//! - Resource store (redb) with one pool per configured dialect
//! - Pool reconciler (stands in for the cluster controller)
//! - Metrics aggregator
//! - HTTP API (allocate, release, metrics, health)
//!
//! # Usage
//!
//! ```text
//! brokerd standalone --port 8080 --data-dir /var/lib/sandbox-broker --config broker.toml
//! brokerd print-config --config broker.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sandbox_api::{ApiState, build_router};
use sandbox_broker::{Allocator, BrokerConfig};
use sandbox_metrics::{FreeGauges, MetricsAggregator};
use sandbox_state::{ClusterClient, PoolReconciler, StateStore};

const DEFAULT_FILTER: &str = "info,brokerd=debug,sandbox=debug";

#[derive(Parser)]
#[command(name = "brokerd", about = "Sandbox database broker daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the broker with a local store and reconciler in one process.
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/sandbox-broker")]
        data_dir: PathBuf,

        /// Broker configuration file (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pool reconcile interval in seconds.
        #[arg(long, default_value = "1")]
        reconcile_interval: u64,

        /// Seconds a new instance stays pending before it turns ready.
        #[arg(long, default_value = "2")]
        startup_delay: u64,
    },

    /// Print the effective configuration as TOML.
    PrintConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
            reconcile_interval,
            startup_delay,
        } => {
            let config = load_config(config.as_deref())?;
            run_standalone(
                port,
                data_dir,
                config,
                Duration::from_secs(reconcile_interval),
                Duration::from_secs(startup_delay),
            )
            .await
        }
        Command::PrintConfig { config } => {
            print!("{}", load_config(config.as_deref())?.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BrokerConfig> {
    match path {
        Some(path) => {
            let config = BrokerConfig::from_file(path)
                .map_err(|e| anyhow::anyhow!("loading {}: {e}", path.display()))?;
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(BrokerConfig::default()),
    }
}

async fn run_standalone(
    port: u16,
    data_dir: PathBuf,
    config: BrokerConfig,
    reconcile_interval: Duration,
    startup_delay: Duration,
) -> anyhow::Result<()> {
    info!("sandbox broker starting in standalone mode");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("sandbox-broker.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let dialects = config.supported();
    for dialect in &dialects {
        if let Some(cfg) = config.dialect(*dialect) {
            let pool = store.ensure_pool(&cfg.pool, *dialect, cfg.initial_replicas)?;
            info!(%dialect, pool = %pool.name, replicas = pool.replicas, "pool ready");
        }
    }

    let client: Arc<dyn ClusterClient> = Arc::new(store.clone());
    let gauges = Arc::new(FreeGauges::new());
    let aggregator = MetricsAggregator::new(
        Arc::clone(&client),
        Arc::clone(&gauges),
        config.metrics.interval,
        config.metrics.require_ready,
        dialects,
    );
    let reconciler = PoolReconciler::new(store, startup_delay);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics_shutdown = shutdown_rx.clone();
    let reconcile_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let metrics_handle = tokio::spawn(async move {
        aggregator.run(metrics_shutdown).await;
    });

    let reconcile_handle = tokio::spawn(async move {
        reconciler.run(reconcile_interval, reconcile_shutdown).await;
    });

    // ── Start API server ───────────────────────────────────────

    let allocator = Allocator::new(client, Arc::new(config)).with_shutdown(shutdown_rx);
    let router = build_router(ApiState {
        allocator: Arc::new(allocator),
        gauges,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C; waiting allocations are cancelled.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c; shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = metrics_handle.await;
    let _ = reconcile_handle.await;

    info!("sandbox broker stopped");
    Ok(())
}
