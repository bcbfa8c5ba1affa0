//! GiantWatch - Solana Sleeping Giant Detector
//!
//! Finds large wallets that have been dormant for a long time and alerts
//! when a tracked one moves again:
//! - Giant detection over configured or discovered addresses
//! - Movement monitoring of tracked wallets
//! - Email, Telegram and Discord notifications
//!
//! This is a **monitoring-only** tool - no wallet or trading functionality.

mod config;
mod dashboard;
mod modules;
mod utils;

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use config::Config;
use dashboard::DashboardServer;
use modules::{GiantDetector, GiantWatcher, MovementMonitor};
use utils::price::PriceOracle;
use utils::solscan::WalletDataSource;
use utils::{
    init_logger, AlertLog, JupiterPriceOracle, MetricsService, NotificationDispatcher,
    SettingsStore, SolanaService, SolscanClient,
};

const BANNER: &str = r#"
    ╔═══════════════════════════════════════════════════════╗
    ║                                                       ║
    ║   🐋  GiantWatch - Solana Sleeping Giant Detector     ║
    ║   💤 Dormant Whales | 🚨 Wake-up Alerts | 📣 Notify   ║
    ║                                                       ║
    ╚═══════════════════════════════════════════════════════╝
"#;

/// GiantWatch application
pub struct GiantWatch {
    config: Config,
    solscan: SolscanClient,
    metrics: Arc<MetricsService>,
    watcher: GiantWatcher,
}

impl GiantWatch {
    /// Create a new GiantWatch instance
    pub fn new() -> Result<Self> {
        let config = Config::from_env();

        // Initialize services
        let metrics = Arc::new(MetricsService::new());
        let solscan = SolscanClient::new(&config.solscan_api_url, config.solscan_api_key.clone());
        let source: Arc<dyn WalletDataSource> = Arc::new(solscan.clone());
        let discovery = Arc::new(SolanaService::new(&config));
        let oracle = config
            .include_sol_value
            .then(|| Arc::new(JupiterPriceOracle::new(&config.jupiter_price_url)) as Arc<dyn PriceOracle>);
        let store = SettingsStore::new(&config.settings_db_path)?;

        // Initialize modules
        let detector = GiantDetector::new(
            Arc::clone(&source),
            discovery,
            oracle,
            Arc::clone(&metrics),
            config.discovery_limit,
        );
        let monitor = MovementMonitor::new(source, Arc::clone(&metrics));
        let dispatcher = NotificationDispatcher::with_default_channels(
            Arc::new(AlertLog::new()),
            config.email_relay_url.clone(),
            Arc::clone(&metrics),
        );

        let watcher = GiantWatcher::new(
            config.clone(),
            detector,
            monitor,
            dispatcher,
            store,
            Arc::clone(&metrics),
        );

        Ok(Self {
            config,
            solscan,
            metrics,
            watcher,
        })
    }

    /// Start GiantWatch
    pub async fn start(&self) -> Result<()> {
        println!("{}", BANNER);

        info!(target: "GIANTWATCH", "Initializing GiantWatch...");
        if self.config.candidate_addresses.is_empty() {
            info!(
                target: "GIANTWATCH",
                "No candidate addresses configured, using top-holder discovery (limit {})",
                self.config.discovery_limit
            );
        } else {
            info!(
                target: "GIANTWATCH",
                "{} candidate addresses configured",
                self.config.candidate_addresses.len()
            );
        }

        self.watcher.start();

        info!(target: "GIANTWATCH", "✅ Giant Watcher started");
        info!(target: "GIANTWATCH", "Dashboard: http://localhost:{}", self.config.dashboard_port);

        let dashboard = DashboardServer::new(
            self.config.clone(),
            self.watcher.clone(),
            self.solscan.clone(),
            Arc::clone(&self.metrics),
        );

        dashboard.start().await?;

        Ok(())
    }

    /// Graceful shutdown
    pub async fn shutdown(&self) {
        info!(target: "GIANTWATCH", "Shutting down...");

        self.watcher.stop();

        info!(target: "GIANTWATCH", "✅ Shutdown complete");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(target: "GIANTWATCH", "Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(target: "GIANTWATCH", "Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    let giantwatch = match GiantWatch::new() {
        Ok(app) => app,
        Err(e) => {
            error!(target: "GIANTWATCH", "Failed to initialize: {}", e);
            return Err(e);
        }
    };

    tokio::select! {
        result = giantwatch.start() => {
            if let Err(e) = result {
                error!(target: "GIANTWATCH", "Fatal error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            giantwatch.shutdown().await;
        }
    }

    Ok(())
}
