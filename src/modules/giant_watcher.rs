//! Giant Watcher - owns the giant list and the tracked set, and runs the
//! scheduled detection and movement checks

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::modules::classifier::Severity;
use crate::modules::giant_detector::{rank_by_balance, DetectedGiant, GiantDetector};
use crate::modules::movement_monitor::MovementMonitor;
use crate::utils::alerts::{
    format_number, AlertDetails, AlertLog, AlertType, NotificationDispatcher, WalletAlert,
};
use crate::utils::scheduler::PeriodicTask;
use crate::utils::settings::{NotificationConfig, SettingsError, SettingsStore};
use crate::utils::solscan::FetchError;
use crate::utils::{MetricsService, SolanaService};
use crate::{log_giant, log_wake};

const MODULE_NAME: &str = "giantWatcher";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("wallet {0} does not meet sleeping giant criteria")]
    NotAGiant(String),
    #[error("wallet data unavailable: {0}")]
    Upstream(#[from] FetchError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A wallet under movement watch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedWallet {
    pub address: String,
    /// Balance when last seen by detection
    pub sol_balance: f64,
    /// Baseline for movement checks; `None` until the first check
    pub last_signature: Option<String>,
    pub tracked_since: i64,
    pub last_checked: Option<i64>,
}

/// Watcher statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStats {
    pub giants: usize,
    pub tracked_wallets: usize,
    pub alerts: usize,
    pub is_monitoring: bool,
    pub is_running: bool,
}

/// Marks a wallet as being checked until dropped
pub struct InFlightCheck {
    in_flight: Arc<DashSet<String>>,
    address: String,
}

impl Drop for InFlightCheck {
    fn drop(&mut self) {
        self.in_flight.remove(&self.address);
    }
}

/// Giant Watcher; clones share one state
#[derive(Clone)]
pub struct GiantWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    config: Config,
    detector: GiantDetector,
    monitor: MovementMonitor,
    dispatcher: NotificationDispatcher,
    store: SettingsStore,
    metrics: Arc<MetricsService>,

    settings: RwLock<NotificationConfig>,
    giants: RwLock<Vec<DetectedGiant>>,
    tracked: DashMap<String, TrackedWallet>,
    in_flight: Arc<DashSet<String>>,

    is_running: AtomicBool,
    // Scheduled ticks hold only a weak reference, so dropping the last
    // watcher drops these and aborts the tasks
    movement_task: Mutex<Option<PeriodicTask>>,
    detection_task: Mutex<Option<PeriodicTask>>,
}

impl GiantWatcher {
    /// Create a new watcher; settings are loaded from `store`
    pub fn new(
        config: Config,
        detector: GiantDetector,
        monitor: MovementMonitor,
        dispatcher: NotificationDispatcher,
        store: SettingsStore,
        metrics: Arc<MetricsService>,
    ) -> Self {
        let settings = store.load();
        info!(
            target: "WATCHER",
            "Thresholds: {} SOL, {} days inactive",
            settings.min_balance,
            settings.inactivity_threshold
        );

        Self {
            inner: Arc::new(WatcherInner {
                config,
                detector,
                monitor,
                dispatcher,
                store,
                metrics,
                settings: RwLock::new(settings),
                giants: RwLock::new(Vec::new()),
                tracked: DashMap::new(),
                in_flight: Arc::new(DashSet::new()),
                is_running: AtomicBool::new(false),
                movement_task: Mutex::new(None),
                detection_task: Mutex::new(None),
            }),
        }
    }

    /// Start the scheduled tasks and kick off a first detection pass
    pub fn start(&self) {
        if self.inner.is_running.swap(true, Ordering::SeqCst) {
            warn!(target: "WATCHER", "Already running");
            return;
        }
        info!(target: "WATCHER", "🐋 Starting Giant Watcher...");

        let watcher = self.clone();
        tokio::spawn(async move {
            let candidates = watcher.inner.config.candidate_addresses.clone();
            watcher.refresh_giants(&candidates).await;
        });

        self.restart_detection_task();
        self.sync_movement_task();
        self.inner.metrics.set_module_status(MODULE_NAME, true);
    }

    /// Stop the watcher; scheduled tasks are cancelled
    pub fn stop(&self) {
        self.inner.is_running.store(false, Ordering::SeqCst);
        self.inner.detection_task.lock().take();
        self.inner.movement_task.lock().take();
        self.inner.metrics.set_module_status(MODULE_NAME, false);
        info!(target: "WATCHER", "Giant Watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// Whether the movement task is scheduled
    pub fn is_monitoring(&self) -> bool {
        self.inner.movement_task.lock().is_some()
    }

    /// Run detection over `addresses` (discovery when empty) and merge the
    /// result into the giant list. Returns this pass's giants.
    pub async fn refresh_giants(&self, addresses: &[String]) -> Vec<DetectedGiant> {
        let (min_balance, min_inactive_days) = self.thresholds();
        let found = self
            .inner
            .detector
            .detect_giant_wallets(addresses, min_balance, min_inactive_days)
            .await;
        self.merge_giants(&found);
        found
    }

    /// Check a single address and, when it qualifies, list and track it
    pub async fn add_wallet(&self, address: &str) -> Result<DetectedGiant, WatchError> {
        let address = address.trim();
        if !SolanaService::is_valid_address(address) {
            return Err(WatchError::InvalidAddress(address.to_string()));
        }

        let (min_balance, min_inactive_days) = self.thresholds();
        let giant = self
            .inner
            .detector
            .classify_address(address, min_balance, min_inactive_days)
            .await?;

        if !giant.qualifies {
            info!(
                target: "WATCHER",
                "{} does not meet the criteria",
                SolanaService::shorten_address(address, 4)
            );
            return Err(WatchError::NotAGiant(address.to_string()));
        }

        self.merge_giants(std::slice::from_ref(&giant));
        self.track(address)?;
        Ok(giant)
    }

    /// Start watching `address` for movement
    pub fn track(&self, address: &str) -> Result<TrackedWallet, WatchError> {
        let address = address.trim();
        if !SolanaService::is_valid_address(address) {
            return Err(WatchError::InvalidAddress(address.to_string()));
        }

        if let Some(existing) = self.inner.tracked.get(address) {
            debug!(
                target: "WATCHER",
                "Already tracking: {}",
                SolanaService::shorten_address(address, 4)
            );
            return Ok(existing.clone());
        }

        let sol_balance = self.giant_balance(address).unwrap_or(0.0);
        let wallet = TrackedWallet {
            address: address.to_string(),
            sol_balance,
            last_signature: None,
            tracked_since: Utc::now().timestamp(),
            last_checked: None,
        };
        self.inner.tracked.insert(address.to_string(), wallet.clone());
        self.inner.metrics.tracked_wallets.set(self.inner.tracked.len() as f64);
        info!(
            target: "WATCHER",
            "👀 Now tracking: {}",
            SolanaService::shorten_address(address, 4)
        );

        self.sync_movement_task();
        Ok(wallet)
    }

    /// Stop watching `address`; takes effect from the next tick
    pub fn untrack(&self, address: &str) -> bool {
        let removed = self.inner.tracked.remove(address.trim()).is_some();
        if removed {
            self.inner.metrics.tracked_wallets.set(self.inner.tracked.len() as f64);
            info!(
                target: "WATCHER",
                "Stopped tracking: {}",
                SolanaService::shorten_address(address, 4)
            );
            self.sync_movement_task();
        }
        removed
    }

    /// Flip tracking; returns whether the wallet is now tracked
    pub fn toggle_tracking(&self, address: &str) -> Result<bool, WatchError> {
        if self.is_tracked(address) {
            self.untrack(address);
            Ok(false)
        } else {
            self.track(address)?;
            Ok(true)
        }
    }

    pub fn is_tracked(&self, address: &str) -> bool {
        self.inner.tracked.contains_key(address.trim())
    }

    /// Claim the single-flight slot for `address`
    pub fn begin_check(&self, address: &str) -> Option<InFlightCheck> {
        if !self.inner.in_flight.insert(address.to_string()) {
            return None;
        }
        Some(InFlightCheck {
            in_flight: Arc::clone(&self.inner.in_flight),
            address: address.to_string(),
        })
    }

    /// One movement check for a tracked wallet. The first check records a
    /// baseline; later checks alert on new transactions.
    pub async fn check_wallet(&self, address: &str) -> Option<WalletAlert> {
        let Some(_in_flight) = self.begin_check(address) else {
            self.inner.metrics.skipped_checks.inc();
            debug!(
                target: "WATCHER",
                "Previous check still running for {}, skipping",
                SolanaService::shorten_address(address, 4)
            );
            return None;
        };

        let last_known = self.inner.tracked.get(address)?.last_signature.clone();
        let report = self.inner.monitor.check(address, last_known.as_deref()).await;

        // Untracked while the check ran: drop the result
        let tracked_balance = {
            let mut entry = self.inner.tracked.get_mut(address)?;
            entry.last_checked = Some(Utc::now().timestamp());
            if let Some(signature) = &report.latest_signature {
                entry.last_signature = Some(signature.clone());
            }
            entry.sol_balance
        };

        if !report.has_new_activity {
            return None;
        }
        let newest = report.new_transactions.first()?;

        let balance = self.giant_balance(address).unwrap_or(tracked_balance);
        let severity = Severity::from_balance(balance);
        let alert = WalletAlert {
            id: 0,
            wallet_address: address.to_string(),
            alert_type: AlertType::Transfer,
            severity,
            details: AlertDetails {
                signature: newest.signature.clone(),
                amount: newest.sol_moved(),
                token: "SOL".to_string(),
                new_transactions: report.new_transactions.len(),
                description: format!(
                    "Sleeping giant with {} SOL has awakened!",
                    format_number(balance)
                ),
            },
            timestamp: Utc::now().timestamp(),
        };

        self.inner.metrics
            .wakeups
            .with_label_values(&[severity.as_str()])
            .inc();
        log_wake!(
            "{} woke up: {} new transaction(s), {} severity",
            SolanaService::shorten_address(address, 4),
            report.new_transactions.len(),
            severity.as_str()
        );

        let settings = self.inner.settings.read().clone();
        Some(self.inner.dispatcher.dispatch(alert, &settings).await)
    }

    /// Replace the notification settings; a threshold change restarts the
    /// detection schedule.
    pub fn update_settings(
        &self,
        config: NotificationConfig,
    ) -> Result<NotificationConfig, WatchError> {
        self.inner.store.save(&config)?;

        let thresholds_changed = {
            let mut settings = self.inner.settings.write();
            let changed = settings.min_balance != config.min_balance
                || settings.inactivity_threshold != config.inactivity_threshold;
            *settings = config.clone();
            changed
        };

        if thresholds_changed && self.is_running() {
            info!(
                target: "WATCHER",
                "Thresholds changed to {} SOL / {} days, restarting detection",
                config.min_balance,
                config.inactivity_threshold
            );
            self.restart_detection_task();
        }
        Ok(config)
    }

    pub fn settings(&self) -> NotificationConfig {
        self.inner.settings.read().clone()
    }

    pub fn get_giants(&self) -> Vec<DetectedGiant> {
        self.inner.giants.read().clone()
    }

    /// Tracked wallets, oldest first
    pub fn get_tracked(&self) -> Vec<TrackedWallet> {
        let mut wallets: Vec<TrackedWallet> =
            self.inner.tracked.iter().map(|e| e.value().clone()).collect();
        wallets.sort_by_key(|w| w.tracked_since);
        wallets
    }

    pub fn alert_log(&self) -> &Arc<AlertLog> {
        self.inner.dispatcher.log()
    }

    pub fn get_stats(&self) -> WatcherStats {
        WatcherStats {
            giants: self.inner.giants.read().len(),
            tracked_wallets: self.inner.tracked.len(),
            alerts: self.alert_log().len(),
            is_monitoring: self.is_monitoring(),
            is_running: self.is_running(),
        }
    }

    fn thresholds(&self) -> (f64, u64) {
        let settings = self.inner.settings.read();
        (settings.min_balance, settings.inactivity_threshold)
    }

    fn giant_balance(&self, address: &str) -> Option<f64> {
        self.inner.giants
            .read()
            .iter()
            .find(|g| g.address() == address)
            .map(|g| g.sol_balance())
    }

    fn merge_giants(&self, found: &[DetectedGiant]) {
        let mut giants = self.inner.giants.write();
        for giant in found {
            match giants.iter_mut().find(|g| g.address() == giant.address()) {
                Some(existing) => *existing = giant.clone(),
                None => {
                    log_giant!(
                        "Sleeping giant: {} with {} SOL, {} days inactive",
                        SolanaService::shorten_address(giant.address(), 4),
                        format_number(giant.sol_balance()),
                        giant.inactive_days
                    );
                    giants.push(giant.clone());
                }
            }
            if let Some(mut tracked) = self.inner.tracked.get_mut(giant.address()) {
                tracked.sol_balance = giant.sol_balance();
            }
        }
        rank_by_balance(&mut giants);
        self.inner.metrics.giants.set(giants.len() as f64);
    }

    /// Upgrade handle for scheduled ticks; `None` once the watcher is gone
    fn downgrade(&self) -> Weak<WatcherInner> {
        Arc::downgrade(&self.inner)
    }

    fn restart_detection_task(&self) {
        let weak = self.downgrade();
        let task = PeriodicTask::spawn(
            "detection",
            Duration::from_secs(self.inner.config.detection_interval_secs),
            move || {
                let watcher = weak.upgrade().map(|inner| GiantWatcher { inner });
                async move {
                    let Some(watcher) = watcher else { return };
                    let candidates = watcher.inner.config.candidate_addresses.clone();
                    watcher.refresh_giants(&candidates).await;
                }
            },
        );
        // Replacing the previous task drops and aborts it
        *self.inner.detection_task.lock() = Some(task);
    }

    /// Keep the movement task alive exactly while running with a non-empty
    /// tracked set
    fn sync_movement_task(&self) {
        let mut slot = self.inner.movement_task.lock();
        let wanted = self.is_running() && !self.inner.tracked.is_empty();

        if !wanted {
            slot.take();
            return;
        }
        if slot.is_none() {
            let weak = self.downgrade();
            *slot = Some(PeriodicTask::spawn(
                "movement",
                Duration::from_secs(self.inner.config.monitor_interval_secs),
                move || {
                    if let Some(inner) = weak.upgrade() {
                        GiantWatcher { inner }.check_tracked_wallets();
                    }
                    async {}
                },
            ));
        }
    }

    /// Spawn one check per tracked wallet so a slow wallet delays no other
    fn check_tracked_wallets(&self) {
        let addresses: Vec<String> = self.inner.tracked.iter().map(|e| e.key().clone()).collect();
        debug!(target: "WATCHER", "Checking {} tracked wallet(s)", addresses.len());

        for address in addresses {
            let watcher = self.clone();
            tokio::spawn(async move {
                watcher.check_wallet(&address).await;
            });
        }
    }
}
