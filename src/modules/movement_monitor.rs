//! Movement Monitor - detects new activity on a tracked wallet

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::utils::solscan::{AccountTransaction, WalletDataSource};
use crate::utils::{MetricsService, SolanaService};

/// How many recent transactions a check looks at
pub const MOVEMENT_WINDOW: usize = 5;

/// Outcome of one movement check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReport {
    pub has_new_activity: bool,
    /// New transactions, newest first
    pub new_transactions: Vec<AccountTransaction>,
    /// Newest signature seen by this check; `None` when nothing was fetched
    pub latest_signature: Option<String>,
}

/// Movement Monitor
pub struct MovementMonitor {
    source: Arc<dyn WalletDataSource>,
    metrics: Arc<MetricsService>,
}

impl MovementMonitor {
    pub fn new(source: Arc<dyn WalletDataSource>, metrics: Arc<MetricsService>) -> Self {
        Self { source, metrics }
    }

    /// Compare the wallet's latest transactions against `last_known`.
    ///
    /// The first observation (`last_known == None`) never reports activity;
    /// the caller records `latest_signature` as its baseline. Fetch errors
    /// report no activity and are left to the next scheduled check.
    pub async fn check(&self, address: &str, last_known: Option<&str>) -> MovementReport {
        let transactions = match self
            .source
            .account_transactions(address, None, MOVEMENT_WINDOW)
            .await
        {
            Ok(txs) => txs,
            Err(e) => {
                self.metrics
                    .fetch_failures
                    .with_label_values(&[e.endpoint()])
                    .inc();
                warn!(
                    target: "MONITOR",
                    "Error monitoring wallet {}: {}",
                    SolanaService::shorten_address(address, 4),
                    e
                );
                return MovementReport::default();
            }
        };

        let report = compare_window(transactions, last_known);
        debug!(
            target: "MONITOR",
            "{}: {} new transaction(s)",
            SolanaService::shorten_address(address, 4),
            report.new_transactions.len()
        );
        report
    }
}

/// Diff a newest-first transaction window against the last known signature
pub fn compare_window(
    mut transactions: Vec<AccountTransaction>,
    last_known: Option<&str>,
) -> MovementReport {
    let latest_signature = transactions.first().map(|tx| tx.signature.clone());

    let Some(last_known) = last_known else {
        return MovementReport {
            latest_signature,
            ..MovementReport::default()
        };
    };

    match transactions.iter().position(|tx| tx.signature == last_known) {
        // Burst larger than the window: everything fetched is new
        None => MovementReport {
            has_new_activity: !transactions.is_empty(),
            new_transactions: transactions,
            latest_signature,
        },
        Some(index) => {
            transactions.truncate(index);
            MovementReport {
                has_new_activity: index > 0,
                new_transactions: transactions,
                latest_signature,
            }
        }
    }
}
