//! Giant Detector - finds large, long-dormant wallets

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::modules::classifier::{inactivity_days, is_giant_wallet};
use crate::utils::price::PriceOracle;
use crate::utils::solana::HolderDiscovery;
use crate::utils::solscan::{FetchError, WalletDataSource};
use crate::utils::{MetricsService, SolanaService};

/// Upper bound of a detection result
pub const MAX_GIANTS: usize = 10;
const DETECTION_CONCURRENCY: usize = 8;

/// Token position with its USD value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPosition {
    pub symbol: String,
    pub amount: f64,
    pub usd_value: f64,
}

/// Point-in-time view of a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,
    pub sol_balance: f64,
    pub token_holdings: Vec<TokenPosition>,
    /// Unix seconds of the most recent transaction, 0 when unknown
    pub last_activity: i64,
}

/// A classified wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedGiant {
    #[serde(flatten)]
    pub snapshot: WalletSnapshot,
    pub inactive_days: u64,
    pub total_value: f64,
    pub qualifies: bool,
}

impl DetectedGiant {
    pub fn address(&self) -> &str {
        &self.snapshot.address
    }

    pub fn sol_balance(&self) -> f64 {
        self.snapshot.sol_balance
    }
}

/// Sort by SOL balance, largest first
pub fn rank_by_balance(giants: &mut [DetectedGiant]) {
    giants.sort_by(|a, b| {
        b.sol_balance()
            .partial_cmp(&a.sol_balance())
            .unwrap_or(Ordering::Equal)
    });
}

/// Giant Detector
pub struct GiantDetector {
    source: Arc<dyn WalletDataSource>,
    discovery: Arc<dyn HolderDiscovery>,
    oracle: Option<Arc<dyn PriceOracle>>,
    metrics: Arc<MetricsService>,
    discovery_limit: usize,
}

impl GiantDetector {
    pub fn new(
        source: Arc<dyn WalletDataSource>,
        discovery: Arc<dyn HolderDiscovery>,
        oracle: Option<Arc<dyn PriceOracle>>,
        metrics: Arc<MetricsService>,
        discovery_limit: usize,
    ) -> Self {
        Self {
            source,
            discovery,
            oracle,
            metrics,
            discovery_limit,
        }
    }

    /// Classify `addresses` (or discovered top holders when empty) and
    /// return at most [`MAX_GIANTS`] qualifying wallets, richest first.
    ///
    /// A failure on one address is logged and skipped.
    pub async fn detect_giant_wallets(
        &self,
        addresses: &[String],
        min_balance: f64,
        min_inactive_days: u64,
    ) -> Vec<DetectedGiant> {
        self.metrics.detection_passes.inc();

        let candidates = if addresses.is_empty() {
            self.discover_candidates().await
        } else {
            addresses.to_vec()
        };

        if candidates.is_empty() {
            info!(target: "DETECTOR", "No candidate addresses to check");
            return Vec::new();
        }

        let sol_price = self.sol_price().await;
        let now = Utc::now().timestamp();

        let snapshots: Vec<Option<WalletSnapshot>> = stream::iter(candidates.clone())
            .map(|address| async move { self.snapshot(&address).await })
            .buffer_unordered(DETECTION_CONCURRENCY)
            .collect()
            .await;

        let mut giants: Vec<DetectedGiant> = snapshots
            .into_iter()
            .flatten()
            .map(|snapshot| classify(snapshot, sol_price, now, min_balance, min_inactive_days))
            .filter(|giant| giant.qualifies)
            .collect();

        rank_by_balance(&mut giants);
        giants.truncate(MAX_GIANTS);

        info!(
            target: "DETECTOR",
            "Detection pass: {} candidates, {} sleeping giants",
            candidates.len(),
            giants.len()
        );
        giants
    }

    async fn discover_candidates(&self) -> Vec<String> {
        match self.discovery.top_holders(self.discovery_limit).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(target: "DETECTOR", "Top-holder discovery failed: {}", e);
                Vec::new()
            }
        }
    }

    /// SOL/USD price for valuing native balances; 0 without an oracle
    async fn sol_price(&self) -> f64 {
        let Some(oracle) = &self.oracle else {
            return 0.0;
        };
        match oracle.sol_usd_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(target: "DETECTOR", "SOL price unavailable, valuing SOL at 0: {}", e);
                0.0
            }
        }
    }

    /// Classify one address, surfacing fetch failures to the caller
    pub async fn classify_address(
        &self,
        address: &str,
        min_balance: f64,
        min_inactive_days: u64,
    ) -> Result<DetectedGiant, FetchError> {
        let sol_price = self.sol_price().await;
        let snapshot = self.fetch_snapshot(address).await.map_err(|e| {
            self.record_failure(address, &e);
            e
        })?;
        Ok(classify(
            snapshot,
            sol_price,
            Utc::now().timestamp(),
            min_balance,
            min_inactive_days,
        ))
    }

    async fn snapshot(&self, address: &str) -> Option<WalletSnapshot> {
        match self.fetch_snapshot(address).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                self.record_failure(address, &e);
                None
            }
        }
    }

    /// Balance, latest transaction and holdings; a holdings failure only
    /// empties the holdings
    async fn fetch_snapshot(&self, address: &str) -> Result<WalletSnapshot, FetchError> {
        let (info, transactions, holdings) = tokio::join!(
            self.source.account_info(address),
            self.source.account_transactions(address, None, 1),
            self.source.token_holdings(address),
        );

        let info = info?;
        let transactions = transactions?;
        let holdings = holdings.unwrap_or_else(|e| {
            self.record_failure(address, &e);
            Vec::new()
        });

        let token_holdings = holdings
            .into_iter()
            .map(|token| TokenPosition {
                symbol: token.token_symbol,
                amount: token.token_amount.ui_amount.unwrap_or(0.0),
                usd_value: token.usd_value.unwrap_or(0.0),
            })
            .collect();

        Ok(WalletSnapshot {
            address: address.to_string(),
            sol_balance: info.sol_balance(),
            token_holdings,
            last_activity: transactions.first().map(|tx| tx.block_time).unwrap_or(0),
        })
    }

    fn record_failure(&self, address: &str, error: &FetchError) {
        self.metrics
            .fetch_failures
            .with_label_values(&[error.endpoint()])
            .inc();
        warn!(
            target: "DETECTOR",
            "Skipping data for {}: {}",
            SolanaService::shorten_address(address, 4),
            error
        );
    }
}

/// Derive inactivity and value, then classify
pub fn classify(
    snapshot: WalletSnapshot,
    sol_price: f64,
    now: i64,
    min_balance: f64,
    min_inactive_days: u64,
) -> DetectedGiant {
    let inactive_days = inactivity_days(snapshot.last_activity, now);
    let token_value: f64 = snapshot.token_holdings.iter().map(|t| t.usd_value).sum();
    let total_value = token_value + snapshot.sol_balance * sol_price;
    let qualifies = is_giant_wallet(
        snapshot.sol_balance,
        total_value,
        inactive_days,
        min_balance,
        min_inactive_days,
    );

    debug!(
        target: "DETECTOR",
        "{}: {:.2} SOL, ${:.2} total, {} days inactive, qualifies={}",
        SolanaService::shorten_address(&snapshot.address, 4),
        snapshot.sol_balance,
        total_value,
        inactive_days,
        qualifies
    );

    DetectedGiant {
        snapshot,
        inactive_days,
        total_value,
        qualifies,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::modules::classifier::SECONDS_PER_DAY;
    use crate::utils::solscan::{AccountInfo, AccountTransaction, TokenAmount, TokenHolding};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    #[derive(Clone)]
    pub(crate) struct FakeWallet {
        pub lamports: u64,
        pub transactions: Vec<AccountTransaction>,
        pub holdings: Vec<TokenHolding>,
    }

    /// In-memory data source; addresses in `failing` error on every call,
    /// addresses in `failing_holdings` only on the holdings call.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub wallets: parking_lot::Mutex<HashMap<String, FakeWallet>>,
        pub failing: HashSet<String>,
        pub failing_holdings: HashSet<String>,
    }

    fn unavailable(endpoint: &'static str) -> FetchError {
        FetchError::Status {
            endpoint,
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[async_trait]
    impl WalletDataSource for FakeSource {
        async fn account_info(&self, address: &str) -> Result<AccountInfo, FetchError> {
            if self.failing.contains(address) {
                return Err(unavailable("account"));
            }
            let wallets = self.wallets.lock();
            let wallet = wallets.get(address).ok_or_else(|| unavailable("account"))?;
            Ok(AccountInfo {
                account: address.to_string(),
                lamports: wallet.lamports,
                ..AccountInfo::default()
            })
        }

        async fn account_transactions(
            &self,
            address: &str,
            _before: Option<u64>,
            limit: usize,
        ) -> Result<Vec<AccountTransaction>, FetchError> {
            if self.failing.contains(address) {
                return Err(unavailable("account_transactions"));
            }
            let wallets = self.wallets.lock();
            Ok(wallets
                .get(address)
                .map(|w| w.transactions.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }

        async fn token_holdings(&self, address: &str) -> Result<Vec<TokenHolding>, FetchError> {
            if self.failing.contains(address) || self.failing_holdings.contains(address) {
                return Err(unavailable("account_tokens"));
            }
            let wallets = self.wallets.lock();
            Ok(wallets
                .get(address)
                .map(|w| w.holdings.clone())
                .unwrap_or_default())
        }
    }

    pub(crate) struct FakeDiscovery(pub Result<Vec<String>, String>);

    #[async_trait]
    impl HolderDiscovery for FakeDiscovery {
        async fn top_holders(&self, limit: usize) -> anyhow::Result<Vec<String>> {
            match &self.0 {
                Ok(addresses) => Ok(addresses.iter().take(limit).cloned().collect()),
                Err(e) => Err(anyhow!(e.clone())),
            }
        }
    }

    struct FixedPrice(f64);

    #[async_trait]
    impl PriceOracle for FixedPrice {
        async fn sol_usd_price(&self) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    pub(crate) fn tx(signature: &str, block_time: i64) -> AccountTransaction {
        AccountTransaction {
            signature: signature.to_string(),
            block_time,
            status: "success".to_string(),
            ..AccountTransaction::default()
        }
    }

    pub(crate) fn dormant_wallet(sol: u64, days_ago: i64) -> FakeWallet {
        let last = Utc::now().timestamp() - days_ago * SECONDS_PER_DAY;
        FakeWallet {
            lamports: sol * 1_000_000_000,
            transactions: vec![tx(&format!("sig-{}-{}", sol, days_ago), last)],
            holdings: Vec::new(),
        }
    }

    fn usdc(usd: f64) -> TokenHolding {
        TokenHolding {
            token_symbol: "USDC".to_string(),
            token_amount: TokenAmount {
                amount: format!("{}", (usd * 1e6) as u64),
                decimals: 6,
                ui_amount: Some(usd),
            },
            usd_value: Some(usd),
            ..TokenHolding::default()
        }
    }

    fn detector(source: FakeSource, discovery: FakeDiscovery, price: Option<f64>) -> GiantDetector {
        GiantDetector::new(
            Arc::new(source),
            Arc::new(discovery),
            price.map(|p| Arc::new(FixedPrice(p)) as Arc<dyn PriceOracle>),
            Arc::new(MetricsService::new()),
            1000,
        )
    }

    fn source_with(wallets: Vec<(&str, FakeWallet)>) -> FakeSource {
        let source = FakeSource::default();
        {
            let mut map = source.wallets.lock();
            for (address, wallet) in wallets {
                map.insert(address.to_string(), wallet);
            }
        }
        source
    }

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    async fn result_is_bounded_and_sorted_by_balance() {
        let wallets: Vec<(String, FakeWallet)> = (1..=15u64)
            .map(|i| (format!("wallet{}", i), dormant_wallet(10_000 + i * 1_000, 400)))
            .collect();
        let source = source_with(wallets.iter().map(|(a, w)| (a.as_str(), w.clone())).collect());
        let addresses: Vec<String> = wallets.iter().map(|(a, _)| a.clone()).collect();

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addresses, 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), MAX_GIANTS);
        assert!(giants
            .windows(2)
            .all(|w| w[0].sol_balance() >= w[1].sol_balance()));
        assert_eq!(giants[0].address(), "wallet15");
    }

    #[tokio::test]
    async fn one_failing_address_does_not_abort_batch() {
        let mut source = source_with(vec![
            ("broken", dormant_wallet(90_000, 400)),
            ("giant", dormant_wallet(20_000, 400)),
        ]);
        source.failing.insert("broken".to_string());

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["broken", "giant"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert_eq!(giants[0].address(), "giant");
    }

    #[tokio::test]
    async fn missing_holdings_count_as_zero_value() {
        let mut source = source_with(vec![("giant", dormant_wallet(20_000, 400))]);
        source.failing_holdings.insert("giant".to_string());

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["giant"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert!(giants[0].snapshot.token_holdings.is_empty());
        assert_eq!(giants[0].total_value, 0.0);
    }

    #[tokio::test]
    async fn active_and_small_wallets_are_filtered() {
        let source = source_with(vec![
            ("active", dormant_wallet(50_000, 3)),
            ("small", dormant_wallet(500, 400)),
            ("giant", dormant_wallet(12_000, 200)),
        ]);

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["active", "small", "giant"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert_eq!(giants[0].address(), "giant");
        assert!(giants[0].inactive_days >= 200);
        assert!(giants[0].qualifies);
    }

    #[tokio::test]
    async fn token_wealth_qualifies_low_sol_wallet() {
        let mut wallet = dormant_wallet(1, 365);
        wallet.holdings = vec![usdc(150_000.0), usdc(60_000.0)];
        let source = source_with(vec![("tokens", wallet)]);

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["tokens"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert_eq!(giants[0].total_value, 210_000.0);
    }

    #[tokio::test]
    async fn wallet_without_history_is_unboundedly_inactive() {
        let mut wallet = dormant_wallet(30_000, 0);
        wallet.transactions.clear();
        let source = source_with(vec![("silent", wallet)]);

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["silent"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert_eq!(giants[0].snapshot.last_activity, 0);
        assert_eq!(giants[0].inactive_days, u64::MAX);
    }

    #[tokio::test]
    async fn empty_input_falls_back_to_discovery() {
        let source = source_with(vec![
            ("staker1", dormant_wallet(40_000, 300)),
            ("staker2", dormant_wallet(25_000, 300)),
        ]);
        let discovery = FakeDiscovery(Ok(addrs(&["staker1", "staker2"])));

        let giants = detector(source, discovery, None)
            .detect_giant_wallets(&[], 10_000.0, 180)
            .await;

        let found: Vec<&str> = giants.iter().map(|g| g.address()).collect();
        assert_eq!(found, vec!["staker1", "staker2"]);
    }

    #[tokio::test]
    async fn failed_discovery_yields_empty_result() {
        let giants = detector(
            FakeSource::default(),
            FakeDiscovery(Err("rpc down".to_string())),
            None,
        )
        .detect_giant_wallets(&[], 10_000.0, 180)
        .await;

        assert!(giants.is_empty());
    }

    #[tokio::test]
    async fn single_address_surfaces_fetch_failure() {
        let mut source = source_with(vec![("active", dormant_wallet(50_000, 3))]);
        source.failing.insert("broken".to_string());
        let detector = detector(source, FakeDiscovery(Ok(vec![])), None);

        assert!(detector
            .classify_address("broken", 10_000.0, 180)
            .await
            .is_err());
        let active = detector
            .classify_address("active", 10_000.0, 180)
            .await
            .unwrap();
        assert!(!active.qualifies);
    }

    // SOL-to-USD valuation. Without an oracle native SOL contributes nothing
    // to totalValue (legacy behaviour); with one it is priced in.

    #[tokio::test]
    async fn sol_is_excluded_from_total_value_without_oracle() {
        let source = source_with(vec![("giant", dormant_wallet(20_000, 400))]);

        let giants = detector(source, FakeDiscovery(Ok(vec![])), None)
            .detect_giant_wallets(&addrs(&["giant"]), 10_000.0, 180)
            .await;

        assert_eq!(giants[0].total_value, 0.0);
    }

    #[tokio::test]
    async fn sol_is_priced_into_total_value_with_oracle() {
        // 5,000 SOL alone is under the 10,000 SOL threshold, but at $50
        // it is worth $250,000, above 20x the threshold
        let source = source_with(vec![("giant", dormant_wallet(5_000, 400))]);

        let giants = detector(source, FakeDiscovery(Ok(vec![])), Some(50.0))
            .detect_giant_wallets(&addrs(&["giant"]), 10_000.0, 180)
            .await;

        assert_eq!(giants.len(), 1);
        assert_eq!(giants[0].total_value, 250_000.0);
    }
}
