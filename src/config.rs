//! Configuration module for GiantWatch

use std::env;
use tracing::warn;

/// Application configuration loaded from environment variables.
///
/// Notification channels and detection thresholds are not part of this
/// struct; they live in the persisted settings blob
/// (see [`crate::utils::settings`]).
#[derive(Debug, Clone)]
pub struct Config {
    // Solscan-style data API
    pub solscan_api_url: String,
    pub solscan_api_key: Option<String>,

    // Solana RPC (read-only, used for top-holder discovery)
    pub rpc_url: String,

    // SOL price
    pub jupiter_price_url: String,
    pub include_sol_value: bool,

    // Detection
    pub candidate_addresses: Vec<String>,
    pub discovery_limit: usize,
    pub detection_interval_secs: u64,

    // Movement monitoring
    pub monitor_interval_secs: u64,

    // Email relay (optional)
    pub email_relay_url: Option<String>,

    // Storage
    pub settings_db_path: String,

    // Dashboard
    pub dashboard_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            solscan_api_url: env::var("SOLSCAN_API_URL").unwrap_or(defaults.solscan_api_url),
            solscan_api_key: non_empty_var("SOLSCAN_API_KEY"),

            rpc_url: env::var("SOLANA_RPC_URL").unwrap_or(defaults.rpc_url),

            jupiter_price_url: env::var("JUPITER_PRICE_URL").unwrap_or(defaults.jupiter_price_url),
            include_sol_value: env::var("INCLUDE_SOL_VALUE")
                .map(|v| v != "false")
                .unwrap_or(defaults.include_sol_value),

            candidate_addresses: env::var("CANDIDATE_ADDRESSES")
                .map(|v| parse_address_list(&v))
                .unwrap_or_default(),
            discovery_limit: env::var("DISCOVERY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.discovery_limit),
            detection_interval_secs: parse_interval(
                env::var("DETECTION_INTERVAL_SECS").ok().as_deref(),
                defaults.detection_interval_secs,
            ),

            monitor_interval_secs: parse_interval(
                env::var("MONITOR_INTERVAL_SECS").ok().as_deref(),
                defaults.monitor_interval_secs,
            ),

            email_relay_url: non_empty_var("EMAIL_RELAY_URL"),

            settings_db_path: env::var("SETTINGS_DB_PATH").unwrap_or(defaults.settings_db_path),

            dashboard_port: env::var("DASHBOARD_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dashboard_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solscan_api_url: "https://api.solscan.io".to_string(),
            solscan_api_key: None,
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            jupiter_price_url: "https://lite-api.jup.ag/price/v3".to_string(),
            include_sol_value: true,
            candidate_addresses: Vec::new(),
            discovery_limit: 1000,
            detection_interval_secs: 3600,
            monitor_interval_secs: 60,
            email_relay_url: None,
            settings_db_path: "data/giantwatch.db".to_string(),
            dashboard_port: 3000,
        }
    }
}

/// A task period in whole seconds; zero or unparsable falls back to `default`
fn parse_interval(raw: Option<&str>, default: u64) -> u64 {
    match raw.map(|v| v.trim().parse::<u64>()) {
        Some(Ok(secs)) if secs > 0 => secs,
        None => default,
        Some(_) => {
            warn!(
                target: "CONFIG",
                "Ignoring interval {:?}, using {}s",
                raw.unwrap_or_default(),
                default
            );
            default
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma/whitespace separated address list, dropping blanks and duplicates.
pub fn parse_address_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|a| a == part) {
            out.push(part.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_list_skips_blanks_and_duplicates() {
        let parsed = parse_address_list(" A1, B2,,A1\nC3 ");
        assert_eq!(parsed, vec!["A1", "B2", "C3"]);
    }

    #[test]
    fn empty_address_list_means_discovery() {
        assert!(parse_address_list("  , ").is_empty());
    }

    #[test]
    fn zero_or_garbage_interval_uses_default() {
        assert_eq!(parse_interval(Some("0"), 60), 60);
        assert_eq!(parse_interval(Some(" 0 "), 3600), 3600);
        assert_eq!(parse_interval(Some("-5"), 60), 60);
        assert_eq!(parse_interval(Some("soon"), 60), 60);
        assert_eq!(parse_interval(None, 60), 60);
        assert_eq!(parse_interval(Some("15"), 60), 15);
    }

    #[test]
    fn default_ignores_environment() {
        std::env::set_var("DASHBOARD_PORT", "4555");
        std::env::set_var("MONITOR_INTERVAL_SECS", "0");
        let config = Config::default();
        std::env::remove_var("DASHBOARD_PORT");
        std::env::remove_var("MONITOR_INTERVAL_SECS");

        assert_eq!(config.dashboard_port, 3000);
        assert_eq!(config.monitor_interval_secs, 60);
        assert_eq!(config.detection_interval_secs, 3600);
        assert!(config.candidate_addresses.is_empty());
        assert!(config.solscan_api_key.is_none());
    }
}
