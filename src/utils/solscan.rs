//! Solscan-style REST client (read-only)
//!
//! Every response is JSON. Collection endpoints wrap their payload in a
//! `data` envelope; a missing envelope field is an empty collection, never
//! an error.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Data source failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Endpoint label, used as a metrics dimension
    pub fn endpoint(&self) -> &'static str {
        match self {
            FetchError::Http { endpoint, .. }
            | FetchError::Status { endpoint, .. }
            | FetchError::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Token amount as reported by the token program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenAmount {
    #[serde(deserialize_with = "null_as_default")]
    pub amount: String,
    #[serde(deserialize_with = "null_as_default")]
    pub decimals: u8,
    pub ui_amount: Option<f64>,
}

/// One SPL token held by an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenHolding {
    #[serde(deserialize_with = "null_as_default")]
    pub token_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub token_amount: TokenAmount,
    #[serde(deserialize_with = "null_as_default")]
    pub token_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub token_symbol: String,
    #[serde(deserialize_with = "null_as_default")]
    pub token_icon: String,
    pub token_price: Option<f64>,
    pub usd_value: Option<f64>,
}

/// Transaction summary from the account transaction list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountTransaction {
    #[serde(deserialize_with = "null_as_default")]
    pub signature: String,
    #[serde(deserialize_with = "null_as_default")]
    pub block_time: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub slot: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub fee: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    /// Net lamport change for the queried account
    #[serde(deserialize_with = "null_as_default")]
    pub lamport: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub signer: Vec<String>,
    #[serde(rename = "includeSPLTransfer", deserialize_with = "null_as_default")]
    pub include_spl_transfer: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub change_type: String,
}

impl AccountTransaction {
    /// Absolute SOL amount moved by this transaction for the queried account
    pub fn sol_moved(&self) -> f64 {
        self.lamport.unsigned_abs() as f64 / LAMPORTS_PER_SOL
    }
}

/// Account information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub account: String,
    #[serde(deserialize_with = "null_as_default")]
    pub lamports: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub owner_program: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub account_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub rent_epoch: u64,
}

impl AccountInfo {
    /// Balance in SOL
    pub fn sol_balance(&self) -> f64 {
        self.lamports as f64 / LAMPORTS_PER_SOL
    }
}

/// An explicit `null` decodes like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `data` envelope; holdings use a `tokens` key instead
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default, alias = "tokens")]
    data: Option<T>,
}

/// Read access to per-wallet state, the part of the data API the
/// detector and the movement monitor depend on.
#[async_trait]
pub trait WalletDataSource: Send + Sync {
    async fn account_info(&self, address: &str) -> Result<AccountInfo, FetchError>;

    /// Most recent transactions, newest first
    async fn account_transactions(
        &self,
        address: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AccountTransaction>, FetchError>;

    async fn token_holdings(&self, address: &str) -> Result<Vec<TokenHolding>, FetchError>;
}

/// Solscan REST client
#[derive(Clone)]
pub struct SolscanClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SolscanClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header("Token", key);
        }

        let response = request
            .send()
            .await
            .map_err(|source| FetchError::Http { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { endpoint, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Http { endpoint, source })?;
        debug!(target: "SOLSCAN", "{} -> {} bytes", endpoint, body.len());

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode { endpoint, source })
    }

    async fn get_enveloped<T: DeserializeOwned + Default>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let value = self.get_json(endpoint, path, query).await?;
        unwrap_envelope(endpoint, value)
    }

    /// Latest network-wide transactions
    pub async fn latest_transactions(&self, limit: usize) -> Result<Vec<Value>, FetchError> {
        self.get_enveloped("transaction_last", "/transaction/last", &[("limit", limit.to_string())])
            .await
    }

    /// Trending tokens
    pub async fn trending_tokens(&self) -> Result<Vec<Value>, FetchError> {
        self.get_enveloped("token_trending", "/token/trending", &[]).await
    }

    /// Token metadata by mint (raw document)
    pub async fn token_meta(&self, mint: &str) -> Result<Value, FetchError> {
        self.get_json("token_meta", "/token/meta", &[("token", mint.to_string())])
            .await
    }

    /// Block transactions by slot (raw document)
    pub async fn block_info(&self, slot: u64) -> Result<Value, FetchError> {
        self.get_json("block_transactions", "/block/transactions", &[("slot", slot.to_string())])
            .await
    }

    /// Transaction detail by signature (raw document)
    pub async fn transaction_info(&self, signature: &str) -> Result<Value, FetchError> {
        self.get_json("transaction", "/transaction", &[("tx", signature.to_string())])
            .await
    }
}

#[async_trait]
impl WalletDataSource for SolscanClient {
    async fn account_info(&self, address: &str) -> Result<AccountInfo, FetchError> {
        let value = self
            .get_json("account", "/account", &[("address", address.to_string())])
            .await?;
        // The account endpoint answers either flat or enveloped
        let inner = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => value,
        };
        serde_json::from_value(inner).map_err(|source| FetchError::Decode {
            endpoint: "account",
            source,
        })
    }

    async fn account_transactions(
        &self,
        address: &str,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AccountTransaction>, FetchError> {
        let mut query = vec![
            ("account", address.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        self.get_enveloped("account_transactions", "/account/transactions", &query)
            .await
    }

    async fn token_holdings(&self, address: &str) -> Result<Vec<TokenHolding>, FetchError> {
        self.get_enveloped("account_tokens", "/account/tokens", &[("address", address.to_string())])
            .await
    }
}

fn unwrap_envelope<T: DeserializeOwned + Default>(
    endpoint: &'static str,
    value: Value,
) -> Result<T, FetchError> {
    let envelope: Envelope<T> =
        serde_json::from_value(value).map_err(|source| FetchError::Decode { endpoint, source })?;
    Ok(envelope.data.unwrap_or_default())
}
