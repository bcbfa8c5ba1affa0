//! SOL/USD price feed (Jupiter price API)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";
const SOL_CACHE_DURATION_SECS: u64 = 30;
const API_TIMEOUT_SECS: u64 = 10;

/// Supplies the SOL price used to value native balances in USD
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn sol_usd_price(&self) -> Result<f64>;
}

/// Jupiter-backed oracle with a short-lived cache
pub struct JupiterPriceOracle {
    client: reqwest::Client,
    price_url: String,
    sol_rate_cache: Mutex<Option<(f64, Instant)>>,
}

impl JupiterPriceOracle {
    pub fn new(price_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            price_url: price_url.to_string(),
            sol_rate_cache: Mutex::new(None),
        }
    }

    fn cached_rate(&self) -> Option<f64> {
        let cache = self.sol_rate_cache.lock();
        match *cache {
            Some((rate, at)) if at.elapsed().as_secs() < SOL_CACHE_DURATION_SECS => Some(rate),
            _ => None,
        }
    }

    async fn fetch_price(&self, mint: &str) -> Result<f64> {
        let response = self
            .client
            .get(&self.price_url)
            .query(&[("ids", mint)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Jupiter API error: {}", response.status()));
        }

        let data: Value = response.json().await?;
        parse_usd_price(&data, mint)
    }
}

#[async_trait]
impl PriceOracle for JupiterPriceOracle {
    async fn sol_usd_price(&self) -> Result<f64> {
        if let Some(rate) = self.cached_rate() {
            return Ok(rate);
        }

        let rate = self.fetch_price(WRAPPED_SOL_MINT).await?;
        debug!(target: "PRICE", "SOL/USD = {:.2}", rate);
        *self.sol_rate_cache.lock() = Some((rate, Instant::now()));
        Ok(rate)
    }
}

/// V3 format: `{ "<mint>": { "usdPrice": 147.47 } }`
fn parse_usd_price(data: &Value, mint: &str) -> Result<f64> {
    data.get(mint)
        .and_then(|entry| entry.get("usdPrice"))
        .and_then(Value::as_f64)
        .filter(|price| price.is_finite() && *price >= 0.0)
        .ok_or_else(|| anyhow!("Price not found for mint: {}", mint))
}
