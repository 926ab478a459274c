// =============================================================================
// Bybit v5 REST client — public market data only
// =============================================================================
//
// GET /v5/market/kline?category=..&symbol=..&interval=..&limit=..[&end=..]
//
// Rows arrive newest-first as string arrays and are returned oldest-first.
// Kline endpoints are public, so no request is signed.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimitTracker;
use crate::market_data::{Candle, KlineSource};
use crate::types::Interval;

/// Largest `limit` the kline endpoint accepts.
const MAX_KLINE_LIMIT: usize = 1000;

#[derive(Clone)]
pub struct BybitClient {
    base_url: String,
    category: String,
    interval: Interval,
    client: reqwest::Client,
    rate_limits: Arc<RateLimitTracker>,
}

impl BybitClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client for one market `category` ("spot", "linear", ...) and
    /// one kline `interval`.
    pub fn new(base_url: impl Into<String>, category: impl Into<String>, interval: Interval) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, %interval, "BybitClient initialised");

        Ok(Self {
            base_url,
            category: category.into(),
            interval,
            client,
            rate_limits: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limits
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /v5/market/kline.
    ///
    /// Returns up to `limit` candles starting at or before `end_ms` (the most
    /// recent ones when `None`), ascending by start time.
    #[instrument(skip(self), name = "bybit::get_klines")]
    pub async fn get_klines(&self, symbol: &str, end_ms: Option<i64>, limit: usize) -> Result<Vec<Candle>> {
        if !self.rate_limits.can_send_request(chrono::Utc::now().timestamp_millis()) {
            anyhow::bail!("Bybit rate-limit budget exhausted");
        }

        let limit = limit.clamp(1, MAX_KLINE_LIMIT).to_string();
        let mut query = vec![
            ("category", self.category.clone()),
            ("symbol", symbol.to_uppercase()),
            ("interval", self.interval.bybit_token().to_string()),
            ("limit", limit),
        ];
        if let Some(end) = end_ms {
            query.push(("end", end.to_string()));
        }

        let url = format!("{}/v5/market/kline", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("GET /v5/market/kline request failed")?;

        self.rate_limits.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse kline response")?;

        if !status.is_success() {
            anyhow::bail!("Bybit GET /v5/market/kline returned {}: {}", status, body);
        }

        let candles = parse_kline_response(&body)?;
        debug!(symbol, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

impl KlineSource for BybitClient {
    async fn fetch_page(&self, symbol: &str, end_ms: Option<i64>, limit: usize) -> Result<Vec<Candle>> {
        self.get_klines(symbol, end_ms, limit).await
    }
}

impl std::fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitClient")
            .field("base_url", &self.base_url)
            .field("category", &self.category)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Extract candles from a `/v5/market/kline` body.
///
/// A non-zero `retCode` is an error; individual malformed rows are skipped.
pub fn parse_kline_response(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let code = body["retCode"].as_i64().context("kline response missing retCode")?;
    if code != 0 {
        anyhow::bail!(
            "Bybit kline error {}: {}",
            code,
            body["retMsg"].as_str().unwrap_or_default()
        );
    }

    let rows = body["result"]["list"]
        .as_array()
        .context("kline response missing result.list")?;

    let mut candles: Vec<Candle> = rows
        .iter()
        .filter_map(|row| match Candle::from_rest_row(row) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "skipping malformed kline row");
                None
            }
        })
        .collect();

    candles.sort_by_key(|c| c.start_time_ms);
    Ok(candles)
}
