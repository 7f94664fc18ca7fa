// =============================================================================
// Binance Market-Data Client — public spot klines and futures funding
// =============================================================================
//
// Only unsigned public endpoints are used, so no credentials are held. Every
// request is checked against the shared weight tracker before it is sent and
// the tracker is refreshed from the response headers afterwards.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{ExchangeDataSource, ProviderError, RateLimitTracker};

pub const DEFAULT_SPOT_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_FUTURES_BASE_URL: &str = "https://fapi.binance.com";

/// Request weight of GET /api/v3/klines for limit <= 100 / <= 500 / <= 1000.
fn klines_weight(limit: usize) -> u32 {
    match limit {
        0..=100 => 1,
        101..=500 => 2,
        501..=1000 => 5,
        _ => 10,
    }
}

const FUNDING_RATE_WEIGHT: u32 = 1;

#[derive(Clone)]
pub struct BinanceMarketClient {
    spot_base_url: String,
    futures_base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceMarketClient {
    pub fn new(
        spot_base_url: impl Into<String>,
        futures_base_url: impl Into<String>,
        rate_limit: Arc<RateLimitTracker>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let spot_base_url = spot_base_url.into();
        let futures_base_url = futures_base_url.into();
        debug!(spot = %spot_base_url, futures = %futures_base_url, "BinanceMarketClient initialised");
        Ok(Self {
            spot_base_url,
            futures_base_url,
            client,
            rate_limit,
        })
    }

    pub fn rate_limit(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limit
    }

    /// GET /api/v3/klines with interval 1d.
    #[instrument(skip(self), name = "binance::get_daily_klines")]
    pub async fn get_daily_klines(&self, symbol: &str, limit: usize) -> Result<Value, ProviderError> {
        let url = format!("{}/api/v3/klines", self.spot_base_url);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", "1d".to_string()),
            ("limit", limit.to_string()),
        ];
        self.get_json("GET /api/v3/klines", &url, &query, klines_weight(limit))
            .await
    }

    /// GET /fapi/v1/fundingRate.
    #[instrument(skip(self), name = "binance::get_funding_rate_history")]
    pub async fn get_funding_rate_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/fapi/v1/fundingRate", self.futures_base_url);
        let query = [("symbol", symbol.to_string()), ("limit", limit.to_string())];
        self.get_json("GET /fapi/v1/fundingRate", &url, &query, FUNDING_RATE_WEIGHT)
            .await
    }

    async fn get_json(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, String)],
        weight: u32,
    ) -> Result<Value, ProviderError> {
        self.rate_limit
            .try_acquire(weight)
            .map_err(|used| ProviderError::RateLimited {
                used,
                limit: super::rate_limit::WEIGHT_HARD_LIMIT,
            })?;

        let resp = self.client.get(url).query(query).send().await?;
        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::decode(endpoint, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: body.to_string(),
            });
        }
        Ok(body)
    }
}

impl std::fmt::Debug for BinanceMarketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceMarketClient")
            .field("spot_base_url", &self.spot_base_url)
            .field("futures_base_url", &self.futures_base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

#[async_trait]
impl ExchangeDataSource for BinanceMarketClient {
    async fn daily_closes(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        let body = self.get_daily_klines(symbol, limit).await?;
        let closes = parse_kline_closes(&body)?;
        if closes.is_empty() {
            return Err(ProviderError::Empty(format!("{symbol} klines")));
        }
        debug!(symbol, count = closes.len(), "daily closes fetched");
        Ok(closes)
    }

    async fn funding_rates(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        let body = self.get_funding_rate_history(symbol, limit).await?;
        let rates = parse_funding_rates(&body)?;
        if rates.is_empty() {
            return Err(ProviderError::Empty(format!("{symbol} funding rates")));
        }
        debug!(symbol, count = rates.len(), "funding rates fetched");
        Ok(rates)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

/// Close prices from Binance's array-of-arrays kline format.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, ...
pub(crate) fn parse_kline_closes(body: &Value) -> Result<Vec<f64>, ProviderError> {
    let raw = body
        .as_array()
        .ok_or_else(|| ProviderError::decode("klines", "response is not an array"))?;

    let mut closes = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry
            .as_array()
            .ok_or_else(|| ProviderError::decode("klines", "entry is not an array"))?;
        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }
        closes.push(parse_str_f64("kline close", &arr[4])?);
    }
    Ok(closes)
}

/// Funding rates (decimal) from /fapi/v1/fundingRate, returned oldest first
/// by the exchange.
pub(crate) fn parse_funding_rates(body: &Value) -> Result<Vec<f64>, ProviderError> {
    let raw = body
        .as_array()
        .ok_or_else(|| ProviderError::decode("funding rates", "response is not an array"))?;
    raw.iter()
        .map(|entry| parse_str_f64("fundingRate", &entry["fundingRate"]))
        .collect()
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(what: &str, val: &Value) -> Result<f64, ProviderError> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|e| ProviderError::decode(what, format!("'{s}': {e}")))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        Err(ProviderError::decode(what, format!("expected string or number, got {val}")))
    }
}
