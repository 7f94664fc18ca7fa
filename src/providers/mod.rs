// =============================================================================
// Data Providers — upstream market and macro data behind async traits
// =============================================================================
//
// Engines never talk HTTP directly; they receive a provider handle at
// construction time. Two seams:
// - `EconomicDataSource` — macro time series (FRED)
// - `ExchangeDataSource` — spot closes and perpetual funding (Binance)
//
// Every series is returned oldest first.

pub mod binance;
pub mod fred;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use thiserror::Error;

pub use binance::BinanceMarketClient;
pub use fred::FredClient;
pub use rate_limit::RateLimitTracker;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("no observations for {0}")]
    Empty(String),

    #[error("request weight limit reached ({used}/{limit})")]
    RateLimited { used: u32, limit: u32 },

    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),
}

impl ProviderError {
    pub(crate) fn decode(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Macro-economic time series.
#[async_trait]
pub trait EconomicDataSource: Send + Sync {
    /// The latest `limit` observations of `series_id`, oldest first.
    async fn series(&self, series_id: &str, limit: usize) -> Result<Vec<f64>, ProviderError>;
}

/// Exchange market data.
#[async_trait]
pub trait ExchangeDataSource: Send + Sync {
    /// The latest `limit` daily close prices, oldest first.
    async fn daily_closes(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError>;

    /// The latest `limit` perpetual funding rates as decimals, oldest first.
    async fn funding_rates(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError>;
}
