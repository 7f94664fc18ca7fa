// In-memory providers used by the engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{EconomicDataSource, ExchangeDataSource, ProviderError};

/// Serves fixed series by id; unknown ids are `Empty`.
#[derive(Default)]
pub struct StaticEconomicData {
    series: HashMap<String, Vec<f64>>,
    requests: AtomicUsize,
}

impl StaticEconomicData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, id: &str, values: Vec<f64>) -> Self {
        self.series.insert(id.to_string(), values);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EconomicDataSource for StaticEconomicData {
    async fn series(&self, series_id: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let values = self
            .series
            .get(series_id)
            .ok_or_else(|| ProviderError::Empty(series_id.to_string()))?;
        let start = values.len().saturating_sub(limit);
        Ok(values[start..].to_vec())
    }
}

#[derive(Default)]
pub struct StaticExchangeData {
    closes: Vec<f64>,
    funding: Vec<f64>,
    requests: AtomicUsize,
}

impl StaticExchangeData {
    pub fn new(closes: Vec<f64>, funding: Vec<f64>) -> Self {
        Self {
            closes,
            funding,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn tail(values: &[f64], limit: usize, what: &str) -> Result<Vec<f64>, ProviderError> {
    if values.is_empty() {
        return Err(ProviderError::Empty(what.to_string()));
    }
    Ok(values[values.len().saturating_sub(limit)..].to_vec())
}

#[async_trait]
impl ExchangeDataSource for StaticExchangeData {
    async fn daily_closes(&self, _symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tail(&self.closes, limit, "closes")
    }

    async fn funding_rates(&self, _symbol: &str, limit: usize) -> Result<Vec<f64>, ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tail(&self.funding, limit, "funding")
    }
}

/// Deterministic, bounded wiggle so synthetic series have non-zero spread.
pub fn wiggle(i: usize) -> f64 {
    ((i * 7919) % 13) as f64 / 13.0 - 0.5
}

/// Geometric price path with a constant daily drift plus `wiggle` noise.
pub fn price_path(n: usize, start: f64, drift: f64, noise: f64) -> Vec<f64> {
    let mut price = start;
    (0..n)
        .map(|i| {
            price *= 1.0 + drift + noise * wiggle(i);
            price
        })
        .collect()
}
