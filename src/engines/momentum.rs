// =============================================================================
// Momentum — volatility-scaled 20-day rate of change
// =============================================================================
//
//   score = ROC(20) / (std(daily returns, last 20) * sqrt(20))
//
// i.e. how many 20-day standard deviations price has moved over the last 20
// days. score > 0.5 bullish, < -0.5 bearish. A flat window scores 0.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{cached_series, clamp_value, classify, confidence, require_len, simple_returns};
use crate::engine::{Engine, EngineError, EngineReport, ExecutionContext};
use crate::providers::ExchangeDataSource;
use crate::stats::{rolling_statistics, round_to};
use crate::types::EngineTier;

pub(crate) const LOOKBACK_DAYS: usize = 120;
const ROC_WINDOW: usize = 20;
const SIGNAL_THRESHOLD: f64 = 0.5;

pub struct MomentumEngine {
    exchange: Arc<dyn ExchangeDataSource>,
    symbol: String,
}

impl MomentumEngine {
    pub fn new(exchange: Arc<dyn ExchangeDataSource>, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl Engine for MomentumEngine {
    fn id(&self) -> &str {
        "momentum"
    }

    fn name(&self) -> &str {
        "Price Momentum"
    }

    fn tier(&self) -> EngineTier {
        EngineTier::Core
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let closes = cached_series(
            ctx,
            format!("closes:{}:{LOOKBACK_DAYS}", self.symbol),
            self.exchange.daily_closes(&self.symbol, LOOKBACK_DAYS),
        )
        .await?;
        require_len("daily closes", closes.len(), 2 * ROC_WINDOW + 1)?;

        let n = closes.len();
        let base = closes[n - 1 - ROC_WINDOW];
        if base <= 0.0 {
            return Err(EngineError::computation(format!("non-positive close {base}")));
        }
        let roc = closes[n - 1] / base - 1.0;

        let returns = simple_returns(&closes);
        let daily_std = rolling_statistics(&returns, ROC_WINDOW)?
            .last()
            .map(|w| w.std)
            .unwrap_or(0.0);
        let window_std = daily_std * (ROC_WINDOW as f64).sqrt();
        let score = if window_std < f64::EPSILON {
            0.0
        } else {
            roc / window_std
        };

        let signal = classify(score, SIGNAL_THRESHOLD, -SIGNAL_THRESHOLD);
        debug!(symbol = %self.symbol, roc, daily_std, score, %signal, "momentum computed");

        Ok(
            EngineReport::success(signal, confidence(score.abs() / 2.0, n, LOOKBACK_DAYS), clamp_value(score))
                .with_data("symbol", self.symbol.clone())
                .with_data("roc_20d_pct", round_to(roc * 100.0, 4))
                .with_data("daily_return_std_pct", round_to(daily_std * 100.0, 4))
                .with_data("score", round_to(score, 4))
                .with_data("last_close", closes[n - 1]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::test_support::context;
    use crate::providers::testing::{price_path, StaticExchangeData};
    use crate::types::Signal;

    async fn run(closes: Vec<f64>) -> Result<EngineReport, EngineError> {
        let exchange = StaticExchangeData::new(closes, Vec::new());
        MomentumEngine::new(Arc::new(exchange), "BTCUSDT")
            .perform_execution(&context("momentum"))
            .await
    }

    #[tokio::test]
    async fn uptrend_is_bullish() {
        let report = run(price_path(120, 30_000.0, 0.01, 0.02)).await.unwrap();
        assert_eq!(report.signal, Signal::Bullish);
        assert!(report.value > 0.5);
        assert!(report.data["roc_20d_pct"].as_f64().unwrap() > 10.0);
    }

    #[tokio::test]
    async fn downtrend_is_bearish() {
        let report = run(price_path(120, 30_000.0, -0.01, 0.02)).await.unwrap();
        assert_eq!(report.signal, Signal::Bearish);
        assert!(report.value < -0.5);
    }

    #[tokio::test]
    async fn flat_prices_score_zero() {
        let report = run(vec![100.0; 60]).await.unwrap();
        assert_eq!(report.signal, Signal::Neutral);
        assert_eq!(report.value, 0.0);
    }

    #[tokio::test]
    async fn needs_two_windows_of_history() {
        let err = run(vec![100.0; 30]).await.unwrap_err();
        assert!(err.to_string().contains("insufficient daily closes"));
    }
}
