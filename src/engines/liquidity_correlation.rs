// =============================================================================
// Liquidity Correlation — is BTC trading the liquidity tide?
// =============================================================================
//
// Pearson correlation between weekly net-liquidity changes and weekly BTC
// returns over the past year, signed by the recent liquidity trend:
//
//   value = corr * trend * 2      trend = sign(sum of last 4 weekly changes)
//
// High positive correlation with rising liquidity is a tailwind; the same
// correlation with draining liquidity is a headwind. Weak or inverse
// correlation mutes or flips the read.
//
// Runs after `net_liquidity` and `momentum` in the same orchestration pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::net_liquidity::{fetch_net_liquidity, LOOKBACK_WEEKS};
use super::{cached_series, clamp_value, classify, confidence, every_nth_from_end, simple_returns};
use crate::engine::{Engine, EngineError, EngineReport, ExecutionContext};
use crate::providers::{EconomicDataSource, ExchangeDataSource};
use crate::stats::{correlation, round_to};
use crate::types::EngineTier;

const DAYS_PER_WEEK: usize = 7;
const LOOKBACK_DAYS: usize = LOOKBACK_WEEKS * DAYS_PER_WEEK + 1;
const MIN_PAIRS: usize = 8;
const TREND_WEEKS: usize = 4;
const VALUE_SCALE: f64 = 2.0;
const SIGNAL_THRESHOLD: f64 = 0.5;

pub struct LiquidityCorrelationEngine {
    economic: Arc<dyn EconomicDataSource>,
    exchange: Arc<dyn ExchangeDataSource>,
    symbol: String,
}

impl LiquidityCorrelationEngine {
    pub fn new(
        economic: Arc<dyn EconomicDataSource>,
        exchange: Arc<dyn ExchangeDataSource>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            economic,
            exchange,
            symbol: symbol.into(),
        }
    }
}

fn trend_sign(changes: &[f64]) -> f64 {
    let recent: f64 = changes.iter().rev().take(TREND_WEEKS).sum();
    if recent.abs() < 1e-12 {
        0.0
    } else {
        recent.signum()
    }
}

fn trend_label(sign: f64) -> &'static str {
    if sign > 0.0 {
        "rising"
    } else if sign < 0.0 {
        "falling"
    } else {
        "flat"
    }
}

#[async_trait]
impl Engine for LiquidityCorrelationEngine {
    fn id(&self) -> &str {
        "liquidity_correlation"
    }

    fn name(&self) -> &str {
        "Liquidity Correlation"
    }

    fn tier(&self) -> EngineTier {
        EngineTier::Synthesis
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["net_liquidity".to_string(), "momentum".to_string()]
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let net = fetch_net_liquidity(ctx, self.economic.as_ref(), LOOKBACK_WEEKS).await?;
        let closes = cached_series(
            ctx,
            format!("closes:{}:{LOOKBACK_DAYS}", self.symbol),
            self.exchange.daily_closes(&self.symbol, LOOKBACK_DAYS),
        )
        .await?;

        let liquidity_changes = simple_returns(&net);
        let btc_returns = simple_returns(&every_nth_from_end(&closes, DAYS_PER_WEEK));
        let pairs = liquidity_changes.len().min(btc_returns.len());
        if pairs < MIN_PAIRS {
            return Err(EngineError::computation(format!(
                "insufficient weekly pairs: need {MIN_PAIRS}, got {pairs}"
            )));
        }
        let liq = &liquidity_changes[liquidity_changes.len() - pairs..];
        let btc = &btc_returns[btc_returns.len() - pairs..];

        let corr = correlation(liq, btc)?;
        let trend = trend_sign(liq);
        let value = clamp_value(corr * trend * VALUE_SCALE);
        let signal = classify(value, SIGNAL_THRESHOLD, -SIGNAL_THRESHOLD);

        debug!(
            symbol = %self.symbol,
            correlation = corr,
            trend = trend_label(trend),
            pairs,
            %signal,
            "liquidity correlation computed"
        );

        Ok(
            EngineReport::success(signal, confidence(corr.abs(), pairs, LOOKBACK_WEEKS - 1), value)
                .with_data("symbol", self.symbol.clone())
                .with_data("correlation", round_to(corr, 4))
                .with_data("liquidity_trend", trend_label(trend))
                .with_data("weekly_pairs", pairs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::net_liquidity::{
        net_liquidity_series, FED_BALANCE_SHEET, REVERSE_REPO, TREASURY_ACCOUNT,
    };
    use crate::engines::test_support::context;
    use crate::providers::testing::{wiggle, StaticEconomicData, StaticExchangeData};
    use crate::types::Signal;

    /// Liquidity trending by `slope_bn` per week and BTC weekly returns of
    /// `beta` times the liquidity change, each weekly close held for 7 days.
    fn market(slope_bn: f64, beta: f64) -> (StaticEconomicData, StaticExchangeData) {
        let walcl: Vec<f64> = (0..LOOKBACK_WEEKS)
            .map(|w| (7000.0 + slope_bn * w as f64 + 40.0 * wiggle(w)) * 1000.0)
            .collect();
        let tga = vec![700.0; LOOKBACK_WEEKS];
        let rrp = vec![500.0; LOOKBACK_WEEKS * 5];
        let changes = simple_returns(&net_liquidity_series(&walcl, &tga, &rrp));

        let mut weekly = vec![30_000.0];
        for c in &changes {
            let prev = weekly[weekly.len() - 1];
            weekly.push(prev * (1.0 + beta * c));
        }
        let daily: Vec<f64> = weekly
            .iter()
            .flat_map(|close| std::iter::repeat(*close).take(DAYS_PER_WEEK))
            .collect();

        let economic = StaticEconomicData::new()
            .with_series(FED_BALANCE_SHEET, walcl)
            .with_series(TREASURY_ACCOUNT, tga)
            .with_series(REVERSE_REPO, rrp);
        (economic, StaticExchangeData::new(daily, Vec::new()))
    }

    async fn run(slope_bn: f64, beta: f64) -> EngineReport {
        let (economic, exchange) = market(slope_bn, beta);
        LiquidityCorrelationEngine::new(Arc::new(economic), Arc::new(exchange), "BTCUSDT")
            .perform_execution(&context("liquidity_correlation"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tracking_rising_liquidity_is_bullish() {
        let report = run(30.0, 2.0).await;
        assert_eq!(report.signal, Signal::Bullish);
        assert!(report.data["correlation"].as_f64().unwrap() > 0.99);
        assert_eq!(report.data["liquidity_trend"], "rising");
        assert!((report.value - 2.0).abs() < 0.05);
    }

    #[tokio::test]
    async fn tracking_draining_liquidity_is_bearish() {
        let report = run(-30.0, 2.0).await;
        assert_eq!(report.signal, Signal::Bearish);
        assert_eq!(report.data["liquidity_trend"], "falling");
    }

    #[tokio::test]
    async fn inverse_tracking_flips_the_read() {
        let report = run(30.0, -2.0).await;
        assert_eq!(report.signal, Signal::Bearish);
        assert!(report.data["correlation"].as_f64().unwrap() < -0.99);
    }

    #[test]
    fn trend_uses_last_four_weeks() {
        assert_eq!(trend_sign(&[5.0, -1.0, -1.0, -1.0, 0.5]), -1.0);
        assert_eq!(trend_sign(&[0.0, 0.0]), 0.0);
        assert_eq!(trend_label(1.0), "rising");
    }

    #[tokio::test]
    async fn too_little_overlap_fails() {
        let (economic, _) = market(30.0, 1.0);
        let exchange = StaticExchangeData::new(vec![100.0; 20], Vec::new());
        let err = LiquidityCorrelationEngine::new(Arc::new(economic), Arc::new(exchange), "BTCUSDT")
            .perform_execution(&context("liquidity_correlation"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("weekly pairs"));
    }
}
