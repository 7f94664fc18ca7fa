// =============================================================================
// Liquidity Engines — concrete computation units
// =============================================================================
//
// Foundation tier (macro plumbing):
// - `net_liquidity`          — Fed balance sheet minus TGA and reverse repo
// - `credit_stress`          — high-yield spread stress
//
// Core tier (crypto market state):
// - `momentum`               — volatility-scaled 20-day rate of change
// - `volatility_regime`      — realised-vol percentile rank
// - `funding_rate`           — contrarian perpetual funding read
//
// Synthesis tier:
// - `liquidity_correlation`  — how tightly BTC is tracking liquidity
//
// Every engine reports `value` on a common scale of [-2.5, 2.5] so the
// aggregator's composite score spans its full band. Provider responses are
// cached in the runtime cache keyed by series and lookback.

pub mod credit_stress;
pub mod funding_rate;
pub mod liquidity_correlation;
pub mod momentum;
pub mod net_liquidity;
pub mod volatility_regime;

use std::future::Future;
use std::sync::Arc;

use tracing::trace;

use crate::engine::{Engine, EngineError, ExecutionContext};
use crate::providers::{EconomicDataSource, ExchangeDataSource, ProviderError};
use crate::stats::{self, StatsResult};
use crate::types::Signal;

pub use credit_stress::CreditStressEngine;
pub use funding_rate::FundingRateEngine;
pub use liquidity_correlation::LiquidityCorrelationEngine;
pub use momentum::MomentumEngine;
pub use net_liquidity::NetLiquidityEngine;
pub use volatility_regime::VolatilityRegimeEngine;

/// Bound of the shared engine value scale.
pub const VALUE_BOUND: f64 = 2.5;

/// All engines in registration order.
pub fn build_engines(
    economic: Arc<dyn EconomicDataSource>,
    exchange: Arc<dyn ExchangeDataSource>,
    symbol: &str,
) -> Vec<Arc<dyn Engine>> {
    vec![
        Arc::new(NetLiquidityEngine::new(Arc::clone(&economic))),
        Arc::new(CreditStressEngine::new(Arc::clone(&economic))),
        Arc::new(MomentumEngine::new(Arc::clone(&exchange), symbol)),
        Arc::new(VolatilityRegimeEngine::new(Arc::clone(&exchange), symbol)),
        Arc::new(FundingRateEngine::new(Arc::clone(&exchange), symbol)),
        Arc::new(LiquidityCorrelationEngine::new(economic, exchange, symbol)),
    ]
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Serve `key` from the runtime cache, otherwise await `fetch` and cache the
/// result with the default TTL.
pub(crate) async fn cached_series<F>(
    ctx: &ExecutionContext,
    key: String,
    fetch: F,
) -> Result<Vec<f64>, EngineError>
where
    F: Future<Output = Result<Vec<f64>, ProviderError>>,
{
    if let Some(values) = ctx.cache().get_as::<Vec<f64>>(&key) {
        trace!(engine_id = ctx.engine_id(), key = %key, "series cache hit");
        return Ok(values);
    }
    let values = fetch.await?;
    ctx.cache().set_as(key, &values, None);
    Ok(values)
}

/// Simple returns `x[i] / x[i-1] - 1`. A zero predecessor yields 0.
pub(crate) fn simple_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            if w[0].abs() < f64::EPSILON {
                0.0
            } else {
                w[1] / w[0] - 1.0
            }
        })
        .collect()
}

/// Every `step`-th value counted back from the last one, oldest first.
pub(crate) fn every_nth_from_end(values: &[f64], step: usize) -> Vec<f64> {
    let mut sampled: Vec<f64> = values.iter().rev().step_by(step.max(1)).copied().collect();
    sampled.reverse();
    sampled
}

/// Z-score of `latest` against `history`; 0 when the history is flat.
pub(crate) fn z_score(latest: f64, history: &[f64]) -> StatsResult<f64> {
    let mean = stats::mean(history)?;
    let std = stats::standard_deviation(history)?;
    if std < f64::EPSILON {
        return Ok(0.0);
    }
    Ok((latest - mean) / std)
}

/// Clamp onto the shared value scale; non-finite collapses to 0.
pub(crate) fn clamp_value(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-VALUE_BOUND, VALUE_BOUND)
    } else {
        0.0
    }
}

/// Bullish strictly above `upper`, bearish strictly below `lower`.
pub(crate) fn classify(metric: f64, upper: f64, lower: f64) -> Signal {
    if metric > upper {
        Signal::Bullish
    } else if metric < lower {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// Confidence from signal strength in [0, 1] and sample coverage.
pub(crate) fn confidence(strength: f64, samples: usize, full_sample: usize) -> f64 {
    let strength = if strength.is_finite() {
        strength.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let coverage = (samples as f64 / full_sample.max(1) as f64).min(1.0);
    40.0 + 40.0 * strength + 15.0 * coverage
}

/// Fail the execution unless at least `required` observations are present.
pub(crate) fn require_len(what: &str, len: usize, required: usize) -> Result<(), EngineError> {
    if len < required {
        return Err(EngineError::computation(format!(
            "insufficient {what}: need {required}, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::engine::EngineCache;

    pub fn context(engine_id: &str) -> ExecutionContext {
        ExecutionContext::new(engine_id, Arc::new(EngineCache::new(Duration::from_secs(60))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{StaticEconomicData, StaticExchangeData};
    use crate::types::EngineTier;

    #[test]
    fn sampling_counts_back_from_latest() {
        let daily: Vec<f64> = (0..12).map(|i| i as f64).collect();
        assert_eq!(every_nth_from_end(&daily, 5), vec![1.0, 6.0, 11.0]);
        assert_eq!(every_nth_from_end(&daily, 1), daily);
    }

    #[test]
    fn returns_and_zero_guard() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
        assert_eq!(simple_returns(&[0.0, 5.0]), vec![0.0]);
        assert!(simple_returns(&[1.0]).is_empty());
    }

    #[test]
    fn z_score_of_flat_history_is_zero() {
        assert_eq!(z_score(10.0, &[3.0, 3.0, 3.0]).unwrap(), 0.0);
        let z = z_score(4.0, &[1.0, 2.0, 3.0]).unwrap();
        assert!((z - 2.0).abs() < 1e-9);
        assert!(z_score(1.0, &[]).is_err());
    }

    #[test]
    fn value_scale_is_bounded() {
        assert_eq!(clamp_value(9.0), VALUE_BOUND);
        assert_eq!(clamp_value(-9.0), -VALUE_BOUND);
        assert_eq!(clamp_value(f64::NAN), 0.0);
        assert_eq!(classify(0.5, 0.5, -0.5), Signal::Neutral);
        assert_eq!(classify(0.51, 0.5, -0.5), Signal::Bullish);
    }

    #[test]
    fn confidence_band() {
        assert_eq!(confidence(0.0, 0, 10), 40.0);
        assert_eq!(confidence(5.0, 50, 10), 95.0);
    }

    #[tokio::test]
    async fn cached_series_fetches_once() {
        let source = StaticEconomicData::new().with_series("S", vec![1.0, 2.0]);
        let ctx = test_support::context("t");
        for _ in 0..3 {
            let v = cached_series(&ctx, "S:2".into(), source.series("S", 2)).await.unwrap();
            assert_eq!(v, vec![1.0, 2.0]);
        }
        assert_eq!(source.requests(), 1);
    }

    #[test]
    fn registration_order_and_tiers() {
        let engines = build_engines(
            Arc::new(StaticEconomicData::new()),
            Arc::new(StaticExchangeData::default()),
            "BTCUSDT",
        );
        let ids: Vec<&str> = engines.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![
                "net_liquidity",
                "credit_stress",
                "momentum",
                "volatility_regime",
                "funding_rate",
                "liquidity_correlation"
            ]
        );
        assert_eq!(engines[0].tier(), EngineTier::Foundation);
        assert_eq!(engines[5].tier(), EngineTier::Synthesis);
        assert_eq!(
            engines[5].dependencies(),
            vec!["net_liquidity".to_string(), "momentum".to_string()]
        );
    }
}
