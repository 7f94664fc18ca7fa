// =============================================================================
// Funding Rate — contrarian signal from perpetual futures funding
// =============================================================================
//
// Funding rates are periodic payments between longs and shorts that anchor
// the perpetual contract price to spot. Crowded positioning tends to unwind
// against the crowd, so the read is contrarian:
//
//   rate > +0.05%  =>  -0.8  (overleveraged longs, expect flush)
//   rate > +0.03%  =>  -0.4  (moderate long bias)
//   rate < -0.05%  =>  +0.9  (extreme short squeeze setup)
//   rate < -0.03%  =>  +0.5  (shorts paying, mild bullish)
//   rate > +0.01%  =>  -0.1
//   rate < -0.01%  =>  +0.2
//   otherwise      =>   0.0
//
// The ladder is doubled onto the engine value scale and nudged against the
// latest rate's z-score over the last month of funding prints, so a rate
// that is unremarkable in absolute terms but extreme for the current regime
// still leans contrarian.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{cached_series, clamp_value, classify, confidence, require_len, z_score};
use crate::engine::{Engine, EngineError, EngineReport, ExecutionContext};
use crate::providers::ExchangeDataSource;
use crate::stats::round_to;
use crate::types::EngineTier;

/// 30 days of 8-hourly prints.
const LOOKBACK_PRINTS: usize = 90;
const MIN_PRINTS: usize = 10;
const LADDER_SCALE: f64 = 2.0;
const Z_WEIGHT: f64 = 0.25;
const SIGNAL_THRESHOLD: f64 = 0.5;

/// Contrarian interpretation of one funding print.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingRead {
    /// Contrarian signal in [-1.0, +1.0].
    pub signal: f64,
    pub bias: &'static str,
    pub interpretation: &'static str,
}

/// Map a funding rate in percent onto the contrarian ladder.
pub fn contrarian_ladder(rate_pct: f64) -> FundingRead {
    let (signal, bias, interpretation) = if rate_pct > 0.05 {
        (
            -0.8,
            "BEARISH",
            "Extreme positive funding - overleveraged longs, contrarian short",
        )
    } else if rate_pct > 0.03 {
        (-0.4, "BEARISH", "Elevated positive funding - moderate contrarian short")
    } else if rate_pct < -0.05 {
        (
            0.9,
            "BULLISH",
            "Extreme negative funding - short squeeze likely, contrarian long",
        )
    } else if rate_pct < -0.03 {
        (0.5, "BULLISH", "Elevated negative funding - shorts paying, contrarian long")
    } else if rate_pct > 0.01 {
        (-0.1, "NEUTRAL", "Slightly positive funding - normal conditions")
    } else if rate_pct < -0.01 {
        (0.2, "NEUTRAL", "Slightly negative funding - mild bullish lean")
    } else {
        (0.0, "NEUTRAL", "Neutral funding rate - no signal")
    };
    FundingRead {
        signal,
        bias,
        interpretation,
    }
}

pub struct FundingRateEngine {
    exchange: Arc<dyn ExchangeDataSource>,
    symbol: String,
}

impl FundingRateEngine {
    pub fn new(exchange: Arc<dyn ExchangeDataSource>, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl Engine for FundingRateEngine {
    fn id(&self) -> &str {
        "funding_rate"
    }

    fn name(&self) -> &str {
        "Funding Rate"
    }

    fn tier(&self) -> EngineTier {
        EngineTier::Core
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let rates = cached_series(
            ctx,
            format!("funding:{}:{LOOKBACK_PRINTS}", self.symbol),
            self.exchange.funding_rates(&self.symbol, LOOKBACK_PRINTS),
        )
        .await?;
        require_len("funding prints", rates.len(), MIN_PRINTS)?;

        let (history, last) = rates.split_at(rates.len() - 1);
        let rate = last[0];
        let rate_pct = rate * 100.0;
        let read = contrarian_ladder(rate_pct);
        let z = z_score(rate, history)?;

        let value = clamp_value(read.signal * LADDER_SCALE - z * Z_WEIGHT);
        let signal = classify(value, SIGNAL_THRESHOLD, -SIGNAL_THRESHOLD);
        let strength = read.signal.abs().max((z.abs() / 3.0).min(1.0));

        debug!(
            symbol = %self.symbol,
            rate_pct = format!("{:.4}", rate_pct),
            ladder = read.signal,
            z,
            bias = read.bias,
            "funding rate computed"
        );

        Ok(
            EngineReport::success(signal, confidence(strength, rates.len(), LOOKBACK_PRINTS), value)
                .with_data("symbol", self.symbol.clone())
                .with_data("rate_pct", round_to(rate_pct, 4))
                .with_data("ladder_signal", read.signal)
                .with_data("bias", read.bias)
                .with_data("interpretation", read.interpretation)
                .with_data("z_score", round_to(z, 4)),
        )
    }
}
