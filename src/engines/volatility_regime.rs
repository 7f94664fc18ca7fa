// =============================================================================
// Volatility Regime — realised-volatility percentile rank
// =============================================================================
//
// Annualised 20-day realised volatility is computed over a rolling window
// across the past year; the latest reading is ranked against all windows.
//   rank > 80th  bearish  (stress, deleveraging)
//   rank < 30th  bullish  (calm, risk appetite returns)
// value = (50 - rank) / 20, clamped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{cached_series, clamp_value, confidence, require_len, simple_returns};
use crate::engine::{Engine, EngineError, EngineReport, ExecutionContext};
use crate::providers::ExchangeDataSource;
use crate::stats::{median, rolling_statistics, round_to};
use crate::types::{EngineTier, Signal};

const LOOKBACK_DAYS: usize = 365;
const VOL_WINDOW: usize = 20;
const MIN_WINDOWS: usize = 30;
/// Crypto trades every day of the year.
const ANNUALISATION_DAYS: f64 = 365.0;
const HIGH_VOL_RANK: f64 = 80.0;
const LOW_VOL_RANK: f64 = 30.0;

pub struct VolatilityRegimeEngine {
    exchange: Arc<dyn ExchangeDataSource>,
    symbol: String,
}

impl VolatilityRegimeEngine {
    pub fn new(exchange: Arc<dyn ExchangeDataSource>, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
        }
    }
}

/// Share of `history` at or below `latest`, in percent.
fn percentile_rank(latest: f64, history: &[f64]) -> f64 {
    if history.is_empty() {
        return 50.0;
    }
    let at_or_below = history.iter().filter(|v| **v <= latest).count();
    at_or_below as f64 / history.len() as f64 * 100.0
}

#[async_trait]
impl Engine for VolatilityRegimeEngine {
    fn id(&self) -> &str {
        "volatility_regime"
    }

    fn name(&self) -> &str {
        "Volatility Regime"
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
        require_len("daily closes", closes.len(), VOL_WINDOW + MIN_WINDOWS)?;

        let returns = simple_returns(&closes);
        let scale = ANNUALISATION_DAYS.sqrt() * 100.0;
        let vols: Vec<f64> = rolling_statistics(&returns, VOL_WINDOW)?
            .map(|w| w.std * scale)
            .collect();
        let latest = vols[vols.len() - 1];
        let rank = percentile_rank(latest, &vols);
        let median_vol = median(&vols)?;

        let signal = if rank > HIGH_VOL_RANK {
            Signal::Bearish
        } else if rank < LOW_VOL_RANK {
            Signal::Bullish
        } else {
            Signal::Neutral
        };
        let value = clamp_value((50.0 - rank) / 20.0);
        let strength = (rank - 50.0).abs() / 50.0;

        debug!(
            symbol = %self.symbol,
            realized_vol_pct = latest,
            percentile_rank = rank,
            %signal,
            "volatility regime computed"
        );

        Ok(
            EngineReport::success(signal, confidence(strength, vols.len(), LOOKBACK_DAYS - VOL_WINDOW), value)
                .with_data("symbol", self.symbol.clone())
                .with_data("realized_vol_pct", round_to(latest, 2))
                .with_data("median_vol_pct", round_to(median_vol, 2))
                .with_data("percentile_rank", round_to(rank, 2))
                .with_data("windows", vols.len()),
        )
    }
}
