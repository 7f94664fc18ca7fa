// =============================================================================
// Credit Stress — ICE BofA US High Yield option-adjusted spread
// =============================================================================
//
// The latest spread is z-scored against the IQR-cleaned history of the past
// year. Widening spreads mean risk appetite is draining from credit first:
//   z >  1  bearish
//   z < -1  bullish
// value = -z (clamped), so tight credit pushes the composite up.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{cached_series, clamp_value, confidence, require_len, z_score};
use crate::engine::{Engine, EngineError, EngineFallback, EngineReport, ExecutionContext};
use crate::providers::EconomicDataSource;
use crate::stats::{detect_outliers, round_to, OutlierMethod};
use crate::types::{EngineTier, Signal};

pub const HIGH_YIELD_SPREAD: &str = "BAMLH0A0HYM2";

const LOOKBACK_DAYS: usize = 260;
const MIN_OBSERVATIONS: usize = 30;
const STRESS_Z: f64 = 1.0;

pub struct CreditStressEngine {
    source: Arc<dyn EconomicDataSource>,
}

impl CreditStressEngine {
    pub fn new(source: Arc<dyn EconomicDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Engine for CreditStressEngine {
    fn id(&self) -> &str {
        "credit_stress"
    }

    fn name(&self) -> &str {
        "Credit Stress"
    }

    fn tier(&self) -> EngineTier {
        EngineTier::Foundation
    }

    fn fallback(&self) -> EngineFallback {
        let mut data = Map::new();
        data.insert("series".into(), Value::from(HIGH_YIELD_SPREAD));
        EngineFallback { value: 0.0, data }
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let spreads = cached_series(
            ctx,
            format!("{HIGH_YIELD_SPREAD}:{LOOKBACK_DAYS}"),
            self.source.series(HIGH_YIELD_SPREAD, LOOKBACK_DAYS),
        )
        .await?;
        require_len("high-yield spread observations", spreads.len(), MIN_OBSERVATIONS)?;

        let (history, last) = spreads.split_at(spreads.len() - 1);
        let latest = last[0];
        let cleaned = detect_outliers(history, OutlierMethod::Iqr, None)?;
        let z = z_score(latest, &cleaned.clean_data)?;

        let signal = if z > STRESS_Z {
            Signal::Bearish
        } else if z < -STRESS_Z {
            Signal::Bullish
        } else {
            Signal::Neutral
        };

        debug!(spread_pct = latest, z, %signal, "credit stress computed");

        Ok(
            EngineReport::success(signal, confidence(z.abs() / 3.0, spreads.len(), LOOKBACK_DAYS), clamp_value(-z))
                .with_data("spread_pct", latest)
                .with_data("z_score", round_to(z, 4))
                .with_data("history_mean_pct", round_to(crate::stats::mean(&cleaned.clean_data)?, 4))
                .with_data("outliers_removed", cleaned.outliers.len()),
        )
    }
}
