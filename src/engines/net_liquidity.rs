// =============================================================================
// Net Liquidity — Fed balance sheet minus Treasury General Account and RRP
// =============================================================================
//
//   net = WALCL / 1000 - WTREGEN - RRPONTSYD        (USD billions, weekly)
//
// WALCL is reported in millions, the other two in billions. RRP is a daily
// series and is sampled every 5th business day counting back from the
// latest print so it lines up with the weekly series.
//
// Signal: 4-week % change of net liquidity
//   > +1%  bullish    (liquidity injection)
//   < -1%  bearish    (liquidity drain)
// The latest weekly change is also z-scored against the MAD-cleaned history
// of weekly changes to scale the value.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{cached_series, clamp_value, classify, confidence, require_len, simple_returns, z_score};
use crate::engine::{Engine, EngineError, EngineFallback, EngineReport, ExecutionContext};
use crate::providers::EconomicDataSource;
use crate::stats::{detect_outliers, round_to, OutlierMethod};
use crate::types::EngineTier;

pub const FED_BALANCE_SHEET: &str = "WALCL";
pub const TREASURY_ACCOUNT: &str = "WTREGEN";
pub const REVERSE_REPO: &str = "RRPONTSYD";

/// Weekly lookback.
pub const LOOKBACK_WEEKS: usize = 52;
const BUSINESS_DAYS_PER_WEEK: usize = 5;
const MIN_WEEKS: usize = 10;
const CHANGE_WEEKS: usize = 4;
const SIGNAL_THRESHOLD_PCT: f64 = 1.0;

pub struct NetLiquidityEngine {
    source: Arc<dyn EconomicDataSource>,
}

impl NetLiquidityEngine {
    pub fn new(source: Arc<dyn EconomicDataSource>) -> Self {
        Self { source }
    }
}

/// Weekly net liquidity (USD bn) aligned on the most recent observations.
pub(crate) fn net_liquidity_series(walcl_mn: &[f64], tga_bn: &[f64], rrp_daily_bn: &[f64]) -> Vec<f64> {
    let rrp = super::every_nth_from_end(rrp_daily_bn, BUSINESS_DAYS_PER_WEEK);
    let n = walcl_mn.len().min(tga_bn.len()).min(rrp.len());
    let walcl = &walcl_mn[walcl_mn.len() - n..];
    let tga = &tga_bn[tga_bn.len() - n..];
    let rrp = &rrp[rrp.len() - n..];
    (0..n).map(|i| walcl[i] / 1000.0 - tga[i] - rrp[i]).collect()
}

/// Fetch the three component series through the runtime cache and combine
/// them.
pub(crate) async fn fetch_net_liquidity(
    ctx: &ExecutionContext,
    source: &dyn EconomicDataSource,
    weeks: usize,
) -> Result<Vec<f64>, EngineError> {
    let daily = weeks * BUSINESS_DAYS_PER_WEEK;
    let walcl = cached_series(
        ctx,
        format!("{FED_BALANCE_SHEET}:{weeks}"),
        source.series(FED_BALANCE_SHEET, weeks),
    )
    .await?;
    let tga = cached_series(
        ctx,
        format!("{TREASURY_ACCOUNT}:{weeks}"),
        source.series(TREASURY_ACCOUNT, weeks),
    )
    .await?;
    let rrp = cached_series(
        ctx,
        format!("{REVERSE_REPO}:{daily}"),
        source.series(REVERSE_REPO, daily),
    )
    .await?;
    Ok(net_liquidity_series(&walcl, &tga, &rrp))
}

#[async_trait]
impl Engine for NetLiquidityEngine {
    fn id(&self) -> &str {
        "net_liquidity"
    }

    fn name(&self) -> &str {
        "Net Liquidity"
    }

    fn tier(&self) -> EngineTier {
        EngineTier::Foundation
    }

    fn fallback(&self) -> EngineFallback {
        let mut data = Map::new();
        data.insert(
            "series".into(),
            Value::from(vec![FED_BALANCE_SHEET, TREASURY_ACCOUNT, REVERSE_REPO]),
        );
        EngineFallback { value: 0.0, data }
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let net = fetch_net_liquidity(ctx, self.source.as_ref(), LOOKBACK_WEEKS).await?;
        let n = net.len();
        require_len("net liquidity weeks", n, MIN_WEEKS)?;

        let latest = net[n - 1];
        let base = net[n - 1 - CHANGE_WEEKS];
        if base <= 0.0 {
            return Err(EngineError::computation(format!(
                "non-positive net liquidity base {base}"
            )));
        }
        let change_4w_pct = (latest / base - 1.0) * 100.0;

        let weekly_pct: Vec<f64> = simple_returns(&net).into_iter().map(|r| r * 100.0).collect();
        let (history, last) = weekly_pct.split_at(weekly_pct.len() - 1);
        let cleaned = detect_outliers(history, OutlierMethod::Mad, None)?;
        let weekly_z = z_score(last[0], &cleaned.clean_data)?;

        let signal = classify(change_4w_pct, SIGNAL_THRESHOLD_PCT, -SIGNAL_THRESHOLD_PCT);
        let value = clamp_value(change_4w_pct * 0.5 + weekly_z * 0.25);
        let conf = confidence(change_4w_pct.abs() / 3.0, n, LOOKBACK_WEEKS);

        debug!(
            net_liquidity_bn = latest,
            change_4w_pct,
            weekly_z,
            %signal,
            "net liquidity computed"
        );

        Ok(EngineReport::success(signal, conf, value)
            .with_data("net_liquidity_bn", round_to(latest, 2))
            .with_data("change_4w_pct", round_to(change_4w_pct, 4))
            .with_data("weekly_change_z", round_to(weekly_z, 4))
            .with_data("outliers_removed", cleaned.outliers.len())
            .with_data("weeks", n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::test_support::context;
    use crate::providers::testing::{wiggle, StaticEconomicData};
    use crate::types::Signal;

    /// Net liquidity of roughly 5800 + slope * week (USD bn).
    fn source_with_slope(slope_bn: f64) -> StaticEconomicData {
        let walcl: Vec<f64> = (0..LOOKBACK_WEEKS)
            .map(|w| (7000.0 + slope_bn * w as f64) * 1000.0)
            .collect();
        let tga: Vec<f64> = (0..LOOKBACK_WEEKS).map(|w| 700.0 + 10.0 * wiggle(w)).collect();
        let rrp = vec![500.0; LOOKBACK_WEEKS * BUSINESS_DAYS_PER_WEEK];
        StaticEconomicData::new()
            .with_series(FED_BALANCE_SHEET, walcl)
            .with_series(TREASURY_ACCOUNT, tga)
            .with_series(REVERSE_REPO, rrp)
    }

    #[test]
    fn series_combines_units_and_aligns_on_latest() {
        let walcl = vec![8_000_000.0, 8_100_000.0, 8_200_000.0];
        let tga = vec![750.0, 800.0];
        // Sampled every 5th from the end: indices 9 and 4.
        let rrp: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let net = net_liquidity_series(&walcl, &tga, &rrp);
        assert_eq!(net, vec![8100.0 - 750.0 - 104.0, 8200.0 - 800.0 - 109.0]);
    }

    #[tokio::test]
    async fn rising_liquidity_is_bullish() {
        let engine = NetLiquidityEngine::new(Arc::new(source_with_slope(30.0)));
        let report = engine.perform_execution(&context("net_liquidity")).await.unwrap();
        assert!(report.success);
        assert_eq!(report.signal, Signal::Bullish);
        assert!(report.value > 0.0);
        assert!(report.data["change_4w_pct"].as_f64().unwrap() > 1.0);
        assert_eq!(report.data["weeks"], 52);
    }

    #[tokio::test]
    async fn draining_liquidity_is_bearish() {
        let engine = NetLiquidityEngine::new(Arc::new(source_with_slope(-30.0)));
        let report = engine.perform_execution(&context("net_liquidity")).await.unwrap();
        assert_eq!(report.signal, Signal::Bearish);
        assert!(report.value < 0.0);
    }

    #[tokio::test]
    async fn component_series_are_cached() {
        let source = Arc::new(source_with_slope(30.0));
        let engine = NetLiquidityEngine::new(source.clone());
        let ctx = context("net_liquidity");
        engine.perform_execution(&ctx).await.unwrap();
        engine.perform_execution(&ctx).await.unwrap();
        assert_eq!(source.requests(), 3);
    }

    #[tokio::test]
    async fn short_history_is_an_error() {
        let source = StaticEconomicData::new()
            .with_series(FED_BALANCE_SHEET, vec![7_000_000.0; 5])
            .with_series(TREASURY_ACCOUNT, vec![700.0; 5])
            .with_series(REVERSE_REPO, vec![500.0; 25]);
        let engine = NetLiquidityEngine::new(Arc::new(source));
        let err = engine.perform_execution(&context("net_liquidity")).await.unwrap_err();
        assert!(err.to_string().contains("insufficient"));
    }

    #[tokio::test]
    async fn missing_series_surfaces_provider_error() {
        let engine = NetLiquidityEngine::new(Arc::new(StaticEconomicData::new()));
        let err = engine.perform_execution(&context("net_liquidity")).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));
    }
}
