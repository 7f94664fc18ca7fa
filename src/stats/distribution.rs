// =============================================================================
// Distribution Analysis
// =============================================================================
//
// Summary statistics are always computed from the full series. When an
// outlier configuration is supplied, mean/skewness/kurtosis are computed a
// second time from the cleaned series and reported separately, so a caller
// sees both the raw and the robust centre.
//
// Rounding: raw statistics to 4 decimals, cleaned statistics to 2 decimals.

use serde::Serialize;

use super::descriptive::{
    percentile, raw_mean, raw_variance, sorted_copy, sorted_median, validate,
};
use super::outliers::{detect_outliers, OutlierConfig, OutlierMethod};
use super::{kurtosis, round_to, skewness, StatsResult};

const RAW_DECIMALS: i32 = 4;
const CLEAN_DECIMALS: i32 = 2;

/// Moments recomputed after outlier removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanStatistics {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub count: usize,
    pub outliers: Vec<f64>,
    pub mean: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionAnalysis {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanStatistics>,
}

impl DistributionAnalysis {
    /// Mean of the cleaned series when available, otherwise the raw mean.
    pub fn robust_mean(&self) -> f64 {
        self.clean.as_ref().map(|c| c.mean).unwrap_or(self.mean)
    }
}

/// Analyse the distribution of `data`, optionally with an outlier-cleaned
/// second pass.
pub fn analyze_distribution(
    data: &[f64],
    outlier_config: Option<OutlierConfig>,
) -> StatsResult<DistributionAnalysis> {
    validate(data, "analyze_distribution")?;

    let sorted = sorted_copy(data);
    let variance = raw_variance(data);
    let q1 = percentile(&sorted, 25.0)?;
    let q3 = percentile(&sorted, 75.0)?;

    let clean = match outlier_config {
        Some(cfg) => {
            let threshold = cfg.threshold.unwrap_or_else(|| cfg.method.default_threshold());
            let split = detect_outliers(data, cfg.method, Some(threshold))?;
            let cleaned = &split.clean_data;
            Some(CleanStatistics {
                method: cfg.method,
                threshold,
                count: cleaned.len(),
                mean: round_to(super::mean(cleaned)?, CLEAN_DECIMALS),
                skewness: round_to(skewness(cleaned)?, CLEAN_DECIMALS),
                kurtosis: round_to(kurtosis(cleaned)?, CLEAN_DECIMALS),
                outliers: split.outliers,
            })
        }
        None => None,
    };

    Ok(DistributionAnalysis {
        count: data.len(),
        mean: round_to(raw_mean(data), RAW_DECIMALS),
        median: round_to(sorted_median(&sorted), RAW_DECIMALS),
        std_dev: round_to(variance.sqrt(), RAW_DECIMALS),
        variance: round_to(variance, RAW_DECIMALS),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q1: round_to(q1, RAW_DECIMALS),
        q3: round_to(q3, RAW_DECIMALS),
        iqr: round_to(q3 - q1, RAW_DECIMALS),
        skewness: round_to(skewness(data)?, RAW_DECIMALS),
        kurtosis: round_to(kurtosis(data)?, RAW_DECIMALS),
        clean,
    })
}
