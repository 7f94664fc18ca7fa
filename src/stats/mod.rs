// =============================================================================
// Statistics Library
// =============================================================================
//
// Pure, stateless numeric helpers used by the engines to turn raw provider
// observations into per-engine signals:
// - Descriptive statistics (mean, median, variance, moments, percentile)
// - Outlier detection (IQR, MAD, percentile, z-score)
// - Distribution analysis (raw vs outlier-cleaned moments)
// - Rolling-window statistics and Pearson correlation
//
// Invalid input (empty, non-finite, mismatched lengths) is reported as
// `StatsError::InvalidInput`; degenerate spreads (std = 0, MAD = 0) are not
// errors and resolve to neutral values instead.

pub mod descriptive;
pub mod distribution;
pub mod outliers;
pub mod rolling;

use thiserror::Error;

pub use descriptive::{
    correlation, kurtosis, mean, median, percentile, skewness, standard_deviation, variance,
};
pub use distribution::{analyze_distribution, DistributionAnalysis};
pub use outliers::{detect_outliers, OutlierConfig, OutlierMethod, OutlierResult};
pub use rolling::{rolling_statistics, RollingStat, RollingWindows};

/// Validation failure raised by the statistics functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
