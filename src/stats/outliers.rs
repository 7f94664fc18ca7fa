// =============================================================================
// Outlier Detection
// =============================================================================
//
// Four interchangeable methods sharing one signature and one result shape:
//
//   IQR         flag x < Q1 - k*IQR or x > Q3 + k*IQR          (default k = 1.5)
//   MAD         flag 0.6745 * |x - median| / MAD > threshold   (default 2.5)
//   Percentile  flag x below the p-th or above the (100-p)-th  (default p = 5)
//   Z-score     flag |x - mean| / std > threshold              (default 3.0)
//
// A zero spread (MAD = 0, std = 0) means "no outliers", never an error.
// Both output lists preserve the input order.

use serde::{Deserialize, Serialize};

use super::descriptive::{percentile, raw_mean, raw_variance, sorted_copy, sorted_median, validate};
use super::{StatsError, StatsResult};

/// Consistency constant relating MAD to the standard deviation of a normal
/// distribution.
const MAD_SCALE: f64 = 0.6745;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    Mad,
    Percentile,
    ZScore,
}

impl OutlierMethod {
    pub fn default_threshold(self) -> f64 {
        match self {
            Self::Iqr => 1.5,
            Self::Mad => 2.5,
            Self::Percentile => 5.0,
            Self::ZScore => 3.0,
        }
    }
}

impl std::fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iqr => write!(f, "iqr"),
            Self::Mad => write!(f, "mad"),
            Self::Percentile => write!(f, "percentile"),
            Self::ZScore => write!(f, "z_score"),
        }
    }
}

/// Method plus optional threshold override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl OutlierConfig {
    pub fn new(method: OutlierMethod) -> Self {
        Self {
            method,
            threshold: None,
        }
    }

    pub fn with_threshold(method: OutlierMethod, threshold: f64) -> Self {
        Self {
            method,
            threshold: Some(threshold),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierResult {
    pub outliers: Vec<f64>,
    pub clean_data: Vec<f64>,
}

impl OutlierResult {
    fn partition(data: &[f64], is_outlier: impl Fn(f64) -> bool) -> Self {
        let (outliers, clean_data) = data.iter().copied().partition(|&x| is_outlier(x));
        Self {
            outliers,
            clean_data,
        }
    }

    fn none(data: &[f64]) -> Self {
        Self {
            outliers: Vec::new(),
            clean_data: data.to_vec(),
        }
    }
}

/// Split `data` into outliers and clean values using `method`.
///
/// `threshold` falls back to [`OutlierMethod::default_threshold`].
pub fn detect_outliers(
    data: &[f64],
    method: OutlierMethod,
    threshold: Option<f64>,
) -> StatsResult<OutlierResult> {
    validate(data, "detect_outliers")?;
    let threshold = threshold.unwrap_or_else(|| method.default_threshold());
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(StatsError::InvalidInput(format!(
            "detect_outliers: invalid threshold {threshold}"
        )));
    }

    let result = match method {
        OutlierMethod::Iqr => {
            let sorted = sorted_copy(data);
            let q1 = percentile(&sorted, 25.0)?;
            let q3 = percentile(&sorted, 75.0)?;
            let iqr = q3 - q1;
            let lower = q1 - threshold * iqr;
            let upper = q3 + threshold * iqr;
            OutlierResult::partition(data, |x| x < lower || x > upper)
        }
        OutlierMethod::Mad => {
            let sorted = sorted_copy(data);
            let med = sorted_median(&sorted);
            let deviations: Vec<f64> = data.iter().map(|x| (x - med).abs()).collect();
            let mad = sorted_median(&sorted_copy(&deviations));
            if mad < f64::EPSILON {
                OutlierResult::none(data)
            } else {
                OutlierResult::partition(data, |x| MAD_SCALE * (x - med).abs() / mad > threshold)
            }
        }
        OutlierMethod::Percentile => {
            if threshold >= 50.0 {
                return Err(StatsError::InvalidInput(format!(
                    "detect_outliers: percentile threshold {threshold} must be below 50"
                )));
            }
            let sorted = sorted_copy(data);
            let lower = percentile(&sorted, threshold)?;
            let upper = percentile(&sorted, 100.0 - threshold)?;
            OutlierResult::partition(data, |x| x < lower || x > upper)
        }
        OutlierMethod::ZScore => {
            let m = raw_mean(data);
            let std = raw_variance(data).sqrt();
            if std < f64::EPSILON {
                OutlierResult::none(data)
            } else {
                OutlierResult::partition(data, |x| ((x - m) / std).abs() > threshold)
            }
        }
    };

    Ok(result)
}
