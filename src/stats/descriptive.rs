// =============================================================================
// Descriptive Statistics
// =============================================================================
//
// Variance and standard deviation are *sample* statistics (divisor n - 1).
// Skewness and kurtosis are the third and fourth standardised moments; the
// kurtosis is reported as excess kurtosis (minus 3). Both collapse to 0 when
// the series has no spread.

use super::{StatsError, StatsResult};

/// Reject empty or non-finite input.
pub(crate) fn validate(data: &[f64], what: &str) -> StatsResult<()> {
    if data.is_empty() {
        return Err(StatsError::InvalidInput(format!("{what}: empty input")));
    }
    if let Some(bad) = data.iter().find(|x| !x.is_finite()) {
        return Err(StatsError::InvalidInput(format!(
            "{what}: non-finite value {bad}"
        )));
    }
    Ok(())
}

/// Copy and sort ascending. Callers have already rejected NaN.
pub(crate) fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v
}

pub(crate) fn raw_mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

pub(crate) fn raw_variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = raw_mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Arithmetic mean.
pub fn mean(data: &[f64]) -> StatsResult<f64> {
    validate(data, "mean")?;
    Ok(raw_mean(data))
}

/// Median (average of the two middle values for even lengths).
pub fn median(data: &[f64]) -> StatsResult<f64> {
    validate(data, "median")?;
    Ok(sorted_median(&sorted_copy(data)))
}

pub(crate) fn sorted_median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Sample variance. A single observation has zero variance.
pub fn variance(data: &[f64]) -> StatsResult<f64> {
    validate(data, "variance")?;
    Ok(raw_variance(data))
}

/// Sample standard deviation.
pub fn standard_deviation(data: &[f64]) -> StatsResult<f64> {
    Ok(variance(data)?.sqrt())
}

/// Value at percentile `p` (0–100) of already-sorted data, linearly
/// interpolated between the two bracketing order statistics.
pub fn percentile(sorted_data: &[f64], p: f64) -> StatsResult<f64> {
    if sorted_data.is_empty() {
        return Err(StatsError::InvalidInput("percentile: empty input".into()));
    }
    if !p.is_finite() {
        return Err(StatsError::InvalidInput(format!(
            "percentile: non-finite rank {p}"
        )));
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Ok(sorted_data[lower]);
    }
    let weight = rank - lower as f64;
    Ok(sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight)
}

fn standardised_moment(data: &[f64], power: i32) -> Option<f64> {
    let m = raw_mean(data);
    let std = raw_variance(data).sqrt();
    if std < f64::EPSILON {
        return None;
    }
    let sum: f64 = data.iter().map(|x| ((x - m) / std).powi(power)).sum();
    Some(sum / data.len() as f64)
}

/// Third standardised moment. Returns 0 for a flat series.
pub fn skewness(data: &[f64]) -> StatsResult<f64> {
    validate(data, "skewness")?;
    Ok(standardised_moment(data, 3).unwrap_or(0.0))
}

/// Excess kurtosis (fourth standardised moment minus 3). Returns 0 for a
/// flat series.
pub fn kurtosis(data: &[f64]) -> StatsResult<f64> {
    validate(data, "kurtosis")?;
    Ok(standardised_moment(data, 4).map(|k| k - 3.0).unwrap_or(0.0))
}

/// Pearson correlation coefficient of two equally long series.
///
/// Returns 0 when either series has zero variance.
pub fn correlation(x: &[f64], y: &[f64]) -> StatsResult<f64> {
    if x.len() != y.len() {
        return Err(StatsError::InvalidInput(format!(
            "correlation: length mismatch ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    validate(x, "correlation")?;
    validate(y, "correlation")?;

    let mx = raw_mean(x);
    let my = raw_mean(y);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom < f64::EPSILON {
        return Ok(0.0);
    }
    Ok((cov / denom).clamp(-1.0, 1.0))
}
