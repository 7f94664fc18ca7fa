// =============================================================================
// Rolling-Window Statistics
// =============================================================================
//
// `rolling_statistics` yields one summary per full sliding window, starting at
// index `window_size - 1` and ending at the last element. The iterator is
// lazy and borrows the input; clone it (or call `restart`) to walk the
// windows again.

use serde::Serialize;

use super::descriptive::{raw_mean, raw_variance, validate};
use super::{StatsError, StatsResult};

/// Summary of the window ending at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingStat {
    pub index: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

#[derive(Debug, Clone)]
pub struct RollingWindows<'a> {
    data: &'a [f64],
    window: usize,
    next_index: usize,
}

impl<'a> RollingWindows<'a> {
    /// Rewind to the first window.
    pub fn restart(&mut self) {
        self.next_index = self.window - 1;
    }
}

impl Iterator for RollingWindows<'_> {
    type Item = RollingStat;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.data.len() {
            return None;
        }
        let end = self.next_index;
        let slice = &self.data[end + 1 - self.window..=end];
        self.next_index += 1;

        let min = slice.iter().copied().fold(f64::INFINITY, f64::min);
        let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(RollingStat {
            index: end,
            mean: raw_mean(slice),
            std: raw_variance(slice).sqrt(),
            min,
            max,
            range: max - min,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RollingWindows<'_> {}

/// Sliding-window statistics over `data`.
pub fn rolling_statistics(data: &[f64], window_size: usize) -> StatsResult<RollingWindows<'_>> {
    validate(data, "rolling_statistics")?;
    if window_size == 0 || window_size > data.len() {
        return Err(StatsError::InvalidInput(format!(
            "rolling_statistics: window {window_size} invalid for {} points",
            data.len()
        )));
    }
    Ok(RollingWindows {
        data,
        window: window_size,
        next_index: window_size - 1,
    })
}
