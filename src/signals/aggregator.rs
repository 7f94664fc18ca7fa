// =============================================================================
// Signal Aggregator — composite decision from per-engine reports
// =============================================================================
//
// Voting:
//   - Every successful report votes with its signal. Degraded reports are
//     successful and vote neutral, so a persistently failing engine shifts
//     consensus instead of disappearing. Hard failures do not vote.
//   - A category wins only with a strict majority over the other two
//     combined; otherwise the master signal is NEUTRAL.
//
// Scores:
//   strength   = votes(master category) / voters
//   consensus  = max(votes) / voters
//   CLIS       = clamp(5 + 2 * mean(value), 1, 10), one decimal
//   regime     = CLIS > 7 expansion, CLIS < 3 contraction, else transition
//   conflict   = consensus > 0.7 low, > 0.5 medium, else high
//
// With no voters the result is NEUTRAL, CLIS 5.0, consensus 0.5, conflict
// high.

use serde::Serialize;

use crate::engine::EngineReport;
use crate::types::{ConflictLevel, MasterSignal, Regime, Signal};

const CLIS_MIN: f64 = 1.0;
const CLIS_MAX: f64 = 10.0;
const CLIS_BASE: f64 = 5.0;
const CLIS_SCALE: f64 = 2.0;

/// Vote counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteBreakdown {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
}

impl VoteBreakdown {
    pub fn total(&self) -> usize {
        self.bullish + self.bearish + self.neutral
    }

    fn record(&mut self, signal: Signal) {
        match signal {
            Signal::Bullish => self.bullish += 1,
            Signal::Bearish => self.bearish += 1,
            Signal::Neutral => self.neutral += 1,
        }
    }

    fn max(&self) -> usize {
        self.bullish.max(self.bearish).max(self.neutral)
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSignal {
    pub master_signal: MasterSignal,
    pub strength: f64,
    pub consensus: f64,
    pub conflict_level: ConflictLevel,
    pub clis: f64,
    pub regime: Regime,
    pub votes: VoteBreakdown,
    pub average_value: f64,
}

/// Composite signal engine.
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    /// CLIS above which the regime is expansion.
    pub expansion_threshold: f64,
    /// CLIS below which the regime is contraction.
    pub contraction_threshold: f64,
}

impl SignalAggregator {
    pub fn new(expansion_threshold: f64, contraction_threshold: f64) -> Self {
        Self {
            expansion_threshold,
            contraction_threshold,
        }
    }

    /// Aggregate the reports of one orchestration run.
    pub fn aggregate<'a, I>(&self, reports: I) -> AggregateSignal
    where
        I: IntoIterator<Item = &'a EngineReport>,
    {
        let mut votes = VoteBreakdown::default();
        let mut value_sum = 0.0;
        for report in reports.into_iter().filter(|r| r.success) {
            votes.record(report.signal);
            value_sum += report.value;
        }

        let total = votes.total();
        if total == 0 {
            return AggregateSignal {
                master_signal: MasterSignal::Neutral,
                strength: 0.0,
                consensus: 0.5,
                conflict_level: ConflictLevel::High,
                clis: CLIS_BASE,
                regime: self.regime(CLIS_BASE),
                votes,
                average_value: 0.0,
            };
        }

        let master_signal = if votes.bullish * 2 > total {
            MasterSignal::RiskOn
        } else if votes.bearish * 2 > total {
            MasterSignal::RiskOff
        } else {
            MasterSignal::Neutral
        };
        let winning_votes = match master_signal {
            MasterSignal::RiskOn => votes.bullish,
            MasterSignal::RiskOff => votes.bearish,
            MasterSignal::Neutral => votes.neutral,
        };

        let n = total as f64;
        let strength = winning_votes as f64 / n;
        let consensus = votes.max() as f64 / n;
        let average_value = value_sum / n;
        let clis = composite_score(average_value);

        AggregateSignal {
            master_signal,
            strength,
            consensus,
            conflict_level: conflict_level(consensus),
            clis,
            regime: self.regime(clis),
            votes,
            average_value,
        }
    }

    fn regime(&self, clis: f64) -> Regime {
        if clis > self.expansion_threshold {
            Regime::Expansion
        } else if clis < self.contraction_threshold {
            Regime::Contraction
        } else {
            Regime::Transition
        }
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(7.0, 3.0)
    }
}

/// CLIS from the average engine value: clamped to [1, 10], one decimal.
pub fn composite_score(average_value: f64) -> f64 {
    if !average_value.is_finite() {
        return CLIS_BASE;
    }
    let raw = (CLIS_BASE + CLIS_SCALE * average_value).clamp(CLIS_MIN, CLIS_MAX);
    (raw * 10.0).round() / 10.0
}

fn conflict_level(consensus: f64) -> ConflictLevel {
    if consensus > 0.7 {
        ConflictLevel::Low
    } else if consensus > 0.5 {
        ConflictLevel::Medium
    } else {
        ConflictLevel::High
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn report(signal: Signal, value: f64) -> EngineReport {
        EngineReport::success(signal, 70.0, value)
    }

    fn repeat(signal: Signal, value: f64, n: usize) -> Vec<EngineReport> {
        (0..n).map(|_| report(signal, value)).collect()
    }

    #[test]
    fn bullish_majority_is_risk_on() {
        let mut reports = repeat(Signal::Bullish, 0.0, 5);
        reports.push(report(Signal::Bearish, 0.0));
        reports.push(report(Signal::Neutral, 0.0));

        let result = SignalAggregator::default().aggregate(&reports);
        assert_eq!(result.master_signal, MasterSignal::RiskOn);
        assert!((result.strength - 5.0 / 7.0).abs() < 1e-9);
        assert!((result.consensus - 5.0 / 7.0).abs() < 1e-9);
        assert_eq!(result.conflict_level, ConflictLevel::Low);
        assert_eq!(result.votes.total(), 7);
    }

    #[test]
    fn no_strict_majority_is_neutral() {
        let mut reports = repeat(Signal::Bearish, 0.0, 2);
        reports.extend(repeat(Signal::Bullish, 0.0, 2));
        let result = SignalAggregator::default().aggregate(&reports);
        assert_eq!(result.master_signal, MasterSignal::Neutral);
        assert!((result.consensus - 0.5).abs() < 1e-9);
        assert_eq!(result.conflict_level, ConflictLevel::High);

        let mut plurality = repeat(Signal::Bearish, 0.0, 3);
        plurality.extend(repeat(Signal::Bullish, 0.0, 2));
        plurality.push(report(Signal::Neutral, 0.0));
        let result = SignalAggregator::default().aggregate(&plurality);
        // 3 of 6 is not a strict majority.
        assert_eq!(result.master_signal, MasterSignal::Neutral);
    }

    #[test]
    fn bearish_majority_is_risk_off() {
        let mut reports = repeat(Signal::Bearish, -1.0, 3);
        reports.push(report(Signal::Neutral, 0.0));
        let result = SignalAggregator::default().aggregate(&reports);
        assert_eq!(result.master_signal, MasterSignal::RiskOff);
        assert!((result.strength - 0.75).abs() < 1e-9);
        assert_eq!(result.conflict_level, ConflictLevel::Low);
        // avg = -0.75 => 5 - 1.5 = 3.5
        assert!((result.clis - 3.5).abs() < 1e-9);
        assert_eq!(result.regime, Regime::Transition);
    }

    #[test]
    fn failed_reports_do_not_vote() {
        let mut reports = repeat(Signal::Bullish, 1.0, 2);
        reports.push(EngineReport::failure("down"));
        reports.push(EngineReport::failure("down"));
        let result = SignalAggregator::default().aggregate(&reports);
        assert_eq!(result.votes.total(), 2);
        assert_eq!(result.master_signal, MasterSignal::RiskOn);
        assert!((result.clis - 7.0).abs() < 1e-9);
    }

    #[test]
    fn clis_clamps_to_bounds() {
        let hot = repeat(Signal::Bullish, 50.0, 3);
        let result = SignalAggregator::default().aggregate(&hot);
        assert_eq!(result.clis, 10.0);
        assert_eq!(result.regime, Regime::Expansion);

        let cold = repeat(Signal::Bearish, -50.0, 3);
        let result = SignalAggregator::default().aggregate(&cold);
        assert_eq!(result.clis, 1.0);
        assert_eq!(result.regime, Regime::Contraction);
    }

    #[test]
    fn clis_rounds_to_one_decimal() {
        assert_eq!(composite_score(0.333), 5.7);
        assert_eq!(composite_score(-0.126), 4.7);
        assert_eq!(composite_score(f64::NAN), 5.0);
    }

    #[test]
    fn clis_depends_on_values_not_votes() {
        let reports = vec![report(Signal::Bearish, 1.5), report(Signal::Bearish, 1.5)];
        let result = SignalAggregator::default().aggregate(&reports);
        assert_eq!(result.master_signal, MasterSignal::RiskOff);
        assert_eq!(result.clis, 8.0);
        assert_eq!(result.regime, Regime::Expansion);
    }

    #[test]
    fn empty_input_has_defined_default() {
        let result = SignalAggregator::default().aggregate(&Vec::<EngineReport>::new());
        assert_eq!(result.master_signal, MasterSignal::Neutral);
        assert_eq!(result.clis, 5.0);
        assert_eq!(result.consensus, 0.5);
        assert_eq!(result.conflict_level, ConflictLevel::High);
        assert_eq!(result.regime, Regime::Transition);
    }

    #[test]
    fn medium_conflict_band() {
        let mut reports = repeat(Signal::Bullish, 0.0, 3);
        reports.extend(repeat(Signal::Neutral, 0.0, 2));
        let result = SignalAggregator::default().aggregate(&reports);
        // 3/5 = 0.6
        assert_eq!(result.conflict_level, ConflictLevel::Medium);
    }
}
