// =============================================================================
// Signals Module
// =============================================================================
//
// Reduction of many independent per-engine reports into one composite
// decision: master signal, strength, consensus, conflict level, the bounded
// composite liquidity score (CLIS) and the liquidity regime.

pub mod aggregator;

pub use aggregator::{AggregateSignal, SignalAggregator, VoteBreakdown};
