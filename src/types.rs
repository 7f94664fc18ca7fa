// =============================================================================
// Shared types used across the liquidity engine core
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional vote emitted by a single engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Priority band controlling execution order. Lower tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineTier {
    Foundation,
    Core,
    Synthesis,
}

impl std::fmt::Display for EngineTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foundation => write!(f, "foundation"),
            Self::Core => write!(f, "core"),
            Self::Synthesis => write!(f, "synthesis"),
        }
    }
}

/// Composite decision produced by the signal aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasterSignal {
    #[serde(rename = "RISK_ON")]
    RiskOn,
    #[serde(rename = "RISK_OFF")]
    RiskOff,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

impl std::fmt::Display for MasterSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RiskOn => write!(f, "RISK_ON"),
            Self::RiskOff => write!(f, "RISK_OFF"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Liquidity regime derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Expansion,
    Contraction,
    Transition,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expansion => write!(f, "expansion"),
            Self::Contraction => write!(f, "contraction"),
            Self::Transition => write!(f, "transition"),
        }
    }
}

/// How contested the current composite signal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConflictLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}
