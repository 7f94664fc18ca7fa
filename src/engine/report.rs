// =============================================================================
// Engine Report — output of one execution attempt
// =============================================================================
//
// Only `success`, `confidence`, `signal` and `value` are read by the core.
// `data` is an engine-defined map the core never inspects, except for the
// `stale` flag it writes itself on degraded reports.
//
// Invariant: success = false  =>  confidence = 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Signal;

/// Confidence carried by a degraded (stale / fallback) report.
pub const DEGRADED_CONFIDENCE: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub success: bool,
    /// Confidence in [0, 100].
    pub confidence: f64,
    pub signal: Signal,
    /// Primary numeric output consumed by the aggregator.
    pub value: f64,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub produced_at: DateTime<Utc>,
}

/// Defaults an engine falls back to when it has never produced a good report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineFallback {
    pub value: f64,
    pub data: Map<String, Value>,
}

impl EngineReport {
    /// A successful report. Confidence is clamped to [0, 100].
    pub fn success(signal: Signal, confidence: f64, value: f64) -> Self {
        Self {
            success: true,
            confidence: clamp_confidence(confidence),
            signal,
            value,
            data: Map::new(),
            errors: Vec::new(),
            produced_at: Utc::now(),
        }
    }

    /// A hard-error report.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            signal: Signal::Neutral,
            value: 0.0,
            data: Map::new(),
            errors: vec![message.into()],
            produced_at: Utc::now(),
        }
    }

    /// A degraded report built from the last good report when one exists,
    /// otherwise from the engine's fallback defaults.
    pub fn degraded(
        last_good: Option<&EngineReport>,
        fallback: &EngineFallback,
        message: impl Into<String>,
    ) -> Self {
        let (mut data, value, last_success_at) = match last_good {
            Some(prev) => (prev.data.clone(), prev.value, Some(prev.produced_at)),
            None => (fallback.data.clone(), fallback.value, None),
        };
        data.insert("stale".into(), Value::Bool(true));
        data.insert("fallback".into(), Value::Bool(last_good.is_none()));
        if let Some(at) = last_success_at {
            data.insert("last_success_at".into(), Value::String(at.to_rfc3339()));
        }

        Self {
            success: true,
            confidence: DEGRADED_CONFIDENCE,
            signal: Signal::Neutral,
            value,
            data,
            errors: vec![message.into()],
            produced_at: Utc::now(),
        }
    }

    /// Attach one entry to the engine-defined payload.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// True for degraded reports.
    pub fn is_stale(&self) -> bool {
        matches!(self.data.get("stale"), Some(Value::Bool(true)))
    }

    /// Re-establish the confidence invariants on a report an engine built by
    /// hand.
    pub(crate) fn normalised(mut self) -> Self {
        self.confidence = if self.success {
            clamp_confidence(self.confidence)
        } else {
            0.0
        };
        self
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
