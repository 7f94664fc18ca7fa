// =============================================================================
// Engine Metrics — rolling health bookkeeping for one runtime
// =============================================================================
//
// Health score, recomputed after every attempt:
//
//   health = 0.4 * success_rate
//          + 0.3 * max(0, 100 - 20 * consecutive_failures)
//          + 0.3 * min(100, hours_up * 10)
//
// Consecutive failures weigh in harder than the long-run success rate so a
// flapping engine drops quickly even when its history is good.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Compute the health score in [0, 100].
pub fn health_score(success_rate: f64, consecutive_failures: u32, uptime_hours: f64) -> f64 {
    let failure_term = (100.0 - 20.0 * consecutive_failures as f64).max(0.0);
    let uptime_term = (uptime_hours * 10.0).min(100.0);
    (0.4 * success_rate + 0.3 * failure_term + 0.3 * uptime_term).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub total_executions: u64,
    pub successful_executions: u64,
    /// Percentage of attempts that produced a fresh report, in [0, 100].
    pub success_rate: f64,
    pub consecutive_failures: u32,
    /// Running mean confidence of every report handed out.
    pub average_confidence: f64,
    pub health_score: f64,
    pub uptime_ms: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_execution_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            total_executions: 0,
            successful_executions: 0,
            success_rate: 100.0,
            consecutive_failures: 0,
            average_confidence: 0.0,
            health_score: health_score(100.0, 0, 0.0),
            uptime_ms: 0,
            last_success_at: None,
            last_execution_ms: None,
            last_error: None,
        }
    }

    pub fn record_success(&mut self, confidence: f64, elapsed_ms: u64, uptime_ms: u64) {
        self.successful_executions += 1;
        self.consecutive_failures = 0;
        self.last_success_at = Some(Utc::now());
        self.last_error = None;
        self.record_attempt(confidence, elapsed_ms, uptime_ms);
    }

    pub fn record_failure(
        &mut self,
        confidence: f64,
        message: impl Into<String>,
        elapsed_ms: u64,
        uptime_ms: u64,
    ) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(message.into());
        self.record_attempt(confidence, elapsed_ms, uptime_ms);
    }

    fn record_attempt(&mut self, confidence: f64, elapsed_ms: u64, uptime_ms: u64) {
        self.total_executions += 1;
        let n = self.total_executions as f64;
        self.success_rate = self.successful_executions as f64 / n * 100.0;
        self.average_confidence += (confidence - self.average_confidence) / n;
        self.uptime_ms = uptime_ms;
        self.last_execution_ms = Some(elapsed_ms);
        self.health_score = health_score(
            self.success_rate,
            self.consecutive_failures,
            uptime_ms as f64 / 3_600_000.0,
        );
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
