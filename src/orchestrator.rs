// =============================================================================
// Orchestrator — one sequential, fault-isolated pass over every engine
// =============================================================================
//
// Engines run strictly one after another in the registry's execution plan
// (tier first, registration order within a tier), with a configurable pause
// between invocations to spread load on shared upstream providers. A failing
// engine never aborts the run: its runtime already turned the failure into a
// degraded or hard-error report, which is recorded and the pass moves on.
//
// Reports are handed to the signal aggregator in invocation order and the
// composite is merged into a fresh `OrchestrationResult`.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{EngineRegistry, EngineReport};
use crate::signals::{SignalAggregator, VoteBreakdown};
use crate::types::{ConflictLevel, EngineTier, MasterSignal, Regime};

// =============================================================================
// Errors
// =============================================================================

/// Orchestration-level failures. These are the only errors that surface at
/// the external boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("engine '{0}' is already registered")]
    DuplicateEngine(String),

    #[error("engine '{engine}' depends on unknown engine '{dependency}'")]
    UnknownDependency { engine: String, dependency: String },

    #[error("engine '{engine}' depends on '{dependency}', which does not run before it")]
    DependencyOrder { engine: String, dependency: String },

    #[error("an orchestration run is already in progress")]
    Busy,
}

// =============================================================================
// Result types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReportEntry {
    pub engine_id: String,
    pub tier: EngineTier,
    pub report: EngineReport,
}

/// An engine that failed or served degraded data during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineFailure {
    pub engine_id: String,
    pub message: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub run_id: Uuid,
    /// Engines that produced a fresh successful report.
    pub engines_executed: usize,
    /// Every engine invoked, including degraded and failed ones.
    pub engines_attempted: usize,
    pub per_engine_reports: Vec<EngineReportEntry>,
    pub master_signal: MasterSignal,
    pub signal_strength: f64,
    pub clis: f64,
    pub consensus: f64,
    pub conflict_level: ConflictLevel,
    pub regime: Regime,
    pub votes: VoteBreakdown,
    pub errors: Vec<EngineFailure>,
    pub forced: bool,
    pub execution_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    registry: Arc<EngineRegistry>,
    aggregator: SignalAggregator,
    inter_engine_delay: Duration,
    run_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<EngineRegistry>,
        aggregator: SignalAggregator,
        inter_engine_delay: Duration,
    ) -> Self {
        Self {
            registry,
            aggregator,
            inter_engine_delay,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Run every registered engine once and aggregate the results.
    ///
    /// With `force = false`, engines holding a fresh report reuse it.
    pub async fn run(&self, force: bool) -> Result<OrchestrationResult, OrchestrationError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| OrchestrationError::Busy)?;

        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let plan = self.registry.execution_plan()?;
        info!(%run_id, engines = plan.len(), force, "orchestration started");

        let mut entries = Vec::with_capacity(plan.len());
        for (i, (meta, runtime)) in plan.iter().enumerate() {
            if i > 0 && !self.inter_engine_delay.is_zero() {
                tokio::time::sleep(self.inter_engine_delay).await;
            }

            let report = runtime.execute_with(force).await;
            debug!(
                %run_id,
                engine_id = %meta.id,
                tier = %meta.tier,
                success = report.success,
                stale = report.is_stale(),
                "engine finished"
            );
            entries.push(EngineReportEntry {
                engine_id: meta.id.clone(),
                tier: meta.tier,
                report,
            });
        }

        let errors: Vec<EngineFailure> = entries
            .iter()
            .filter(|e| !e.report.success || e.report.is_stale())
            .map(|e| EngineFailure {
                engine_id: e.engine_id.clone(),
                message: failure_message(&e.report),
                degraded: e.report.success,
            })
            .collect();
        let engines_executed = entries
            .iter()
            .filter(|e| e.report.success && !e.report.is_stale())
            .count();

        let aggregate = self.aggregator.aggregate(entries.iter().map(|e| &e.report));
        let execution_time_ms = started.elapsed().as_millis() as u64;

        if !errors.is_empty() {
            warn!(
                %run_id,
                failed = errors.len(),
                engines = ?errors.iter().map(|e| e.engine_id.as_str()).collect::<Vec<_>>(),
                "orchestration completed with engine failures"
            );
        }
        info!(
            %run_id,
            master_signal = %aggregate.master_signal,
            clis = aggregate.clis,
            consensus = format!("{:.3}", aggregate.consensus),
            conflict = %aggregate.conflict_level,
            regime = %aggregate.regime,
            executed = engines_executed,
            attempted = entries.len(),
            execution_time_ms,
            "orchestration completed"
        );

        Ok(OrchestrationResult {
            run_id,
            engines_executed,
            engines_attempted: entries.len(),
            per_engine_reports: entries,
            master_signal: aggregate.master_signal,
            signal_strength: aggregate.strength,
            clis: aggregate.clis,
            consensus: aggregate.consensus,
            conflict_level: aggregate.conflict_level,
            regime: aggregate.regime,
            votes: aggregate.votes,
            errors,
            forced: force,
            execution_time_ms,
            completed_at: Utc::now(),
        })
    }
}

fn failure_message(report: &EngineReport) -> String {
    if report.errors.is_empty() {
        "degraded".to_string()
    } else {
        report.errors.join("; ")
    }
}
