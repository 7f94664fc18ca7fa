// =============================================================================
// Central Application State — Liquidity Pulse
// =============================================================================
//
// Ties the engine registry, the orchestrator and the last orchestration
// result together for the REST API and the scheduled orchestration loop.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared values.
//   - The registry and runtimes manage their own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::engine::EngineRegistry;
use crate::orchestrator::{OrchestrationError, OrchestrationResult, Orchestrator};
use crate::providers::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::runtime_config::RuntimeConfig;
use crate::signals::SignalAggregator;

/// A recorded orchestration failure for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    /// Incremented on every completed orchestration or recorded error.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    pub registry: Arc<EngineRegistry>,
    pub orchestrator: Arc<Orchestrator>,

    pub last_result: RwLock<Option<OrchestrationResult>>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Exchange request-weight tracker shared with the Binance client.
    pub rate_limit: Option<Arc<RateLimitTracker>>,

    /// Instant when the service was started. Used for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the state around an already populated registry.
    pub fn new(config: RuntimeConfig, registry: Arc<EngineRegistry>) -> Self {
        let aggregator = SignalAggregator::new(config.expansion_threshold, config.contraction_threshold);
        let orchestrator = Orchestrator::new(
            Arc::clone(&registry),
            aggregator,
            config.inter_engine_delay(),
        );

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            registry,
            orchestrator: Arc::new(orchestrator),
            last_result: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            rate_limit: None,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_rate_limit(mut self, tracker: Arc<RateLimitTracker>) -> Self {
        self.rate_limit = Some(tracker);
        self
    }

    pub fn rate_limit_snapshot(&self) -> Option<RateLimitSnapshot> {
        self.rate_limit.as_ref().map(|tracker| tracker.snapshot())
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message; oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Orchestration ───────────────────────────────────────────────────

    /// Run one orchestration pass and publish its result. A `Busy`
    /// rejection is returned to the caller but not recorded as an error.
    pub async fn run_orchestration(
        &self,
        force: bool,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        match self.orchestrator.run(force).await {
            Ok(result) => {
                *self.last_result.write() = Some(result.clone());
                self.increment_version();
                Ok(result)
            }
            Err(OrchestrationError::Busy) => Err(OrchestrationError::Busy),
            Err(e) => {
                warn!(error = %e, "orchestration failed");
                self.push_error(e.to_string());
                Err(e)
            }
        }
    }

    pub fn last_result(&self) -> Option<OrchestrationResult> {
        self.last_result.read().clone()
    }

    /// Engines registered and not shut down.
    pub fn available_engine_count(&self) -> usize {
        self.registry
            .runtimes()
            .iter()
            .filter(|rt| !rt.is_shut_down())
            .count()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Shut every engine runtime down.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
        self.increment_version();
    }
}
