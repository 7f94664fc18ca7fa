// =============================================================================
// Engine Runtime — uniform operational guarantees around one engine
// =============================================================================
//
// Every engine, whatever it computes, gets the same treatment:
//
//   - Single-flight: concurrent `execute` calls share one in-flight attempt
//     and all observe the same report.
//   - Timeout: the computation runs on its own task and is raced against the
//     configured deadline. On timeout the task is left to finish in the
//     background and its result is discarded.
//   - Cache: a per-runtime TTL cache handed to the engine via its context.
//   - Health: metrics and health score updated after every attempt.
//   - Degradation: failures become a degraded report (stale last-good data,
//     confidence 25, neutral) or a hard-error report, per configuration.
//
// State machine: Idle -> Running -> {Healthy | Degraded | Error} -> Running ...
// Shutdown clears the cache, closes the event channel and returns to Idle
// for good.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, WeakShared};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{
    Engine, EngineCache, EngineError, EngineMetrics, EngineReport, ExecutionContext,
};
use crate::types::{EngineTier, Signal};

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Configuration
// =============================================================================

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

fn default_report_ttl_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

/// Per-engine execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for one computation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Default TTL for cache entries written without an explicit TTL.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Serve degraded reports on failure instead of hard errors.
    #[serde(default = "default_true")]
    pub graceful_degradation: bool,

    /// How long a fresh report may be reused by a non-forced execution.
    /// Zero disables reuse.
    #[serde(default = "default_report_ttl_ms")]
    pub report_ttl_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            graceful_degradation: true,
            report_ttl_ms: default_report_ttl_ms(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn report_ttl(&self) -> Duration {
        Duration::from_millis(self.report_ttl_ms)
    }
}

// =============================================================================
// State & events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Running,
    Healthy,
    Degraded,
    Error,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle notifications published by a runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Started {
        engine_id: String,
    },
    Succeeded {
        engine_id: String,
        confidence: f64,
        elapsed_ms: u64,
    },
    Failed {
        engine_id: String,
        message: String,
        degraded: bool,
    },
}

// =============================================================================
// Projections
// =============================================================================

/// Compact per-engine view for the dashboard grid.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub engine_id: String,
    pub name: String,
    pub tier: EngineTier,
    pub state: EngineState,
    pub signal: Option<Signal>,
    pub confidence: Option<f64>,
    pub value: Option<f64>,
    pub stale: bool,
    pub health_score: f64,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Full per-engine view for the detail page.
#[derive(Debug, Clone, Serialize)]
pub struct EngineDetail {
    pub engine_id: String,
    pub name: String,
    pub tier: EngineTier,
    pub dependencies: Vec<String>,
    pub state: EngineState,
    pub config: EngineConfig,
    pub metrics: EngineMetrics,
    pub latest_report: Option<EngineReport>,
    pub cache_entries: usize,
}

// =============================================================================
// Runtime
// =============================================================================

/// Held weakly so an attempt abandoned by every caller is dropped.
type InFlight = WeakShared<BoxFuture<'static, EngineReport>>;

struct RuntimeInner {
    engine: Arc<dyn Engine>,
    engine_id: String,
    config: EngineConfig,
    cache: Arc<EngineCache>,
    state: RwLock<EngineState>,
    metrics: RwLock<EngineMetrics>,
    last_good: RwLock<Option<EngineReport>>,
    /// Set on success, cleared by any failure or shutdown.
    fresh_since: RwLock<Option<Instant>>,
    latest_report: RwLock<Option<EngineReport>>,
    in_flight: Mutex<Option<InFlight>>,
    events: RwLock<Option<broadcast::Sender<EngineEvent>>>,
    started_at: Instant,
    shut_down: AtomicBool,
}

/// Long-lived wrapper giving one engine timeout, single-flight, caching,
/// health tracking and degradation.
pub struct EngineRuntime {
    inner: Arc<RuntimeInner>,
}

impl EngineRuntime {
    pub fn new(engine: Arc<dyn Engine>, config: EngineConfig) -> Self {
        let engine_id = engine.id().to_string();
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        debug!(engine_id = %engine_id, timeout_ms = config.timeout_ms, "engine runtime created");
        Self {
            inner: Arc::new(RuntimeInner {
                cache: Arc::new(EngineCache::new(config.cache_ttl())),
                engine,
                engine_id,
                config,
                state: RwLock::new(EngineState::Idle),
                metrics: RwLock::new(EngineMetrics::new()),
                last_good: RwLock::new(None),
                fresh_since: RwLock::new(None),
                latest_report: RwLock::new(None),
                in_flight: Mutex::new(None),
                events: RwLock::new(Some(tx)),
                started_at: Instant::now(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.inner.engine_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state.read()
    }

    /// Snapshot of the metrics with uptime brought up to date.
    pub fn metrics(&self) -> EngineMetrics {
        let mut metrics = self.inner.metrics.read().clone();
        if !self.inner.shut_down.load(Ordering::SeqCst) {
            metrics.uptime_ms = self.inner.uptime_ms();
        }
        metrics
    }

    pub fn latest_report(&self) -> Option<EngineReport> {
        self.inner.latest_report.read().clone()
    }

    /// Run the engine, always recomputing unless an attempt is already in
    /// flight.
    pub async fn execute(&self) -> EngineReport {
        self.execute_with(true).await
    }

    /// Run the engine. With `force = false` a fresh report younger than
    /// `report_ttl_ms` is returned without recomputing.
    pub async fn execute_with(&self, force: bool) -> EngineReport {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return EngineReport::failure(EngineError::ShutDown.to_string());
        }

        if !force {
            if let Some(report) = self.inner.reusable_report() {
                debug!(engine_id = %self.inner.engine_id, "reusing fresh report");
                return report;
            }
        }

        let attempt = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref().and_then(|weak| weak.upgrade()) {
                Some(existing) => {
                    debug!(engine_id = %self.inner.engine_id, "joining in-flight execution");
                    existing
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut = async move {
                        let report = inner.run_attempt().await;
                        *inner.in_flight.lock() = None;
                        report
                    }
                    .boxed()
                    .shared();
                    *slot = fut.downgrade();
                    fut
                }
            }
        };

        attempt.await
    }

    /// Read a cache entry.
    pub fn get_cache_data(&self, key: &str) -> Option<Value> {
        self.inner.cache.get(key)
    }

    /// Write a cache entry; `ttl` defaults to the configured cache TTL.
    pub fn set_cache_data(&self, key: impl Into<String>, data: Value, ttl: Option<Duration>) {
        self.inner.cache.set(key, data, ttl);
    }

    /// Subscribe to lifecycle events. `None` after shutdown.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<EngineEvent>> {
        self.inner.events.read().as_ref().map(|tx| tx.subscribe())
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Clear the cache, close the event channel and return to `Idle`.
    /// Irreversible.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cache.clear();
        self.inner.events.write().take();
        *self.inner.metrics.write() = EngineMetrics::new();
        *self.inner.last_good.write() = None;
        *self.inner.fresh_since.write() = None;
        *self.inner.state.write() = EngineState::Idle;
        info!(engine_id = %self.inner.engine_id, "engine runtime shut down");
    }

    pub fn dashboard_summary(&self) -> EngineSummary {
        let latest = self.latest_report();
        let metrics = self.metrics();
        EngineSummary {
            engine_id: self.inner.engine_id.clone(),
            name: self.inner.engine.name().to_string(),
            tier: self.inner.engine.tier(),
            state: self.state(),
            signal: latest.as_ref().map(|r| r.signal),
            confidence: latest.as_ref().map(|r| r.confidence),
            value: latest.as_ref().map(|r| r.value),
            stale: latest.as_ref().map(|r| r.is_stale()).unwrap_or(false),
            health_score: metrics.health_score,
            last_success_at: metrics.last_success_at,
        }
    }

    pub fn detailed_view(&self) -> EngineDetail {
        EngineDetail {
            engine_id: self.inner.engine_id.clone(),
            name: self.inner.engine.name().to_string(),
            tier: self.inner.engine.tier(),
            dependencies: self.inner.engine.dependencies(),
            state: self.state(),
            config: self.inner.config.clone(),
            metrics: self.metrics(),
            latest_report: self.latest_report(),
            cache_entries: self.inner.cache.len(),
        }
    }
}

impl std::fmt::Debug for EngineRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("engine_id", &self.inner.engine_id)
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl RuntimeInner {
    fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn set_state(&self, next: EngineState) {
        let prev = std::mem::replace(&mut *self.state.write(), next);
        if prev != next {
            debug!(engine_id = %self.engine_id, from = %prev, to = %next, "engine state change");
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = self.events.read().as_ref() {
            // No subscribers is not an error.
            let _ = tx.send(event);
        }
    }

    fn reusable_report(&self) -> Option<EngineReport> {
        let ttl = self.config.report_ttl();
        if ttl.is_zero() {
            return None;
        }
        let fresh = self
            .fresh_since
            .read()
            .is_some_and(|at| at.elapsed() < ttl);
        if !fresh {
            return None;
        }
        self.last_good.read().clone()
    }

    async fn run_attempt(&self) -> EngineReport {
        self.set_state(EngineState::Running);
        self.emit(EngineEvent::Started {
            engine_id: self.engine_id.clone(),
        });

        let started = Instant::now();
        let ctx = ExecutionContext::new(self.engine_id.clone(), Arc::clone(&self.cache));
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move { engine.perform_execution(&ctx).await });

        let outcome = match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(Ok(Ok(report))) if report.success => Ok(report.normalised()),
            Ok(Ok(Ok(report))) => Err(EngineError::Computation(
                report
                    .errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "engine reported failure".to_string()),
            )),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join_err)) => Err(EngineError::Panicked(join_err.to_string())),
            // The spawned task keeps running; its result is dropped.
            Err(_) => Err(EngineError::Timeout),
        };

        if self.shut_down.load(Ordering::SeqCst) {
            debug!(engine_id = %self.engine_id, "attempt finished after shutdown, discarded");
            return EngineReport::failure(EngineError::ShutDown.to_string());
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let report = match outcome {
            Ok(report) => self.on_success(report, elapsed_ms),
            Err(e) => self.on_failure(e, elapsed_ms),
        };
        *self.latest_report.write() = Some(report.clone());
        report
    }

    fn on_success(&self, report: EngineReport, elapsed_ms: u64) -> EngineReport {
        self.metrics
            .write()
            .record_success(report.confidence, elapsed_ms, self.uptime_ms());
        *self.last_good.write() = Some(report.clone());
        *self.fresh_since.write() = Some(Instant::now());
        self.set_state(EngineState::Healthy);

        debug!(
            engine_id = %self.engine_id,
            signal = %report.signal,
            confidence = report.confidence,
            value = report.value,
            elapsed_ms,
            "engine execution succeeded"
        );
        self.emit(EngineEvent::Succeeded {
            engine_id: self.engine_id.clone(),
            confidence: report.confidence,
            elapsed_ms,
        });
        report
    }

    fn on_failure(&self, error: EngineError, elapsed_ms: u64) -> EngineReport {
        let message = error.to_string();
        let degraded = self.config.graceful_degradation;

        self.fresh_since.write().take();
        let report = if degraded {
            let last_good = self.last_good.read();
            EngineReport::degraded(
                last_good.as_ref(),
                &self.engine.fallback(),
                message.clone(),
            )
        } else {
            EngineReport::failure(message.clone())
        };

        let health = {
            let mut metrics = self.metrics.write();
            metrics.record_failure(report.confidence, message.clone(), elapsed_ms, self.uptime_ms());
            metrics.health_score
        };
        self.set_state(if degraded {
            EngineState::Degraded
        } else {
            EngineState::Error
        });

        warn!(
            engine_id = %self.engine_id,
            error = %message,
            degraded,
            health_score = health,
            elapsed_ms,
            "engine execution failed"
        );
        self.emit(EngineEvent::Failed {
            engine_id: self.engine_id.clone(),
            message,
            degraded,
        });
        report
    }
}
