// =============================================================================
// Engine Module
// =============================================================================
//
// The per-unit execution contract:
// - `Engine`         — one computation unit (identity, tier, dependencies,
//                      async compute)
// - `EngineRuntime`  — timeout, single-flight, TTL cache, health metrics and
//                      graceful degradation around one engine
// - `EngineRegistry` — engine metadata and runtime handles in registration
//                      order

pub mod cache;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;

pub use cache::EngineCache;
pub use error::EngineError;
pub use metrics::EngineMetrics;
pub use registry::{EngineMetadata, EngineRegistry};
pub use report::{EngineFallback, EngineReport};
pub use runtime::{EngineConfig, EngineEvent, EngineRuntime, EngineState};

use crate::types::EngineTier;

/// Handle passed to an engine for the duration of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    engine_id: String,
    cache: Arc<EngineCache>,
}

impl ExecutionContext {
    pub fn new(engine_id: impl Into<String>, cache: Arc<EngineCache>) -> Self {
        Self {
            engine_id: engine_id.into(),
            cache,
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    /// The runtime-owned cache for sub-results.
    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }
}

/// One independently computed market-indicator unit.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn tier(&self) -> EngineTier;

    /// Ids of engines that must run before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Defaults used for degraded reports before the first success.
    fn fallback(&self) -> EngineFallback {
        EngineFallback::default()
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError>;
}
