// =============================================================================
// Engine Registry — metadata and runtime handles in registration order
// =============================================================================
//
// The registry is constructed explicitly and handed to the orchestrator; it
// never executes anything itself. The execution plan is the registration
// order stably sorted by tier, so the same registry always yields the same
// plan. Dependencies must resolve to an engine that runs earlier in that
// plan.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use super::{Engine, EngineConfig, EngineRuntime};
use crate::orchestrator::OrchestrationError;
use crate::types::EngineTier;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetadata {
    pub id: String,
    pub name: String,
    pub tier: EngineTier,
    pub dependencies: Vec<String>,
    pub registration_index: usize,
}

struct RegisteredEngine {
    metadata: EngineMetadata,
    runtime: Arc<EngineRuntime>,
}

#[derive(Default)]
pub struct EngineRegistry {
    entries: RwLock<Vec<RegisteredEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `engine` in a runtime and register it.
    pub fn register(
        &self,
        engine: Arc<dyn Engine>,
        config: EngineConfig,
    ) -> Result<Arc<EngineRuntime>, OrchestrationError> {
        let mut entries = self.entries.write();
        let id = engine.id().to_string();
        if entries.iter().any(|e| e.metadata.id == id) {
            return Err(OrchestrationError::DuplicateEngine(id));
        }

        let metadata = EngineMetadata {
            id: id.clone(),
            name: engine.name().to_string(),
            tier: engine.tier(),
            dependencies: engine.dependencies(),
            registration_index: entries.len(),
        };
        let runtime = Arc::new(EngineRuntime::new(engine, config));

        info!(
            engine_id = %id,
            tier = %metadata.tier,
            dependencies = ?metadata.dependencies,
            "engine registered"
        );
        entries.push(RegisteredEngine {
            metadata,
            runtime: Arc::clone(&runtime),
        });
        Ok(runtime)
    }

    pub fn get(&self, id: &str) -> Option<Arc<EngineRuntime>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.metadata.id == id)
            .map(|e| Arc::clone(&e.runtime))
    }

    /// Metadata in registration order.
    pub fn metadata(&self) -> Vec<EngineMetadata> {
        self.entries.read().iter().map(|e| e.metadata.clone()).collect()
    }

    /// Runtimes in registration order.
    pub fn runtimes(&self) -> Vec<Arc<EngineRuntime>> {
        self.entries
            .read()
            .iter()
            .map(|e| Arc::clone(&e.runtime))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Tier-ordered execution plan with dependencies validated.
    pub fn execution_plan(
        &self,
    ) -> Result<Vec<(EngineMetadata, Arc<EngineRuntime>)>, OrchestrationError> {
        let entries = self.entries.read();
        let mut plan: Vec<(EngineMetadata, Arc<EngineRuntime>)> = entries
            .iter()
            .map(|e| (e.metadata.clone(), Arc::clone(&e.runtime)))
            .collect();
        // Stable: registration order is preserved within a tier.
        plan.sort_by_key(|(meta, _)| meta.tier);

        let position: HashMap<&str, usize> = plan
            .iter()
            .enumerate()
            .map(|(i, (meta, _))| (meta.id.as_str(), i))
            .collect();

        for (i, (meta, _)) in plan.iter().enumerate() {
            for dep in &meta.dependencies {
                match position.get(dep.as_str()) {
                    None => {
                        return Err(OrchestrationError::UnknownDependency {
                            engine: meta.id.clone(),
                            dependency: dep.clone(),
                        })
                    }
                    Some(&j) if j >= i => {
                        return Err(OrchestrationError::DependencyOrder {
                            engine: meta.id.clone(),
                            dependency: dep.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(plan)
    }

    /// Shut every runtime down.
    pub fn shutdown_all(&self) {
        for entry in self.entries.read().iter() {
            entry.runtime.shutdown();
        }
    }
}
