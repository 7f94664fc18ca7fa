// Scripted engine used by the runtime, registry and orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Engine, EngineError, EngineFallback, EngineReport, ExecutionContext};
use crate::types::{EngineTier, Signal};

#[derive(Debug, Clone)]
pub enum Outcome {
    Report(EngineReport),
    Fail(String),
    Hang,
    Panic,
}

impl Outcome {
    pub fn bullish(value: f64) -> Self {
        Self::Report(EngineReport::success(Signal::Bullish, 80.0, value))
    }

    pub fn bearish(value: f64) -> Self {
        Self::Report(EngineReport::success(Signal::Bearish, 80.0, value))
    }

    pub fn neutral(value: f64) -> Self {
        Self::Report(EngineReport::success(Signal::Neutral, 60.0, value))
    }

    pub fn fail(message: &str) -> Self {
        Self::Fail(message.to_string())
    }
}

pub struct ScriptedEngine {
    id: String,
    tier: EngineTier,
    dependencies: Vec<String>,
    delay: Duration,
    fallback_value: f64,
    outcome: Mutex<Outcome>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(id: &str, tier: EngineTier, outcome: Outcome) -> Self {
        Self {
            id: id.to_string(),
            tier,
            dependencies: Vec::new(),
            delay: Duration::ZERO,
            fallback_value: 0.0,
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_fallback_value(mut self, value: f64) -> Self {
        self.fallback_value = value;
        self
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn tier(&self) -> EngineTier {
        self.tier
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn fallback(&self) -> EngineFallback {
        EngineFallback {
            value: self.fallback_value,
            ..EngineFallback::default()
        }
    }

    async fn perform_execution(&self, ctx: &ExecutionContext) -> Result<EngineReport, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.cache().set("scripted:calls", n.into(), None);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.outcome.lock().clone();
        match outcome {
            Outcome::Report(report) => Ok(report),
            Outcome::Fail(message) => Err(EngineError::computation(message)),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::computation("unreachable"))
            }
            Outcome::Panic => panic!("scripted panic"),
        }
    }
}
