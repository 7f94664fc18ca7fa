// =============================================================================
// Engine Errors
// =============================================================================
//
// Everything an engine computation can fail with. None of these escape the
// runtime: they are converted into degraded or hard-error reports.

use thiserror::Error;

use crate::providers::ProviderError;
use crate::stats::StatsError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution timeout")]
    Timeout,

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("validation error: {0}")]
    Validation(#[from] StatsError),

    #[error("{0}")]
    Computation(String),

    #[error("engine task panicked: {0}")]
    Panicked(String),

    #[error("runtime shut down")]
    ShutDown,
}

impl EngineError {
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }
}
