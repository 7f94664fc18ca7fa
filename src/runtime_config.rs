// =============================================================================
// Runtime Configuration — engine and orchestration settings with atomic save
// =============================================================================
//
// Every tunable lives here: the HTTP bind address, orchestration cadence,
// per-engine runtime settings and upstream endpoints.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// Secrets (the FRED API key) are read from the environment only and never
// written to the config file.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::EngineConfig;
use crate::providers::{binance, fred};

pub const DEFAULT_CONFIG_PATH: &str = "liquidity_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_orchestration_interval_secs() -> u64 {
    300
}

fn default_inter_engine_delay_ms() -> u64 {
    100
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_expansion_threshold() -> f64 {
    7.0
}

fn default_contraction_threshold() -> f64 {
    3.0
}

fn default_fred_base_url() -> String {
    fred::DEFAULT_BASE_URL.to_string()
}

fn default_binance_spot_base_url() -> String {
    binance::DEFAULT_SPOT_BASE_URL.to_string()
}

fn default_binance_futures_base_url() -> String {
    binance::DEFAULT_FUTURES_BASE_URL.to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Server --------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Orchestration -------------------------------------------------------

    /// Seconds between scheduled orchestration runs. 0 disables the loop.
    #[serde(default = "default_orchestration_interval_secs")]
    pub orchestration_interval_secs: u64,

    /// Pause between consecutive engine invocations within one run.
    #[serde(default = "default_inter_engine_delay_ms")]
    pub inter_engine_delay_ms: u64,

    /// CLIS above which the regime is expansion.
    #[serde(default = "default_expansion_threshold")]
    pub expansion_threshold: f64,

    /// CLIS below which the regime is contraction.
    #[serde(default = "default_contraction_threshold")]
    pub contraction_threshold: f64,

    // --- Engines -------------------------------------------------------------

    /// Runtime settings applied to every engine without an override.
    #[serde(default)]
    pub engine_defaults: EngineConfig,

    /// Whole-struct per-engine overrides keyed by engine id.
    #[serde(default)]
    pub engine_overrides: HashMap<String, EngineConfig>,

    /// Engine ids that are not registered at startup.
    #[serde(default)]
    pub disabled_engines: Vec<String>,

    /// Exchange symbol used by the market engines.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    // --- Upstreams -----------------------------------------------------------

    #[serde(default = "default_fred_base_url")]
    pub fred_base_url: String,

    #[serde(default = "default_binance_spot_base_url")]
    pub binance_spot_base_url: String,

    #[serde(default = "default_binance_futures_base_url")]
    pub binance_futures_base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            orchestration_interval_secs: default_orchestration_interval_secs(),
            inter_engine_delay_ms: default_inter_engine_delay_ms(),
            expansion_threshold: default_expansion_threshold(),
            contraction_threshold: default_contraction_threshold(),
            engine_defaults: EngineConfig::default(),
            engine_overrides: HashMap::new(),
            disabled_engines: Vec::new(),
            symbol: default_symbol(),
            fred_base_url: default_fred_base_url(),
            binance_spot_base_url: default_binance_spot_base_url(),
            binance_futures_base_url: default_binance_futures_base_url(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            overrides = config.engine_overrides.len(),
            disabled = ?config.disabled_engines,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `PULSE_BIND_ADDR` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("PULSE_BIND_ADDR") {
            let addr = addr.trim();
            if !addr.is_empty() {
                self.bind_addr = addr.to_string();
            }
        }
    }

    /// Effective runtime settings for `engine_id`.
    pub fn engine_config(&self, engine_id: &str) -> EngineConfig {
        self.engine_overrides
            .get(engine_id)
            .cloned()
            .unwrap_or_else(|| self.engine_defaults.clone())
    }

    pub fn is_enabled(&self, engine_id: &str) -> bool {
        !self.disabled_engines.iter().any(|id| id == engine_id)
    }

    pub fn orchestration_interval(&self) -> Option<Duration> {
        (self.orchestration_interval_secs > 0)
            .then(|| Duration::from_secs(self.orchestration_interval_secs))
    }

    pub fn inter_engine_delay(&self) -> Duration {
        Duration::from_millis(self.inter_engine_delay_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.orchestration_interval_secs, 300);
        assert_eq!(cfg.inter_engine_delay(), Duration::from_millis(100));
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.engine_defaults.timeout_ms, 10_000);
        assert_eq!(cfg.engine_defaults.cache_ttl_ms, 60_000);
        assert!(cfg.engine_defaults.graceful_degradation);
        assert!((cfg.expansion_threshold - 7.0).abs() < f64::EPSILON);
        assert!((cfg.contraction_threshold - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.orchestration_interval_secs, 300);
        assert!(cfg.engine_overrides.is_empty());
        assert!(cfg.disabled_engines.is_empty());
        assert_eq!(cfg.fred_base_url, fred::DEFAULT_BASE_URL);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "engine_defaults": { "timeout_ms": 2500 },
            "engine_overrides": { "funding_rate": { "graceful_degradation": false } },
            "disabled_engines": ["credit_stress"]
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.engine_defaults.timeout_ms, 2500);
        assert_eq!(cfg.engine_defaults.cache_ttl_ms, 60_000);

        let funding = cfg.engine_config("funding_rate");
        assert!(!funding.graceful_degradation);
        // Overrides replace the whole struct, missing fields use serde defaults.
        assert_eq!(funding.timeout_ms, 10_000);
        assert_eq!(cfg.engine_config("momentum").timeout_ms, 2500);

        assert!(!cfg.is_enabled("credit_stress"));
        assert!(cfg.is_enabled("momentum"));
    }

    #[test]
    fn zero_interval_disables_loop() {
        let cfg = RuntimeConfig {
            orchestration_interval_secs: 0,
            ..RuntimeConfig::default()
        };
        assert!(cfg.orchestration_interval().is_none());
        assert_eq!(
            RuntimeConfig::default().orchestration_interval(),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn save_then_load_roundtrips() {
        let path = std::env::temp_dir().join(format!("pulse_cfg_{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.disabled_engines.push("momentum".into());
        cfg.engine_overrides.insert(
            "net_liquidity".into(),
            EngineConfig {
                timeout_ms: 30_000,
                ..EngineConfig::default()
            },
        );
        cfg.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.disabled_engines, vec!["momentum"]);
        assert_eq!(loaded.engine_config("net_liquidity").timeout_ms, 30_000);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/liquidity_config.json").is_err());
    }
}
