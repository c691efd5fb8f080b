//! Engine configuration.
//!
//! `DealflowConfig` is constructed once (from defaults, a `dealflow.toml`
//! file, or CLI flags) and passed into the orchestrator and pipeline
//! constructors. The engine never reads environment variables or mutable
//! globals.

pub mod features;
pub mod retry;
pub mod thresholds;

pub use features::FundabilityFeatures;
pub use retry::{RetryConfig, RetryStrategy};
pub use thresholds::{CapTier, GatingThresholds, PhaseRequirement, PlannerThresholds};

use crate::errors::DealflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealflowConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub features: FundabilityFeatures,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub planner: PlannerThresholds,

    #[serde(default)]
    pub gating: GatingThresholds,
}

/// Fault-tolerance settings for a single analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-analyzer wall-clock budget in milliseconds (default: 60s).
    #[serde(default = "default_analyzer_timeout_ms")]
    pub analyzer_timeout_ms: u64,

    /// Record failing analyzers as errored slots and keep going (default)
    /// rather than failing the whole cycle.
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_ms: default_analyzer_timeout_ms(),
            continue_on_error: default_continue_on_error(),
        }
    }
}

impl OrchestratorConfig {
    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_millis(self.analyzer_timeout_ms)
    }
}

impl DealflowConfig {
    /// Parse and validate a TOML config string.
    pub fn from_toml(contents: &str) -> Result<Self, DealflowError> {
        let config: DealflowConfig = toml::from_str(contents)
            .map_err(|e| DealflowError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `dealflow.toml` file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, DealflowError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(DealflowError::config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), DealflowError> {
        self.features.validate()?;
        self.gating.validate().map_err(DealflowError::config)?;
        if self.orchestrator.analyzer_timeout_ms == 0 {
            return Err(DealflowError::config("analyzer_timeout_ms must be > 0"));
        }
        if self.planner.max_cycles == 0 {
            return Err(DealflowError::config("max_cycles must be >= 1"));
        }
        Ok(())
    }
}

fn default_analyzer_timeout_ms() -> u64 {
    60_000
}

fn default_continue_on_error() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = DealflowConfig::from_toml("").unwrap();
        assert_eq!(config.orchestrator.analyzer_timeout_ms, 60_000);
        assert!(config.orchestrator.continue_on_error);
        assert!(!config.features.shadow_mode);
        assert_eq!(config.planner.max_cycles, 3);
    }

    #[test]
    fn feature_staging_is_validated_on_parse() {
        let result = DealflowConfig::from_toml(
            r#"
            [features]
            soft_caps = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = DealflowConfig::from_toml(
            r#"
            [orchestrator]
            analyzer_timeout_ms = 5000

            [planner]
            cycle_1_continue = 3.5
            "#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.analyzer_timeout_ms, 5_000);
        assert_eq!(config.planner.cycle_1_continue, 3.5);
        assert_eq!(config.planner.cycle_2_continue, 2.0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = DealflowConfig::from_toml(
            r#"
            [orchestrator]
            analyzer_timeout_ms = 0
            "#,
        );
        assert!(result.is_err());
    }
}
