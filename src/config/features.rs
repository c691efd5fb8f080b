//! Fundability feature rollout flags.
//!
//! The fundability layer rolls out in three strictly additive stages:
//! shadow mode computes new signals beside the legacy score without touching
//! it, soft caps add a derived capped score, hard gates add a blocking
//! decision. Later stages require shadow mode; enabling them without it is a
//! configuration error caught at construction, never a silent fallback.

use crate::errors::DealflowError;
use serde::{Deserialize, Serialize};

/// Immutable feature flags, read once at orchestrator construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundabilityFeatures {
    /// Compute phase inference and a bare fundability assessment,
    /// with no effect on scoring.
    #[serde(default)]
    pub shadow_mode: bool,

    /// Add a confidence-tier cap and a capped fundability score.
    /// Requires `shadow_mode`.
    #[serde(default)]
    pub soft_caps: bool,

    /// Add a block/no-block fundability decision. Requires `shadow_mode`.
    #[serde(default)]
    pub hard_gates: bool,
}

impl FundabilityFeatures {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn shadow_only() -> Self {
        Self {
            shadow_mode: true,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            shadow_mode: true,
            soft_caps: true,
            hard_gates: true,
        }
    }

    /// Stage dependencies: caps and gates build on shadow-mode outputs.
    pub fn validate(&self) -> Result<(), DealflowError> {
        if self.soft_caps && !self.shadow_mode {
            return Err(DealflowError::config(
                "soft_caps requires shadow_mode: caps are derived from phase inference",
            ));
        }
        if self.hard_gates && !self.shadow_mode {
            return Err(DealflowError::config(
                "hard_gates requires shadow_mode: decisions are derived from phase inference",
            ));
        }
        Ok(())
    }
}
