//! Data-driven thresholds for planner progression and fundability gating.
//!
//! Cap tiers, phase requirements, and confidence floors are configuration
//! rather than hard-coded constants so product can tune them without an
//! engine release. Defaults follow the documented rollout values: the lowest
//! confidence tier caps at 60, and the concept phase requires a problem
//! definition, a customer persona, and a solution concept.

use crate::core::{DealPhase, SignalKey};
use serde::{Deserialize, Serialize};

/// Per-transition depth thresholds for the multi-cycle planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerThresholds {
    /// Minimum depth delta required to advance from cycle 1 to cycle 2.
    #[serde(default = "default_continue_threshold")]
    pub cycle_1_continue: f64,

    /// Minimum depth delta required to advance from cycle 2 to cycle 3.
    #[serde(default = "default_continue_threshold")]
    pub cycle_2_continue: f64,

    /// Upper bound on cycles per deal. Cycle 3 always synthesizes, so
    /// values above 3 have no effect; values below 3 stop earlier.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u8,
}

impl Default for PlannerThresholds {
    fn default() -> Self {
        Self {
            cycle_1_continue: default_continue_threshold(),
            cycle_2_continue: default_continue_threshold(),
            max_cycles: default_max_cycles(),
        }
    }
}

impl PlannerThresholds {
    /// Threshold gating the transition out of the given cycle number.
    pub fn continue_threshold(&self, cycle: u8) -> Option<f64> {
        match cycle {
            1 => Some(self.cycle_1_continue),
            2 => Some(self.cycle_2_continue),
            _ => None,
        }
    }
}

/// One row of the confidence-tier → cap table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapTier {
    /// Inclusive lower bound of phase confidence for this tier.
    pub min_confidence: f64,
    /// Ceiling applied to the fundability score within this tier.
    pub cap: f64,
}

/// Required signals and confidence floor for one deal phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRequirement {
    pub phase: DealPhase,
    /// Signals that must be present with sufficient evidence.
    pub required_signals: Vec<SignalKey>,
    /// Phase confidence below this floor keeps hard-gate outcomes
    /// at CONDITIONAL.
    pub confidence_floor: f64,
}

/// Gating thresholds: cap tiers, the phase ladder, and the per-signal
/// evidence floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatingThresholds {
    /// Cap tiers ordered by ascending `min_confidence`; the highest
    /// matching tier wins.
    #[serde(default = "default_cap_tiers")]
    pub cap_tiers: Vec<CapTier>,

    /// Phase ladder ordered from earliest to latest maturity. A deal sits
    /// at the highest phase whose required signals are all evidenced.
    #[serde(default = "default_phase_ladder")]
    pub phase_ladder: Vec<PhaseRequirement>,

    /// A signal counts as evidenced only when present with at least this
    /// confidence.
    #[serde(default = "default_signal_floor")]
    pub signal_confidence_floor: f64,
}

impl Default for GatingThresholds {
    fn default() -> Self {
        Self {
            cap_tiers: default_cap_tiers(),
            phase_ladder: default_phase_ladder(),
            signal_confidence_floor: default_signal_floor(),
        }
    }
}

impl GatingThresholds {
    /// Cap for the given phase confidence. Falls back to the lowest tier
    /// when confidence is below every tier bound.
    pub fn cap_for_confidence(&self, confidence: f64) -> f64 {
        self.cap_tiers
            .iter()
            .filter(|tier| confidence >= tier.min_confidence)
            .last()
            .or_else(|| self.cap_tiers.first())
            .map(|tier| tier.cap)
            .unwrap_or(100.0)
    }

    /// Requirement row for the given phase.
    pub fn requirement(&self, phase: DealPhase) -> Option<&PhaseRequirement> {
        self.phase_ladder.iter().find(|req| req.phase == phase)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.phase_ladder.is_empty() {
            return Err("phase ladder must not be empty".to_string());
        }
        if self.cap_tiers.is_empty() {
            return Err("cap tier table must not be empty".to_string());
        }
        let mut last = f64::NEG_INFINITY;
        for tier in &self.cap_tiers {
            if tier.min_confidence < last {
                return Err("cap tiers must be ordered by ascending min_confidence".to_string());
            }
            last = tier.min_confidence;
        }
        Ok(())
    }
}

fn default_continue_threshold() -> f64 {
    2.0
}

fn default_max_cycles() -> u8 {
    3
}

fn default_signal_floor() -> f64 {
    0.5
}

fn default_cap_tiers() -> Vec<CapTier> {
    vec![
        CapTier {
            min_confidence: 0.0,
            cap: 60.0,
        },
        CapTier {
            min_confidence: 0.4,
            cap: 80.0,
        },
        CapTier {
            min_confidence: 0.7,
            cap: 100.0,
        },
    ]
}

fn default_phase_ladder() -> Vec<PhaseRequirement> {
    vec![
        PhaseRequirement {
            phase: DealPhase::Concept,
            required_signals: vec![
                SignalKey::ProblemDefinition,
                SignalKey::CustomerPersona,
                SignalKey::SolutionConcept,
            ],
            confidence_floor: 0.3,
        },
        PhaseRequirement {
            phase: DealPhase::Validation,
            required_signals: vec![
                SignalKey::ProblemDefinition,
                SignalKey::CustomerPersona,
                SignalKey::SolutionConcept,
                SignalKey::Traction,
            ],
            confidence_floor: 0.5,
        },
        PhaseRequirement {
            phase: DealPhase::Growth,
            required_signals: vec![
                SignalKey::ProblemDefinition,
                SignalKey::CustomerPersona,
                SignalKey::SolutionConcept,
                SignalKey::Traction,
                SignalKey::Financials,
            ],
            confidence_floor: 0.6,
        },
    ]
}
