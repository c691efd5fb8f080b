//! Feature-gated fundability scoring.
//!
//! Three strictly additive stages over the legacy overall score:
//!
//! 1. **Shadow mode** — phase inference plus a bare assessment carrying an
//!    audit copy of the legacy score. No cap, no effect on scoring.
//! 2. **Soft caps** — a ceiling keyed to the phase-confidence tier;
//!    `fundability_score = min(legacy, cap)`. The legacy score is untouched.
//! 3. **Hard gates** — an APPROVE/CONDITIONAL/REJECT decision. REJECT is
//!    reserved for policy violations; thin evidence alone is CONDITIONAL.

use crate::config::FundabilityFeatures;
use crate::core::{
    FundabilityAssessment, FundabilityCaps, FundabilityDecision, GateOutcome, PhaseInference,
    PolicyViolation, SignalEvidence, SignalKey,
};
use crate::errors::DealflowError;
use crate::scoring::phase::PhaseInferenceEngine;
use std::collections::BTreeMap;

/// Everything the gate derives for one cycle. All fields are additive to
/// the DIO; none feed back into `overall_score`.
#[derive(Debug, Clone, PartialEq)]
pub struct GateReport {
    pub phase_inference: PhaseInference,
    pub assessment: FundabilityAssessment,
    pub decision: Option<FundabilityDecision>,
}

/// Shadow/soft-cap/hard-gate scoring layer.
#[derive(Debug, Clone)]
pub struct FundabilityGate {
    features: FundabilityFeatures,
    engine: PhaseInferenceEngine,
}

impl FundabilityGate {
    pub fn new(
        features: FundabilityFeatures,
        engine: PhaseInferenceEngine,
    ) -> Result<Self, DealflowError> {
        features.validate()?;
        Ok(Self { features, engine })
    }

    pub fn features(&self) -> FundabilityFeatures {
        self.features
    }

    /// Evaluate the gate for one cycle. Returns `None` when shadow mode is
    /// off; the DIO then carries no gated fields at all.
    pub fn evaluate(
        &self,
        signals: &BTreeMap<SignalKey, SignalEvidence>,
        policy_violations: &[PolicyViolation],
        legacy_overall_score: f64,
    ) -> Option<GateReport> {
        if !self.features.shadow_mode {
            return None;
        }

        let inference = self.engine.infer(signals);

        let mut assessment = FundabilityAssessment {
            legacy_overall_score_0_100: legacy_overall_score,
            caps: None,
            fundability_score_0_100: None,
        };

        if self.features.soft_caps {
            let cap = self
                .engine
                .thresholds()
                .cap_for_confidence(inference.confidence);
            assessment.caps = Some(FundabilityCaps {
                max_fundability_score_0_100: cap,
            });
            assessment.fundability_score_0_100 = Some(legacy_overall_score.min(cap));
        }

        let decision = self
            .features
            .hard_gates
            .then(|| self.decide(&inference, policy_violations));

        Some(GateReport {
            phase_inference: inference,
            assessment,
            decision,
        })
    }

    fn decide(
        &self,
        inference: &PhaseInference,
        policy_violations: &[PolicyViolation],
    ) -> FundabilityDecision {
        let thresholds = self.engine.thresholds();
        let requirement = thresholds.requirement(inference.phase);

        let missing_required_signals: Vec<SignalKey> = requirement
            .map(|req| {
                req.required_signals
                    .iter()
                    .filter(|signal| !inference.evidenced_signals.contains(signal))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        let below_floor = requirement
            .map(|req| inference.confidence < req.confidence_floor)
            .unwrap_or(false);

        let outcome = if !policy_violations.is_empty() {
            GateOutcome::Reject
        } else if !missing_required_signals.is_empty() || below_floor {
            GateOutcome::Conditional
        } else {
            GateOutcome::Approve
        };

        let mut next_requests: Vec<String> = missing_required_signals
            .iter()
            .map(|signal| format!("provide_evidence:{signal}"))
            .collect();
        if below_floor {
            next_requests.push("increase_phase_confidence".to_string());
        }

        FundabilityDecision {
            outcome,
            should_block_investment: outcome == GateOutcome::Reject,
            missing_required_signals,
            next_requests,
            policy_violations: policy_violations.to_vec(),
        }
    }
}
