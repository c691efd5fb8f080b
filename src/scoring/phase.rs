//! Phase inference from content-signal evidence.
//!
//! A deal sits at the highest phase of the configured ladder whose required
//! signals are all evidenced (present with confidence at or above the signal
//! floor). Inference confidence combines how many of the phase's required
//! signals are evidenced with how confidently they are evidenced, so an
//! empty deal lands at the lowest phase with zero confidence.

use crate::config::GatingThresholds;
use crate::core::{AnalyzerResult, PhaseInference, SignalEvidence, SignalKey};
use std::collections::BTreeMap;

/// Derives a deal's maturity phase and confidence from signal evidence.
#[derive(Debug, Clone)]
pub struct PhaseInferenceEngine {
    thresholds: GatingThresholds,
}

impl PhaseInferenceEngine {
    pub fn new(thresholds: GatingThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GatingThresholds {
        &self.thresholds
    }

    /// Infer phase and confidence from merged signal evidence.
    pub fn infer(&self, signals: &BTreeMap<SignalKey, SignalEvidence>) -> PhaseInference {
        let floor = self.thresholds.signal_confidence_floor;
        let evidenced: Vec<SignalKey> = signals
            .iter()
            .filter(|(_, evidence)| evidence.present && evidence.confidence >= floor)
            .map(|(key, _)| *key)
            .collect();

        // Highest rung whose requirements are all evidenced; a deal that
        // evidences nothing still sits on the lowest rung.
        let requirement = self
            .thresholds
            .phase_ladder
            .iter()
            .rev()
            .find(|req| {
                req.required_signals
                    .iter()
                    .all(|signal| evidenced.contains(signal))
            })
            .or_else(|| self.thresholds.phase_ladder.first())
            .expect("validated config has a non-empty phase ladder");

        let required = &requirement.required_signals;
        let evidenced_required: Vec<SignalKey> = required
            .iter()
            .filter(|signal| evidenced.contains(signal))
            .copied()
            .collect();

        let fraction = if required.is_empty() {
            1.0
        } else {
            evidenced_required.len() as f64 / required.len() as f64
        };
        let mean_confidence = if evidenced_required.is_empty() {
            0.0
        } else {
            evidenced_required
                .iter()
                .map(|signal| signals[signal].confidence)
                .sum::<f64>()
                / evidenced_required.len() as f64
        };

        PhaseInference {
            phase: requirement.phase,
            confidence: (fraction * mean_confidence).clamp(0.0, 1.0),
            evidenced_signals: evidenced,
        }
    }
}

/// Merge per-analyzer signal observations into one evidence map.
///
/// A signal is present when any analyzer saw it; the merged confidence is
/// the strongest present observation and evidence ids are unioned.
pub fn merge_signals(
    results: &BTreeMap<String, AnalyzerResult>,
) -> BTreeMap<SignalKey, SignalEvidence> {
    let mut merged: BTreeMap<SignalKey, SignalEvidence> = BTreeMap::new();
    for result in results.values() {
        for (key, evidence) in &result.signals {
            let slot = merged.entry(*key).or_default();
            if evidence.present {
                slot.present = true;
                if evidence.confidence > slot.confidence {
                    slot.confidence = evidence.confidence;
                }
                for id in &evidence.evidence_ids {
                    if !slot.evidence_ids.contains(id) {
                        slot.evidence_ids.push(id.clone());
                    }
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DealPhase;

    fn evidence(confidence: f64) -> SignalEvidence {
        SignalEvidence {
            present: true,
            confidence,
            evidence_ids: vec![format!("ev-{confidence}")],
        }
    }

    fn engine() -> PhaseInferenceEngine {
        PhaseInferenceEngine::new(GatingThresholds::default())
    }

    #[test]
    fn empty_evidence_lands_at_concept_with_zero_confidence() {
        let inference = engine().infer(&BTreeMap::new());
        assert_eq!(inference.phase, DealPhase::Concept);
        assert_eq!(inference.confidence, 0.0);
        assert!(inference.evidenced_signals.is_empty());
    }

    #[test]
    fn full_concept_evidence_qualifies_for_concept() {
        let mut signals = BTreeMap::new();
        signals.insert(SignalKey::ProblemDefinition, evidence(0.9));
        signals.insert(SignalKey::CustomerPersona, evidence(0.9));
        signals.insert(SignalKey::SolutionConcept, evidence(0.9));

        let inference = engine().infer(&signals);
        assert_eq!(inference.phase, DealPhase::Concept);
        assert!((inference.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn traction_evidence_advances_to_validation() {
        let mut signals = BTreeMap::new();
        signals.insert(SignalKey::ProblemDefinition, evidence(0.8));
        signals.insert(SignalKey::CustomerPersona, evidence(0.8));
        signals.insert(SignalKey::SolutionConcept, evidence(0.8));
        signals.insert(SignalKey::Traction, evidence(0.8));

        let inference = engine().infer(&signals);
        assert_eq!(inference.phase, DealPhase::Validation);
    }

    #[test]
    fn low_confidence_signals_do_not_count() {
        let mut signals = BTreeMap::new();
        signals.insert(SignalKey::ProblemDefinition, evidence(0.2));
        let inference = engine().infer(&signals);
        assert_eq!(inference.phase, DealPhase::Concept);
        assert!(inference.evidenced_signals.is_empty());
    }

    #[test]
    fn merge_keeps_strongest_observation() {
        use crate::core::AnalyzerStatus;
        use chrono::Utc;

        let make = |confidence: f64| {
            let mut signals = BTreeMap::new();
            signals.insert(SignalKey::Traction, evidence(confidence));
            AnalyzerResult {
                analyzer_version: "1.0.0".into(),
                executed_at: Utc::now(),
                status: AnalyzerStatus::Ok,
                coverage: 1.0,
                confidence: 0.5,
                score: Some(50.0),
                evidence_ids: Vec::new(),
                signals,
                policy_violations: Vec::new(),
                error: None,
                input_hash: "h".into(),
            }
        };

        let mut results = BTreeMap::new();
        results.insert("a".to_string(), make(0.4));
        results.insert("b".to_string(), make(0.9));
        let merged = merge_signals(&results);
        let traction = &merged[&SignalKey::Traction];
        assert!(traction.present);
        assert_eq!(traction.confidence, 0.9);
        assert_eq!(traction.evidence_ids.len(), 2);
    }
}
