//! Cross-cycle ledger.
//!
//! One manifest per deal, read before and written after every cycle. All
//! fields accumulate monotonically: depth deltas are appended, counters only
//! grow, and calibration is a running mean over every hypothesis probe seen
//! so far. Paraphrase invariance starts at 1.0 and only decreases, when a
//! cycle finds hypotheses inconsistent across rephrasing.

use serde::{Deserialize, Serialize};

/// Running calibration over hypothesis probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Running mean of (forecast - outcome)^2. 0 is perfectly calibrated.
    pub brier: f64,
    pub observations: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            brier: 0.0,
            observations: 0,
        }
    }
}

/// One tested hypothesis: what was forecast, what happened, and whether the
/// finding held up when the hypothesis was rephrased.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisProbe {
    /// Forecast probability (0..1).
    pub forecast: f64,
    /// Whether the hypothesis held.
    pub outcome: bool,
    pub consistent_under_rephrasing: bool,
}

/// Everything one completed cycle contributes to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleEvidence {
    /// How much deeper this cycle dug: new evidence plus newly succeeding
    /// analyzers.
    pub depth_delta: f64,
    pub subgoals_addressed: u32,
    pub constraints_checked: u32,
    pub dead_ends: u32,
    #[serde(default)]
    pub probes: Vec<HypothesisProbe>,
}

/// Monotonic per-deal accumulator driving cycle-progression decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerManifest {
    pub deal_id: String,
    pub cycles_completed: u32,
    /// Per-cycle depth deltas, append-only.
    pub depth_delta: Vec<f64>,
    pub subgoals_addressed: u32,
    pub constraints_checked: u32,
    pub dead_ends: u32,
    /// 1.0 until a cycle finds hypotheses inconsistent across rephrasing.
    pub paraphrase_invariance: f64,
    pub calibration: Calibration,
}

impl LedgerManifest {
    pub fn new(deal_id: impl Into<String>) -> Self {
        Self {
            deal_id: deal_id.into(),
            cycles_completed: 0,
            depth_delta: Vec::new(),
            subgoals_addressed: 0,
            constraints_checked: 0,
            dead_ends: 0,
            paraphrase_invariance: 1.0,
            calibration: Calibration::default(),
        }
    }

    /// Fold one completed cycle into the manifest.
    pub fn apply_cycle(&mut self, evidence: &CycleEvidence) {
        self.cycles_completed += 1;
        self.depth_delta.push(evidence.depth_delta);
        self.subgoals_addressed += evidence.subgoals_addressed;
        self.constraints_checked += evidence.constraints_checked;
        self.dead_ends += evidence.dead_ends;

        if !evidence.probes.is_empty() {
            let consistent = evidence
                .probes
                .iter()
                .filter(|probe| probe.consistent_under_rephrasing)
                .count();
            self.paraphrase_invariance *= consistent as f64 / evidence.probes.len() as f64;

            let squared_error: f64 = evidence
                .probes
                .iter()
                .map(|probe| {
                    let outcome = if probe.outcome { 1.0 } else { 0.0 };
                    (probe.forecast - outcome).powi(2)
                })
                .sum();
            let prior = self.calibration.brier * self.calibration.observations as f64;
            let total = self.calibration.observations + evidence.probes.len() as u32;
            self.calibration.brier = (prior + squared_error) / total as f64;
            self.calibration.observations = total;
        }
    }

    /// Depth delta recorded for the most recent cycle.
    pub fn latest_depth_delta(&self) -> Option<f64> {
        self.depth_delta.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn probe(forecast: f64, outcome: bool, consistent: bool) -> HypothesisProbe {
        HypothesisProbe {
            forecast,
            outcome,
            consistent_under_rephrasing: consistent,
        }
    }

    #[test]
    fn depth_deltas_append_in_order() {
        let mut ledger = LedgerManifest::new("deal-1");
        for (i, delta) in [3.0, 2.0, 0.5].iter().enumerate() {
            ledger.apply_cycle(&CycleEvidence {
                depth_delta: *delta,
                ..Default::default()
            });
            assert_eq!(ledger.cycles_completed, i as u32 + 1);
        }
        assert_eq!(ledger.depth_delta, vec![3.0, 2.0, 0.5]);
        assert_eq!(ledger.latest_depth_delta(), Some(0.5));
    }

    #[test]
    fn perfect_forecasts_keep_brier_at_zero() {
        let mut ledger = LedgerManifest::new("deal-1");
        ledger.apply_cycle(&CycleEvidence {
            probes: vec![probe(1.0, true, true), probe(0.0, false, true)],
            ..Default::default()
        });
        assert_eq!(ledger.calibration.brier, 0.0);
        assert_eq!(ledger.calibration.observations, 2);
        assert_eq!(ledger.paraphrase_invariance, 1.0);
    }

    #[test]
    fn brier_is_a_running_mean() {
        let mut ledger = LedgerManifest::new("deal-1");
        // (1.0 - 0)^2 = 1.0 over one probe.
        ledger.apply_cycle(&CycleEvidence {
            probes: vec![probe(1.0, false, true)],
            ..Default::default()
        });
        assert_eq!(ledger.calibration.brier, 1.0);
        // Add a perfect probe: mean over two observations is 0.5.
        ledger.apply_cycle(&CycleEvidence {
            probes: vec![probe(1.0, true, true)],
            ..Default::default()
        });
        assert_eq!(ledger.calibration.brier, 0.5);
        assert_eq!(ledger.calibration.observations, 2);
    }

    #[test]
    fn inconsistent_probes_lower_invariance() {
        let mut ledger = LedgerManifest::new("deal-1");
        ledger.apply_cycle(&CycleEvidence {
            probes: vec![probe(0.5, true, true), probe(0.5, true, false)],
            ..Default::default()
        });
        assert_eq!(ledger.paraphrase_invariance, 0.5);
        // Further consistent cycles never raise it back.
        ledger.apply_cycle(&CycleEvidence {
            probes: vec![probe(0.5, true, true)],
            ..Default::default()
        });
        assert_eq!(ledger.paraphrase_invariance, 0.5);
    }

    #[test]
    fn counters_accumulate_across_cycles() {
        let mut ledger = LedgerManifest::new("deal-1");
        for _ in 0..2 {
            ledger.apply_cycle(&CycleEvidence {
                subgoals_addressed: 2,
                constraints_checked: 3,
                dead_ends: 1,
                ..Default::default()
            });
        }
        assert_eq!(ledger.subgoals_addressed, 4);
        assert_eq!(ledger.constraints_checked, 6);
        assert_eq!(ledger.dead_ends, 2);
    }
}
