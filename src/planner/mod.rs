//! Multi-cycle planning state machine.
//!
//! States are `cycle1 → cycle2 → cycle3 → synthesize` with synthesize
//! terminal. The transition function is pure so it can be tested without any
//! of the I/O that drives it: cycle 3 always synthesizes; cycles 1 and 2
//! advance only when the latest depth delta clears the per-transition
//! threshold.

pub mod ledger;

pub use ledger::{Calibration, CycleEvidence, HypothesisProbe, LedgerManifest};

use crate::config::PlannerThresholds;
use crate::core::{Cycle, PlannerState, StopReason};
use serde::{Deserialize, Serialize};

/// What the planner decided after a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannerDecision {
    /// Run the given cycle next.
    Continue(Cycle),
    /// Stop cycling and synthesize the final decision.
    Synthesize(StopReason),
}

/// Pure transition function: given the cycle that just completed and the
/// accumulated ledger, decide the next state.
pub fn next_state(
    completed: Cycle,
    ledger: &LedgerManifest,
    thresholds: &PlannerThresholds,
) -> PlannerDecision {
    // Cycle 3 (or a lowered ceiling) always terminates in synthesis.
    if completed.number() >= thresholds.max_cycles || completed == Cycle::Three {
        return PlannerDecision::Synthesize(StopReason::MaxCyclesReached);
    }

    let threshold = thresholds
        .continue_threshold(completed.number())
        .unwrap_or(f64::INFINITY);
    let depth = ledger.latest_depth_delta().unwrap_or(0.0);

    if depth >= threshold {
        match completed.next() {
            Some(next) => PlannerDecision::Continue(next),
            None => PlannerDecision::Synthesize(StopReason::MaxCyclesReached),
        }
    } else {
        PlannerDecision::Synthesize(StopReason::DepthPlateau)
    }
}

/// Stateful wrapper that advances a [`PlannerState`] cursor. The cursor
/// only ever moves forward; a terminal state is never reopened.
#[derive(Debug, Clone)]
pub struct Planner {
    thresholds: PlannerThresholds,
}

impl Planner {
    pub fn new(thresholds: PlannerThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PlannerThresholds {
        &self.thresholds
    }

    /// Initialize planning for a deal at cycle 1.
    pub fn initialize(&self, deal_id: &str) -> PlannerState {
        let mut state = PlannerState::new(deal_id);
        state.cycle = Some(Cycle::One);
        state.goals = vec!["underwrite investment readiness".to_string()];
        state
    }

    /// Advance the cursor after a completed cycle. Mutates `state` in place
    /// and returns the decision taken.
    pub fn advance(&self, state: &mut PlannerState, ledger: &LedgerManifest) -> PlannerDecision {
        let Some(current) = state.cycle else {
            // Uninitialized cursor: nothing completed yet, start at cycle 1.
            state.cycle = Some(Cycle::One);
            return PlannerDecision::Continue(Cycle::One);
        };
        if state.is_terminal() {
            return PlannerDecision::Synthesize(
                state.stop_reason.expect("terminal state has a stop reason"),
            );
        }

        let decision = next_state(current, ledger, &self.thresholds);
        match decision {
            PlannerDecision::Continue(next) => {
                debug_assert!(next > current, "planner never regresses");
                state.cycle = Some(next);
            }
            PlannerDecision::Synthesize(reason) => {
                state.stop_reason = Some(reason);
            }
        }
        decision
    }
}
