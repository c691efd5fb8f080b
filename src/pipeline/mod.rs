//! Multi-cycle analysis pipeline.
//!
//! Drives the planner and the orchestrator across cycles for one deal:
//! run a cycle, fold its evidence into the ledger, ask the planner whether
//! to continue, and stop at synthesis or on unrecoverable failure. Cycles
//! are inherently sequential (cycle N's evidence gates cycle N+1); distinct
//! deals run independently. Progress is reported as a monotonically
//! increasing 0–100 signal.

use crate::core::{Dio, GateOutcome, PlannerState};
use crate::errors::DealflowError;
use crate::orchestrator::{CycleRequest, DealOrchestrator, ExecutionMetrics};
use crate::planner::{CycleEvidence, HypothesisProbe, LedgerManifest, Planner, PlannerDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

/// Request to analyze one deal end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub deal_id: String,
    pub input_data: serde_json::Value,
}

/// Synthesized recommendation for the decision pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Favorable,
    Neutral,
    Unfavorable,
}

/// Final artifact referencing the last DIO and the synthesized outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPack {
    pub deal_id: String,
    pub final_dio_id: String,
    pub recommendation: Recommendation,
    pub should_block_investment: bool,
    /// Distinct evidence ids accumulated across all cycles.
    pub evidence_count: usize,
    pub cycles_completed: u32,
    pub synthesized_at: DateTime<Utc>,
}

/// Aggregate metrics across all cycles of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub cycles_completed: u32,
    pub analyzers_run: usize,
    pub analyzers_failed: usize,
    pub evidence_count: usize,
    pub duration_ms: u64,
}

/// Outcome of a pipeline run. `success = false` carries a human-readable
/// error plus whatever metrics accumulated before the failure.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub success: bool,
    pub state: PlannerState,
    pub ledger: LedgerManifest,
    pub metrics: PipelineMetrics,
    pub final_dio: Option<Dio>,
    pub decision_pack: Option<DecisionPack>,
    pub error: Option<String>,
}

type ProgressFn = Box<dyn Fn(u8) + Send + Sync>;

/// Drives planner + orchestrator across cycles for one deal.
pub struct AnalysisPipeline {
    orchestrator: DealOrchestrator,
    planner: Planner,
    progress: Option<ProgressFn>,
}

impl AnalysisPipeline {
    pub fn new(orchestrator: DealOrchestrator, planner: Planner) -> Self {
        Self {
            orchestrator,
            planner,
            progress: None,
        }
    }

    /// Attach a progress sink receiving monotonically increasing 0–100.
    pub fn with_progress(mut self, progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn emit_progress(&self, percent: u8) {
        if let Some(progress) = &self.progress {
            progress(percent.min(100));
        }
    }

    pub async fn run(&self, request: RunRequest) -> PipelineReport {
        let started = Instant::now();
        let mut state = self.planner.initialize(&request.deal_id);
        let mut ledger = LedgerManifest::new(&request.deal_id);
        let mut metrics = PipelineMetrics::default();
        let mut seen_evidence: BTreeSet<String> = BTreeSet::new();
        let mut ever_ok: BTreeSet<String> = BTreeSet::new();
        let mut final_dio: Option<Dio> = None;

        self.emit_progress(0);
        let max_cycles = self.planner.thresholds().max_cycles.max(1);

        loop {
            let cycle = state.cycle.expect("initialized state has a cycle");
            let cycle_request = CycleRequest {
                deal_id: request.deal_id.clone(),
                analysis_cycle: cycle.number(),
                input_data: request.input_data.clone(),
            };

            let report = match self.orchestrator.analyze(cycle_request).await {
                Ok(report) => report,
                Err(e) => {
                    // Planner state is deliberately not advanced: the failed
                    // cycle never completed.
                    let err = DealflowError::PipelineFailure {
                        cycle: cycle.number(),
                        message: e.to_string(),
                    };
                    metrics.duration_ms = started.elapsed().as_millis() as u64;
                    log::error!("deal {}: {err}", request.deal_id);
                    return PipelineReport {
                        success: false,
                        state,
                        ledger,
                        metrics,
                        final_dio,
                        decision_pack: None,
                        error: Some(err.to_string()),
                    };
                }
            };

            accumulate_metrics(&mut metrics, &report.execution);
            let evidence =
                derive_cycle_evidence(&report.dio, &mut seen_evidence, &mut ever_ok);
            ledger.apply_cycle(&evidence);
            metrics.cycles_completed = ledger.cycles_completed;
            metrics.evidence_count = seen_evidence.len();
            final_dio = Some(report.dio);

            self.emit_progress((ledger.cycles_completed * 100 / max_cycles as u32) as u8);

            match self.planner.advance(&mut state, &ledger) {
                PlannerDecision::Continue(next) => {
                    log::debug!(
                        "deal {}: depth {:.1}, continuing to {next}",
                        request.deal_id,
                        ledger.latest_depth_delta().unwrap_or(0.0),
                    );
                }
                PlannerDecision::Synthesize(reason) => {
                    log::info!(
                        "deal {}: synthesizing after {} cycle(s) ({reason:?})",
                        request.deal_id,
                        ledger.cycles_completed
                    );
                    break;
                }
            }
        }

        metrics.duration_ms = started.elapsed().as_millis() as u64;
        self.emit_progress(100);

        let decision_pack = final_dio.as_ref().map(|dio| DecisionPack {
            deal_id: request.deal_id.clone(),
            final_dio_id: dio.dio_id.clone(),
            recommendation: recommend(dio),
            should_block_investment: dio
                .fundability_decision_v1
                .as_ref()
                .map(|decision| decision.should_block_investment)
                .unwrap_or(false),
            evidence_count: seen_evidence.len(),
            cycles_completed: ledger.cycles_completed,
            synthesized_at: Utc::now(),
        });

        PipelineReport {
            success: true,
            state,
            ledger,
            metrics,
            final_dio,
            decision_pack,
            error: None,
        }
    }
}

fn accumulate_metrics(metrics: &mut PipelineMetrics, execution: &ExecutionMetrics) {
    metrics.analyzers_run += execution.analyzers_run;
    metrics.analyzers_failed += execution.analyzers_failed;
}

/// Depth is what the cycle surfaced that earlier cycles had not: evidence
/// ids never seen before plus analyzers newly reaching ok. Each analyzer
/// also contributes a calibration probe (its declared confidence as a
/// forecast that it would produce a usable result).
fn derive_cycle_evidence(
    dio: &Dio,
    seen_evidence: &mut BTreeSet<String>,
    ever_ok: &mut BTreeSet<String>,
) -> CycleEvidence {
    let cycle_evidence = dio.evidence_ids();
    let new_evidence = cycle_evidence.difference(seen_evidence).count();
    seen_evidence.extend(cycle_evidence);

    let ok_now = dio.ok_analyzers();
    let newly_ok = ok_now.difference(ever_ok).count();
    ever_ok.extend(ok_now.iter().cloned());

    let failed = dio
        .analyzer_results
        .values()
        .filter(|result| result.status == crate::core::AnalyzerStatus::Error)
        .count();

    let probes = dio
        .analyzer_results
        .values()
        .map(|result| HypothesisProbe {
            forecast: result.confidence.clamp(0.0, 1.0),
            outcome: result.is_ok(),
            consistent_under_rephrasing: true,
        })
        .collect();

    CycleEvidence {
        depth_delta: (new_evidence + newly_ok) as f64,
        subgoals_addressed: newly_ok as u32,
        constraints_checked: ok_now.len() as u32,
        dead_ends: failed as u32,
        probes,
    }
}

fn recommend(dio: &Dio) -> Recommendation {
    if let Some(decision) = &dio.fundability_decision_v1 {
        return match decision.outcome {
            GateOutcome::Approve => Recommendation::Favorable,
            GateOutcome::Conditional => Recommendation::Neutral,
            GateOutcome::Reject => Recommendation::Unfavorable,
        };
    }
    if dio.overall_score >= 70.0 {
        Recommendation::Favorable
    } else if dio.overall_score >= 40.0 {
        Recommendation::Neutral
    } else {
        Recommendation::Unfavorable
    }
}
