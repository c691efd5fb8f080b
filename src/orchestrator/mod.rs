//! Single-cycle orchestration.
//!
//! Runs every registered analyzer concurrently under its own timeout and
//! retry budget (bulkhead isolation: a slow, failing, or panicking analyzer
//! cannot stall or corrupt its siblings), aggregates whatever succeeded into
//! the legacy
//! overall score, runs the fundability gate strictly after the legacy score
//! is final, and persists the assembled DIO. The orchestrator holds no
//! cross-call mutable state.

use crate::analyzers::{AnalyzerInput, AnalyzerPort, AnalyzerRegistry};
use crate::config::{DealflowConfig, OrchestratorConfig, RetryConfig};
use crate::core::{AnalyzerResult, Dio, PolicyViolation};
use crate::errors::DealflowError;
use crate::scoring::phase::merge_signals;
use crate::scoring::{FundabilityGate, PhaseInferenceEngine, ScoreAggregator};
use crate::storage::{DioStore, SaveReceipt};
use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Request for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRequest {
    pub deal_id: String,
    pub analysis_cycle: u8,
    pub input_data: serde_json::Value,
}

/// One analyzer's failure, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerFailure {
    pub analyzer: String,
    pub message: String,
}

/// Structured execution metrics for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Analyzers attempted this cycle (the whole registry).
    pub analyzers_run: usize,
    /// Analyzers whose slot ended in `status = error`.
    pub analyzers_failed: usize,
    pub duration_ms: u64,
}

/// Successful cycle outcome: the persisted DIO plus execution detail the
/// caller needs to decide between retrying and accepting partial results.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub dio: Dio,
    pub receipt: SaveReceipt,
    pub execution: ExecutionMetrics,
    pub failures: Vec<AnalyzerFailure>,
}

/// Runs one analysis cycle end to end.
pub struct DealOrchestrator {
    registry: Arc<AnalyzerRegistry>,
    store: Arc<dyn DioStore>,
    aggregator: ScoreAggregator,
    gate: FundabilityGate,
    orchestrator_config: OrchestratorConfig,
    retry: RetryConfig,
}

impl DealOrchestrator {
    /// Feature flags are validated here, once; invalid stagings never
    /// construct an orchestrator.
    pub fn new(
        registry: Arc<AnalyzerRegistry>,
        store: Arc<dyn DioStore>,
        config: &DealflowConfig,
    ) -> Result<Self, DealflowError> {
        config.validate()?;
        let gate = FundabilityGate::new(
            config.features,
            PhaseInferenceEngine::new(config.gating.clone()),
        )?;
        Ok(Self {
            registry,
            store,
            aggregator: ScoreAggregator::new(),
            gate,
            orchestrator_config: config.orchestrator.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Run one cycle: fan out analyzers, aggregate, gate, persist.
    pub async fn analyze(&self, request: CycleRequest) -> Result<CycleReport, DealflowError> {
        let started = Instant::now();
        let continue_on_error = self.orchestrator_config.continue_on_error;

        let mut results: BTreeMap<String, AnalyzerResult> = BTreeMap::new();
        let mut failures: Vec<AnalyzerFailure> = Vec::new();
        let mut join_set: JoinSet<(String, String, String, Result<AnalyzerResult, DealflowError>)> =
            JoinSet::new();

        for (name, analyzer) in self.registry.iter() {
            let input = AnalyzerInput {
                deal_id: request.deal_id.clone(),
                analysis_cycle: request.analysis_cycle,
                input_data: request.input_data.clone(),
            };

            let report = analyzer.validate_input(&input);
            for warning in &report.warnings {
                log::debug!("analyzer '{name}': {warning}");
            }
            if !report.valid {
                let err = DealflowError::validation(name.clone(), report.errors);
                if !continue_on_error {
                    return Err(err);
                }
                let version = analyzer.metadata().version;
                let input_hash = analyzer.input_hash(&input);
                results.insert(
                    name.clone(),
                    AnalyzerResult::errored(&version, &input_hash, err.to_string()),
                );
                failures.push(AnalyzerFailure {
                    analyzer: name.clone(),
                    message: err.to_string(),
                });
                continue;
            }

            let analyzer = Arc::clone(analyzer);
            let name = name.clone();
            let timeout = self.orchestrator_config.analyzer_timeout();
            let retry = self.retry.clone();
            join_set.spawn(async move {
                let version = analyzer.metadata().version;
                let input_hash = analyzer.input_hash(&input);
                let outcome =
                    run_with_retry(name.as_str(), analyzer.as_ref(), input, timeout, &retry).await;
                (name, version, input_hash, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (name, version, input_hash, outcome) = match joined {
                Ok(tuple) => tuple,
                Err(e) => {
                    // Panics are caught inside the task, so a join error
                    // means the task was cancelled out from under us; the
                    // analyzer name is lost with it.
                    join_set.abort_all();
                    return Err(DealflowError::analyzer_failure(
                        "<task>",
                        format!("analyzer task aborted: {e}"),
                    ));
                }
            };

            match outcome {
                Ok(result) => {
                    results.insert(name, result);
                }
                Err(err) => {
                    log::warn!("deal {}: {err}", request.deal_id);
                    if !continue_on_error {
                        join_set.abort_all();
                        return Err(err);
                    }
                    results.insert(
                        name.clone(),
                        AnalyzerResult::errored(&version, &input_hash, err.to_string()),
                    );
                    failures.push(AnalyzerFailure {
                        analyzer: name,
                        message: err.to_string(),
                    });
                }
            }
        }

        let aggregate = self.aggregator.aggregate(&results);

        let mut dio = Dio {
            deal_id: request.deal_id.clone(),
            dio_id: String::new(),
            version: 0,
            created_at: Utc::now(),
            content_hash: String::new(),
            overall_score: aggregate.overall_score,
            coverage: aggregate.coverage,
            confidence: aggregate.confidence,
            analyzer_results: results,
            phase_inference_v1: None,
            fundability_assessment_v1: None,
            fundability_decision_v1: None,
        };

        // Gating runs only after the legacy score is final, and a gating
        // failure surfaces as absent gated fields, never as a cycle failure.
        self.apply_gate(&mut dio);

        let receipt = self
            .store
            .save_dio(dio.clone())
            .map_err(|e| DealflowError::Storage(e.to_string()))?;
        dio.dio_id = receipt.dio_id.clone();
        dio.version = receipt.version;
        dio.created_at = receipt.created_at;
        dio.content_hash = crate::storage::content_hash(&dio);

        let execution = ExecutionMetrics {
            analyzers_run: self.registry.len(),
            analyzers_failed: failures.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "deal {} cycle {}: analyzers_run={} analyzers_failed={} overall_score={:.1} version={}{}",
            request.deal_id,
            request.analysis_cycle,
            execution.analyzers_run,
            execution.analyzers_failed,
            dio.overall_score,
            receipt.version,
            if receipt.is_duplicate { " (duplicate)" } else { "" },
        );

        Ok(CycleReport {
            dio,
            receipt,
            execution,
            failures,
        })
    }

    fn apply_gate(&self, dio: &mut Dio) {
        let signals = merge_signals(&dio.analyzer_results);
        let violations: Vec<PolicyViolation> = {
            let mut all: Vec<PolicyViolation> = dio
                .analyzer_results
                .values()
                .flat_map(|result| result.policy_violations.iter().copied())
                .collect();
            all.sort_unstable();
            all.dedup();
            all
        };

        let legacy = dio.overall_score;
        let gate = &self.gate;
        let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| {
            gate.evaluate(&signals, &violations, legacy)
        }));

        match evaluated {
            Ok(Some(report)) => {
                dio.phase_inference_v1 = Some(report.phase_inference);
                dio.fundability_assessment_v1 = Some(report.assessment);
                dio.fundability_decision_v1 = report.decision;
            }
            Ok(None) => {}
            Err(_) => {
                log::warn!(
                    "deal {}: fundability gate panicked; gated fields omitted",
                    dio.deal_id
                );
            }
        }
        debug_assert_eq!(dio.overall_score, legacy, "gating must not touch the legacy score");
    }
}

/// Call one analyzer under a timeout, retrying on failure with the
/// configured backoff. A panicking analyzer is caught here, inside its own
/// task, so the failure stays on that analyzer's slot.
async fn run_with_retry(
    name: &str,
    analyzer: &dyn AnalyzerPort,
    input: AnalyzerInput,
    timeout: std::time::Duration,
    retry: &RetryConfig,
) -> Result<AnalyzerResult, DealflowError> {
    let mut last_err = None;
    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
            log::debug!("analyzer '{name}': retry attempt {attempt}");
        }
        let call = AssertUnwindSafe(analyzer.analyze(input.clone())).catch_unwind();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(result))) => return Ok(result),
            Ok(Ok(Err(e))) => {
                last_err = Some(DealflowError::analyzer_failure(name, e.to_string()));
            }
            Ok(Err(payload)) => {
                last_err = Some(DealflowError::analyzer_failure(
                    name,
                    format!("panicked: {}", panic_message(&payload)),
                ));
            }
            Err(_) => {
                last_err = Some(DealflowError::AnalyzerTimeout {
                    analyzer: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }
    }
    Err(last_err.expect("loop ran at least once"))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
