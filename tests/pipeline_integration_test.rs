//! End-to-end pipeline runs: cycle progression, progress monotonicity,
//! decision packs, and failure halting.

use dealflow::config::DealflowConfig;
use dealflow::orchestrator::DealOrchestrator;
use dealflow::pipeline::{AnalysisPipeline, Recommendation, RunRequest};
use dealflow::planner::Planner;
use dealflow::storage::{DioStore, InMemoryDioStore};
use dealflow::testkit::{DeepeningAnalyzer, FailingAnalyzer, StaticAnalyzer};
use dealflow::{AnalyzerRegistry, StopReason};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn config() -> DealflowConfig {
    let mut config = DealflowConfig::default();
    config.retry.max_retries = 0;
    config.retry.base_delay_ms = 1;
    config
}

fn pipeline_with(
    registry: AnalyzerRegistry,
    config: &DealflowConfig,
    store: Arc<dyn DioStore>,
) -> AnalysisPipeline {
    let orchestrator = DealOrchestrator::new(Arc::new(registry), store, config).unwrap();
    AnalysisPipeline::new(orchestrator, Planner::new(config.planner.clone()))
}

fn request() -> RunRequest {
    RunRequest {
        deal_id: "deal-pipe".into(),
        input_data: json!({}),
    }
}

#[tokio::test]
async fn deepening_deal_runs_all_three_cycles() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(Arc::new(DeepeningAnalyzer::new("digger", 75.0, 3)))
        .unwrap();

    let store: Arc<dyn DioStore> = Arc::new(InMemoryDioStore::new());
    let config = config();
    let pipeline = pipeline_with(registry, &config, Arc::clone(&store));

    let report = pipeline.run(request()).await;
    assert!(report.success);
    assert_eq!(report.metrics.cycles_completed, 3);
    assert_eq!(report.state.stop_reason, Some(StopReason::MaxCyclesReached));
    assert_eq!(report.ledger.depth_delta.len(), 3);
    // Cycle 1 digs up 3 evidence ids plus 1 newly-ok analyzer.
    assert_eq!(report.ledger.depth_delta[0], 4.0);
    assert_eq!(report.ledger.depth_delta[1], 3.0);
    assert_eq!(report.metrics.evidence_count, 9);

    // Three distinct DIO versions were persisted.
    let history = store.dio_history("deal-pipe").unwrap();
    assert_eq!(history.len(), 3);

    let pack = report.decision_pack.unwrap();
    assert_eq!(pack.cycles_completed, 3);
    assert_eq!(pack.final_dio_id, history[2].dio_id);
    assert_eq!(pack.recommendation, Recommendation::Favorable);
    assert!(!pack.should_block_investment);
}

#[tokio::test]
async fn shallow_deal_plateaus_after_one_cycle() {
    // Static analyzer: no evidence ids at all, so depth is just the one
    // newly-ok analyzer (1.0), below the 2.0 threshold.
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(Arc::new(StaticAnalyzer::scoring("flat", 55.0)))
        .unwrap();

    let store: Arc<dyn DioStore> = Arc::new(InMemoryDioStore::new());
    let config = config();
    let pipeline = pipeline_with(registry, &config, Arc::clone(&store));

    let report = pipeline.run(request()).await;
    assert!(report.success);
    assert_eq!(report.metrics.cycles_completed, 1);
    assert_eq!(report.state.stop_reason, Some(StopReason::DepthPlateau));
    assert_eq!(store.dio_history("deal-pipe").unwrap().len(), 1);
    assert_eq!(
        report.decision_pack.unwrap().recommendation,
        Recommendation::Neutral
    );
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(Arc::new(DeepeningAnalyzer::new("digger", 75.0, 3)))
        .unwrap();

    let config = config();
    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pipeline = pipeline_with(registry, &config, Arc::new(InMemoryDioStore::new()))
        .with_progress(move |percent| sink.lock().unwrap().push(percent));

    let report = pipeline.run(request()).await;
    assert!(report.success);

    let values = seen.lock().unwrap().clone();
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {values:?}");
    assert_eq!(*values.first().unwrap(), 0);
    assert_eq!(*values.last().unwrap(), 100);
}

#[tokio::test]
async fn unrecoverable_cycle_failure_halts_without_advancing() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(Arc::new(FailingAnalyzer::new("broken")))
        .unwrap();

    let mut config = config();
    config.orchestrator.continue_on_error = false;
    let store: Arc<dyn DioStore> = Arc::new(InMemoryDioStore::new());
    let pipeline = pipeline_with(registry, &config, Arc::clone(&store));

    let report = pipeline.run(request()).await;
    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("cycle 1"));
    assert_eq!(report.metrics.cycles_completed, 0);
    // Planner state was not advanced past the failed cycle and carries no
    // stop reason: the run halted, it did not synthesize.
    assert_eq!(report.state.cycle, Some(dealflow::Cycle::One));
    assert_eq!(report.state.stop_reason, None);
    assert!(report.final_dio.is_none());
    assert!(report.decision_pack.is_none());
    assert!(store.dio_history("deal-pipe").unwrap().is_empty());
}

#[tokio::test]
async fn partial_failures_do_not_halt_the_pipeline() {
    let mut registry = AnalyzerRegistry::new();
    registry
        .register(Arc::new(DeepeningAnalyzer::new("digger", 80.0, 3)))
        .unwrap();
    registry
        .register(Arc::new(FailingAnalyzer::new("broken")))
        .unwrap();

    let config = config();
    let pipeline = pipeline_with(registry, &config, Arc::new(InMemoryDioStore::new()));

    let report = pipeline.run(request()).await;
    assert!(report.success);
    assert_eq!(report.metrics.cycles_completed, 3);
    // One failed analyzer per cycle.
    assert_eq!(report.metrics.analyzers_failed, 3);
    assert_eq!(report.ledger.dead_ends, 3);
    let dio = report.final_dio.unwrap();
    assert_eq!(dio.overall_score, 80.0, "failed analyzer excluded from score");
}
