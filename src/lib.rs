// Export modules for library usage
pub mod analyzers;
pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod scoring;
pub mod storage;
pub mod testkit;

// Re-export commonly used types
pub use crate::core::{
    AnalyzerResult, AnalyzerStatus, Cycle, DealPhase, Dio, FundabilityAssessment,
    FundabilityDecision, GateOutcome, PhaseInference, PlannerState, PolicyViolation,
    SignalEvidence, SignalKey, StopReason,
};

pub use crate::analyzers::{
    AnalyzerInput, AnalyzerMetadata, AnalyzerPort, AnalyzerRegistry, DeclaredScoreAnalyzer,
    ValidationReport,
};

pub use crate::config::{
    DealflowConfig, FundabilityFeatures, GatingThresholds, OrchestratorConfig, PlannerThresholds,
    RetryConfig, RetryStrategy,
};

pub use crate::errors::DealflowError;

pub use crate::orchestrator::{CycleReport, CycleRequest, DealOrchestrator, ExecutionMetrics};

pub use crate::pipeline::{
    AnalysisPipeline, DecisionPack, PipelineMetrics, PipelineReport, Recommendation, RunRequest,
};

pub use crate::planner::{
    Calibration, CycleEvidence, HypothesisProbe, LedgerManifest, Planner, PlannerDecision,
};

pub use crate::scoring::{FundabilityGate, PhaseInferenceEngine, ScoreAggregator};

pub use crate::storage::{DioFilter, DioStore, FileDioStore, InMemoryDioStore, SaveReceipt};
