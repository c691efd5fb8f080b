//! Testing infrastructure: scripted analyzers with deterministic behavior.
//!
//! These stand in for real analyzer plug-ins so orchestration behavior
//! (isolation, timeout, retry, gating) can be exercised without any real
//! scoring logic. They are also handy when wiring a registry in examples.

use crate::analyzers::{AnalyzerInput, AnalyzerMetadata, AnalyzerPort, ValidationReport};
use crate::core::{
    AnalyzerResult, AnalyzerStatus, PolicyViolation, SignalEvidence, SignalKey,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const TESTKIT_VERSION: &str = "0.0.0-test";

fn metadata(name: &str) -> AnalyzerMetadata {
    AnalyzerMetadata {
        name: name.to_string(),
        version: TESTKIT_VERSION.to_string(),
        released_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        changelog: Vec::new(),
    }
}

/// Analyzer that always returns the same configured result.
#[derive(Debug, Clone)]
pub struct StaticAnalyzer {
    name: String,
    score: Option<f64>,
    status: AnalyzerStatus,
    coverage: f64,
    confidence: f64,
    evidence_ids: Vec<String>,
    signals: BTreeMap<SignalKey, SignalEvidence>,
    policy_violations: Vec<PolicyViolation>,
}

impl StaticAnalyzer {
    /// An ok analyzer with full coverage and confidence.
    pub fn scoring(name: &str, score: f64) -> Self {
        Self {
            name: name.to_string(),
            score: Some(score),
            status: AnalyzerStatus::Ok,
            coverage: 1.0,
            confidence: 1.0,
            evidence_ids: Vec::new(),
            signals: BTreeMap::new(),
            policy_violations: Vec::new(),
        }
    }

    pub fn insufficient(name: &str) -> Self {
        Self {
            name: name.to_string(),
            score: None,
            status: AnalyzerStatus::InsufficientData,
            coverage: 0.0,
            confidence: 0.0,
            evidence_ids: Vec::new(),
            signals: BTreeMap::new(),
            policy_violations: Vec::new(),
        }
    }

    pub fn with_weights(mut self, coverage: f64, confidence: f64) -> Self {
        self.coverage = coverage;
        self.confidence = confidence;
        self
    }

    pub fn with_evidence(mut self, ids: &[&str]) -> Self {
        self.evidence_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_signal(mut self, key: SignalKey, confidence: f64) -> Self {
        self.signals.insert(
            key,
            SignalEvidence {
                present: true,
                confidence,
                evidence_ids: vec![format!("{}-{}", self.name, key)],
            },
        );
        self
    }

    pub fn with_violation(mut self, violation: PolicyViolation) -> Self {
        self.policy_violations.push(violation);
        self
    }
}

#[async_trait]
impl AnalyzerPort for StaticAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        Ok(AnalyzerResult {
            analyzer_version: TESTKIT_VERSION.to_string(),
            executed_at: Utc::now(),
            status: self.status,
            coverage: self.coverage,
            confidence: self.confidence,
            score: self.score,
            evidence_ids: self.evidence_ids.clone(),
            signals: self.signals.clone(),
            policy_violations: self.policy_violations.clone(),
            error: None,
            input_hash: self.input_hash(&input),
        })
    }
}

/// Analyzer that always fails.
#[derive(Debug, Clone)]
pub struct FailingAnalyzer {
    name: String,
}

impl FailingAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AnalyzerPort for FailingAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, _input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        anyhow::bail!("scripted failure in '{}'", self.name)
    }
}

/// Analyzer that panics instead of returning; exercises panic isolation.
#[derive(Debug, Clone)]
pub struct PanickingAnalyzer {
    name: String,
}

impl PanickingAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AnalyzerPort for PanickingAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, _input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        panic!("scripted panic in '{}'", self.name)
    }
}

/// Analyzer that sleeps forever; exercises the timeout path.
#[derive(Debug, Clone)]
pub struct HangingAnalyzer {
    name: String,
}

impl HangingAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AnalyzerPort for HangingAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, _input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        anyhow::bail!("unreachable")
    }
}

/// Analyzer that fails a fixed number of times before succeeding;
/// exercises the retry budget.
#[derive(Debug)]
pub struct FlakyAnalyzer {
    name: String,
    failures_remaining: AtomicU32,
    score: f64,
}

impl FlakyAnalyzer {
    pub fn new(name: &str, failures: u32, score: f64) -> Self {
        Self {
            name: name.to_string(),
            failures_remaining: AtomicU32::new(failures),
            score,
        }
    }
}

#[async_trait]
impl AnalyzerPort for FlakyAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("transient failure in '{}' ({remaining} left)", self.name);
        }
        Ok(AnalyzerResult {
            analyzer_version: TESTKIT_VERSION.to_string(),
            executed_at: Utc::now(),
            status: AnalyzerStatus::Ok,
            coverage: 1.0,
            confidence: 1.0,
            score: Some(self.score),
            evidence_ids: Vec::new(),
            signals: BTreeMap::new(),
            policy_violations: Vec::new(),
            error: None,
            input_hash: self.input_hash(&input),
        })
    }
}

/// Analyzer that surfaces new evidence every cycle; exercises multi-cycle
/// depth progression.
#[derive(Debug, Clone)]
pub struct DeepeningAnalyzer {
    name: String,
    score: f64,
    evidence_per_cycle: usize,
}

impl DeepeningAnalyzer {
    pub fn new(name: &str, score: f64, evidence_per_cycle: usize) -> Self {
        Self {
            name: name.to_string(),
            score,
            evidence_per_cycle,
        }
    }
}

#[async_trait]
impl AnalyzerPort for DeepeningAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::ok()
    }

    async fn analyze(&self, input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        let evidence_ids = (0..self.evidence_per_cycle)
            .map(|i| format!("{}-c{}-e{}", self.name, input.analysis_cycle, i))
            .collect();
        Ok(AnalyzerResult {
            analyzer_version: TESTKIT_VERSION.to_string(),
            executed_at: Utc::now(),
            status: AnalyzerStatus::Ok,
            coverage: 1.0,
            confidence: 1.0,
            score: Some(self.score),
            evidence_ids,
            signals: BTreeMap::new(),
            policy_violations: Vec::new(),
            error: None,
            input_hash: self.input_hash(&input),
        })
    }
}

/// Analyzer that rejects every input; exercises the validation path.
#[derive(Debug, Clone)]
pub struct RejectingAnalyzer {
    name: String,
}

impl RejectingAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AnalyzerPort for RejectingAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        metadata(&self.name)
    }

    fn validate_input(&self, _input: &AnalyzerInput) -> ValidationReport {
        ValidationReport::invalid(vec!["scripted validation rejection".to_string()])
    }

    async fn analyze(&self, _input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        anyhow::bail!("analyze called on rejecting analyzer")
    }
}
