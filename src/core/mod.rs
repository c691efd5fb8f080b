//! Core domain types shared across the engine.
//!
//! The central artifact is the [`Dio`] (Deal Intelligence Object): an
//! immutable, versioned snapshot of one analysis cycle's combined analyzer
//! output. Everything here is plain serializable data; behavior lives in the
//! orchestrator, scoring, planner, and storage modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Required content signals a deal can evidence. The phase ladder is built
/// from these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    ProblemDefinition,
    CustomerPersona,
    SolutionConcept,
    Traction,
    Financials,
}

impl SignalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKey::ProblemDefinition => "problem_definition",
            SignalKey::CustomerPersona => "customer_persona",
            SignalKey::SolutionConcept => "solution_concept",
            SignalKey::Traction => "traction",
            SignalKey::Financials => "financials",
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence observed for one content signal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalEvidence {
    pub present: bool,
    /// Confidence that the evidence genuinely supports the signal (0..1).
    pub confidence: f64,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

/// Deal maturity phases, ordered from earliest to latest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DealPhase {
    Concept,
    Validation,
    Growth,
}

impl fmt::Display for DealPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DealPhase::Concept => "concept",
            DealPhase::Validation => "validation",
            DealPhase::Growth => "growth",
        };
        f.write_str(name)
    }
}

/// Policy violations that can hard-reject a deal. Low evidence alone never
/// produces one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolation {
    SanctionsHit,
    FraudIndicator,
    ProhibitedJurisdiction,
}

/// Terminal status of one analyzer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerStatus {
    Ok,
    InsufficientData,
    Error,
}

/// Output of one analyzer for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub analyzer_version: String,
    pub executed_at: DateTime<Utc>,
    pub status: AnalyzerStatus,
    /// Fraction of expected inputs that were present (0..1).
    pub coverage: f64,
    /// Analyzer-declared confidence in its own result (0..1).
    pub confidence: f64,
    /// Dimension score 0..100; present when status is `Ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
    /// Content-signal observations feeding phase inference.
    #[serde(default)]
    pub signals: BTreeMap<SignalKey, SignalEvidence>,
    #[serde(default)]
    pub policy_violations: Vec<PolicyViolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Deterministic hash of the analyzer's input, for traceability.
    pub input_hash: String,
}

impl AnalyzerResult {
    /// An errored slot recorded when an analyzer fails or times out.
    pub fn errored(analyzer_version: &str, input_hash: &str, message: impl Into<String>) -> Self {
        Self {
            analyzer_version: analyzer_version.to_string(),
            executed_at: Utc::now(),
            status: AnalyzerStatus::Error,
            coverage: 0.0,
            confidence: 0.0,
            score: None,
            evidence_ids: Vec::new(),
            signals: BTreeMap::new(),
            policy_violations: Vec::new(),
            error: Some(message.into()),
            input_hash: input_hash.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnalyzerStatus::Ok
    }
}

/// Inferred deal maturity and the confidence behind the inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInference {
    pub phase: DealPhase,
    /// Confidence that the deal genuinely sits at `phase` (0..1).
    pub confidence: f64,
    /// Signals that were present with sufficient evidence.
    pub evidenced_signals: Vec<SignalKey>,
}

/// Cap derived from the phase-confidence tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundabilityCaps {
    pub max_fundability_score_0_100: f64,
}

/// Shadow-mode fundability assessment. Non-authoritative; the legacy
/// `overall_score` stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundabilityAssessment {
    /// Audit copy of the DIO's overall score at computation time.
    pub legacy_overall_score_0_100: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<FundabilityCaps>,
    /// min(legacy score, cap); only populated when soft caps are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundability_score_0_100: Option<f64>,
}

/// Hard-gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateOutcome {
    Approve,
    Conditional,
    Reject,
}

/// Hard-gate decision. `should_block_investment` is true only for
/// [`GateOutcome::Reject`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundabilityDecision {
    pub outcome: GateOutcome,
    pub should_block_investment: bool,
    #[serde(default)]
    pub missing_required_signals: Vec<SignalKey>,
    /// Machine-actionable follow-ups, e.g. `provide_evidence:<signal>`.
    #[serde(default)]
    pub next_requests: Vec<String>,
    #[serde(default)]
    pub policy_violations: Vec<PolicyViolation>,
}

/// Deal Intelligence Object: immutable snapshot of one analysis cycle.
///
/// Created once per orchestrator run and never updated in place. A re-run
/// over identical content is flagged as a duplicate by the store instead of
/// allocating a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dio {
    pub deal_id: String,
    /// Storage-assigned identity, `<deal_id>:v<version>`.
    pub dio_id: String,
    /// Strictly increasing per deal; assigned by the store.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    /// Legacy authoritative score (0..100). Write-once: gating never
    /// mutates it.
    pub overall_score: f64,
    /// Fraction of registered analyzers that returned ok.
    pub coverage: f64,
    /// Aggregate confidence over ok analyzers.
    pub confidence: f64,
    pub analyzer_results: BTreeMap<String, AnalyzerResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_inference_v1: Option<PhaseInference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundability_assessment_v1: Option<FundabilityAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundability_decision_v1: Option<FundabilityDecision>,
}

impl Dio {
    /// Canonical JSON over the deterministic content of the snapshot.
    ///
    /// Excludes volatile timestamps (`created_at`, per-analyzer
    /// `executed_at`) and storage-assigned fields (`dio_id`, `version`,
    /// `content_hash`) so that re-running identical input produces an
    /// identical fingerprint. BTreeMap keys keep field order stable.
    pub fn content_fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct ResultView<'a> {
            analyzer_version: &'a str,
            status: AnalyzerStatus,
            coverage: f64,
            confidence: f64,
            score: Option<f64>,
            evidence_ids: &'a [String],
            signals: &'a BTreeMap<SignalKey, SignalEvidence>,
            policy_violations: &'a [PolicyViolation],
            error: &'a Option<String>,
            input_hash: &'a str,
        }

        #[derive(Serialize)]
        struct DioView<'a> {
            deal_id: &'a str,
            overall_score: f64,
            coverage: f64,
            confidence: f64,
            analyzer_results: BTreeMap<&'a str, ResultView<'a>>,
            phase_inference_v1: &'a Option<PhaseInference>,
            fundability_assessment_v1: &'a Option<FundabilityAssessment>,
            fundability_decision_v1: &'a Option<FundabilityDecision>,
        }

        let view = DioView {
            deal_id: &self.deal_id,
            overall_score: self.overall_score,
            coverage: self.coverage,
            confidence: self.confidence,
            analyzer_results: self
                .analyzer_results
                .iter()
                .map(|(name, result)| {
                    (
                        name.as_str(),
                        ResultView {
                            analyzer_version: &result.analyzer_version,
                            status: result.status,
                            coverage: result.coverage,
                            confidence: result.confidence,
                            score: result.score,
                            evidence_ids: &result.evidence_ids,
                            signals: &result.signals,
                            policy_violations: &result.policy_violations,
                            error: &result.error,
                            input_hash: &result.input_hash,
                        },
                    )
                })
                .collect(),
            phase_inference_v1: &self.phase_inference_v1,
            fundability_assessment_v1: &self.fundability_assessment_v1,
            fundability_decision_v1: &self.fundability_decision_v1,
        };

        serde_json::to_string(&view).expect("fingerprint view is always serializable")
    }

    /// Distinct evidence ids across all analyzer slots and their signals.
    pub fn evidence_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for result in self.analyzer_results.values() {
            ids.extend(result.evidence_ids.iter().cloned());
            for evidence in result.signals.values() {
                ids.extend(evidence.evidence_ids.iter().cloned());
            }
        }
        ids
    }

    /// Names of analyzers that returned ok.
    pub fn ok_analyzers(&self) -> BTreeSet<String> {
        self.analyzer_results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Analysis cycle index. Three cycles is the ceiling; cycle 3 always
/// terminates in synthesis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Cycle {
    One,
    Two,
    Three,
}

impl Cycle {
    pub fn number(&self) -> u8 {
        match self {
            Cycle::One => 1,
            Cycle::Two => 2,
            Cycle::Three => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Cycle::One),
            2 => Some(Cycle::Two),
            3 => Some(Cycle::Three),
            _ => None,
        }
    }

    /// The following cycle, if any. Forward only.
    pub fn next(&self) -> Option<Cycle> {
        match self {
            Cycle::One => Some(Cycle::Two),
            Cycle::Two => Some(Cycle::Three),
            Cycle::Three => None,
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle{}", self.number())
    }
}

/// Why the planner stopped requesting cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Cycle ceiling reached; cycle 3 always synthesizes.
    MaxCyclesReached,
    /// Depth delta fell below the continue threshold.
    DepthPlateau,
}

/// A hypothesis the planner tracks across cycles, with the probe results
/// used for calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub statement: String,
    /// Forecast probability the hypothesis holds (0..1).
    pub forecast: f64,
}

/// Mutable per-deal planning cursor. Advanced once per completed cycle;
/// never regressed, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerState {
    pub deal_id: String,
    /// `None` only before first initialization.
    pub cycle: Option<Cycle>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub subgoals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl PlannerState {
    pub fn new(deal_id: impl Into<String>) -> Self {
        Self {
            deal_id: deal_id.into(),
            cycle: None,
            goals: Vec::new(),
            constraints: Vec::new(),
            hypotheses: Vec::new(),
            subgoals: Vec::new(),
            focus: None,
            stop_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stop_reason.is_some()
    }
}
