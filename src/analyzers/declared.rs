//! Declared-dimension analyzer.
//!
//! Real scoring algorithms (narrative models, financial statement analysis,
//! risk engines) run outside this crate. Their outputs arrive as a
//! `dimensions.<name>` object inside the structured deal input, and this
//! analyzer lifts that object into an [`AnalyzerResult`]. A missing
//! dimension is `insufficient_data`, not an error, so the cycle keeps going.

use crate::analyzers::{hash_json, AnalyzerInput, AnalyzerMetadata, AnalyzerPort, ValidationReport};
use crate::core::{AnalyzerResult, AnalyzerStatus, PolicyViolation, SignalEvidence, SignalKey};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

const DECLARED_VERSION: &str = "1.2.0";

/// The shape external analyzers declare for one dimension.
#[derive(Debug, Clone, Deserialize)]
struct DeclaredDimension {
    score: f64,
    #[serde(default = "default_coverage")]
    coverage: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    evidence_ids: Vec<String>,
    #[serde(default)]
    signals: BTreeMap<SignalKey, SignalEvidence>,
    #[serde(default)]
    policy_violations: Vec<PolicyViolation>,
}

fn default_coverage() -> f64 {
    1.0
}

fn default_confidence() -> f64 {
    0.5
}

/// Analyzer that scores one named dimension from pre-extracted deal input.
#[derive(Debug, Clone)]
pub struct DeclaredScoreAnalyzer {
    dimension: String,
}

impl DeclaredScoreAnalyzer {
    pub fn new(dimension: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
        }
    }

    fn dimension_value<'a>(&self, input: &'a AnalyzerInput) -> Option<&'a serde_json::Value> {
        input.input_data.get("dimensions")?.get(&self.dimension)
    }
}

#[async_trait]
impl AnalyzerPort for DeclaredScoreAnalyzer {
    fn metadata(&self) -> AnalyzerMetadata {
        AnalyzerMetadata {
            name: self.dimension.clone(),
            version: DECLARED_VERSION.to_string(),
            released_at: Utc.with_ymd_and_hms(2026, 3, 17, 0, 0, 0).unwrap(),
            changelog: vec![
                "1.2.0: signal evidence carried per dimension".to_string(),
                "1.1.0: policy violations surfaced".to_string(),
            ],
        }
    }

    fn validate_input(&self, input: &AnalyzerInput) -> ValidationReport {
        if !input.input_data.is_object() {
            return ValidationReport::invalid(vec!["input_data must be a JSON object".to_string()]);
        }
        if let Some(value) = self.dimension_value(input) {
            match serde_json::from_value::<DeclaredDimension>(value.clone()) {
                Ok(dim) if !(0.0..=100.0).contains(&dim.score) => ValidationReport::invalid(vec![
                    format!("dimension '{}' score {} outside 0..100", self.dimension, dim.score),
                ]),
                Ok(_) => ValidationReport::ok(),
                Err(e) => ValidationReport::invalid(vec![format!(
                    "dimension '{}' is malformed: {e}",
                    self.dimension
                )]),
            }
        } else {
            ValidationReport::ok()
                .with_warning(format!("dimension '{}' not declared", self.dimension))
        }
    }

    fn input_hash(&self, input: &AnalyzerInput) -> String {
        // Hash only the slice of input this analyzer reads, so unrelated
        // dimensions do not churn the trace hash.
        match self.dimension_value(input) {
            Some(value) => hash_json(value),
            None => hash_json(&serde_json::Value::Null),
        }
    }

    async fn analyze(&self, input: AnalyzerInput) -> anyhow::Result<AnalyzerResult> {
        let input_hash = self.input_hash(&input);
        let Some(value) = self.dimension_value(&input) else {
            log::debug!(
                "deal {}: dimension '{}' absent, recording insufficient_data",
                input.deal_id,
                self.dimension
            );
            return Ok(AnalyzerResult {
                analyzer_version: DECLARED_VERSION.to_string(),
                executed_at: Utc::now(),
                status: AnalyzerStatus::InsufficientData,
                coverage: 0.0,
                confidence: 0.0,
                score: None,
                evidence_ids: Vec::new(),
                signals: BTreeMap::new(),
                policy_violations: Vec::new(),
                error: None,
                input_hash,
            });
        };

        let dim: DeclaredDimension = serde_json::from_value(value.clone())?;
        Ok(AnalyzerResult {
            analyzer_version: DECLARED_VERSION.to_string(),
            executed_at: Utc::now(),
            status: AnalyzerStatus::Ok,
            coverage: dim.coverage.clamp(0.0, 1.0),
            confidence: dim.confidence.clamp(0.0, 1.0),
            score: Some(dim.score.clamp(0.0, 100.0)),
            evidence_ids: dim.evidence_ids,
            signals: dim.signals,
            policy_violations: dim.policy_violations,
            error: None,
            input_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(data: serde_json::Value) -> AnalyzerInput {
        AnalyzerInput {
            deal_id: "deal-1".into(),
            analysis_cycle: 1,
            input_data: data,
        }
    }

    #[tokio::test]
    async fn declared_dimension_becomes_ok_result() {
        let analyzer = DeclaredScoreAnalyzer::new("financial_health");
        let result = analyzer
            .analyze(input(json!({
                "dimensions": {
                    "financial_health": {
                        "score": 81.5,
                        "confidence": 0.9,
                        "evidence_ids": ["doc-3"],
                    }
                }
            })))
            .await
            .unwrap();
        assert_eq!(result.status, AnalyzerStatus::Ok);
        assert_eq!(result.score, Some(81.5));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.evidence_ids, vec!["doc-3".to_string()]);
    }

    #[tokio::test]
    async fn missing_dimension_is_insufficient_data() {
        let analyzer = DeclaredScoreAnalyzer::new("traction");
        let result = analyzer.analyze(input(json!({"dimensions": {}}))).await.unwrap();
        assert_eq!(result.status, AnalyzerStatus::InsufficientData);
        assert_eq!(result.score, None);
    }

    #[test]
    fn out_of_range_score_fails_validation() {
        let analyzer = DeclaredScoreAnalyzer::new("risk_profile");
        let report = analyzer.validate_input(&input(json!({
            "dimensions": {"risk_profile": {"score": 140.0}}
        })));
        assert!(!report.valid);
    }

    #[test]
    fn absent_dimension_validates_with_warning() {
        let analyzer = DeclaredScoreAnalyzer::new("risk_profile");
        let report = analyzer.validate_input(&input(json!({"dimensions": {}})));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn input_hash_ignores_other_dimensions() {
        let analyzer = DeclaredScoreAnalyzer::new("risk_profile");
        let a = analyzer.input_hash(&input(json!({
            "dimensions": {"risk_profile": {"score": 50.0}, "traction": {"score": 10.0}}
        })));
        let b = analyzer.input_hash(&input(json!({
            "dimensions": {"risk_profile": {"score": 50.0}, "traction": {"score": 90.0}}
        })));
        assert_eq!(a, b);
    }
}
