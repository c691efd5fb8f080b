//! Legacy overall-score aggregation.
//!
//! Combines per-analyzer results into one overall score, weighting each ok
//! analyzer by its declared confidence × coverage. Analyzers that failed or
//! reported insufficient data are excluded, not penalized: partial failure
//! shrinks the weight pool instead of zeroing contributions, which keeps the
//! score deterministic for whichever subset succeeded.

use crate::core::AnalyzerResult;
use std::collections::BTreeMap;

/// Aggregated cycle-level score with coverage and confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateScore {
    /// Weighted overall score, 0..100. Zero when no analyzer succeeded.
    pub overall_score: f64,
    /// Fraction of analyzers that returned ok.
    pub coverage: f64,
    /// Mean confidence over ok analyzers.
    pub confidence: f64,
}

/// Stateless aggregator over a cycle's analyzer results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreAggregator;

impl ScoreAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, results: &BTreeMap<String, AnalyzerResult>) -> AggregateScore {
        let scored: Vec<(&AnalyzerResult, f64)> = results
            .values()
            .filter(|result| result.is_ok())
            .filter_map(|result| result.score.map(|score| (result, score)))
            .collect();

        if results.is_empty() || scored.is_empty() {
            return AggregateScore {
                overall_score: 0.0,
                coverage: 0.0,
                confidence: 0.0,
            };
        }

        let total_weight: f64 = scored
            .iter()
            .map(|(result, _)| weight_of(result))
            .sum();

        let overall_score = if total_weight > 0.0 {
            scored
                .iter()
                .map(|(result, score)| weight_of(result) * score)
                .sum::<f64>()
                / total_weight
        } else {
            // All ok analyzers declared zero weight; fall back to the
            // unweighted mean rather than dropping their scores.
            scored.iter().map(|(_, score)| score).sum::<f64>() / scored.len() as f64
        };

        let confidence =
            scored.iter().map(|(result, _)| result.confidence).sum::<f64>() / scored.len() as f64;

        AggregateScore {
            overall_score: overall_score.clamp(0.0, 100.0),
            coverage: scored.len() as f64 / results.len() as f64,
            confidence,
        }
    }
}

fn weight_of(result: &AnalyzerResult) -> f64 {
    (result.confidence.clamp(0.0, 1.0)) * (result.coverage.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AnalyzerStatus;
    use chrono::Utc;

    fn result(status: AnalyzerStatus, score: Option<f64>, confidence: f64, coverage: f64) -> AnalyzerResult {
        AnalyzerResult {
            analyzer_version: "1.0.0".into(),
            executed_at: Utc::now(),
            status,
            coverage,
            confidence,
            score,
            evidence_ids: Vec::new(),
            signals: Default::default(),
            policy_violations: Vec::new(),
            error: None,
            input_hash: "h".into(),
        }
    }

    #[test]
    fn failed_analyzers_are_excluded_not_penalized() {
        let mut results = BTreeMap::new();
        results.insert("a".into(), result(AnalyzerStatus::Ok, Some(80.0), 1.0, 1.0));
        results.insert("b".into(), result(AnalyzerStatus::Ok, Some(60.0), 1.0, 1.0));
        results.insert("c".into(), result(AnalyzerStatus::Error, None, 0.0, 0.0));
        results.insert("d".into(), result(AnalyzerStatus::Error, None, 0.0, 0.0));

        let agg = ScoreAggregator::new().aggregate(&results);
        assert_eq!(agg.overall_score, 70.0);
        assert_eq!(agg.coverage, 0.5);
    }

    #[test]
    fn weights_follow_confidence_times_coverage() {
        let mut results = BTreeMap::new();
        // weight 1.0 on 90, weight 0.25 on 50 -> (90 + 12.5) / 1.25 = 82
        results.insert("a".into(), result(AnalyzerStatus::Ok, Some(90.0), 1.0, 1.0));
        results.insert("b".into(), result(AnalyzerStatus::Ok, Some(50.0), 0.5, 0.5));

        let agg = ScoreAggregator::new().aggregate(&results);
        assert!((agg.overall_score - 82.0).abs() < 1e-9);
        assert!((agg.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn no_successful_analyzers_yields_zero() {
        let mut results = BTreeMap::new();
        results.insert("a".into(), result(AnalyzerStatus::Error, None, 0.0, 0.0));
        results.insert(
            "b".into(),
            result(AnalyzerStatus::InsufficientData, None, 0.0, 0.0),
        );
        let agg = ScoreAggregator::new().aggregate(&results);
        assert_eq!(agg.overall_score, 0.0);
        assert_eq!(agg.coverage, 0.0);
        assert_eq!(agg.confidence, 0.0);
    }

    #[test]
    fn zero_weight_ok_results_fall_back_to_mean() {
        let mut results = BTreeMap::new();
        results.insert("a".into(), result(AnalyzerStatus::Ok, Some(40.0), 0.0, 1.0));
        results.insert("b".into(), result(AnalyzerStatus::Ok, Some(60.0), 0.0, 1.0));
        let agg = ScoreAggregator::new().aggregate(&results);
        assert_eq!(agg.overall_score, 50.0);
    }

    #[test]
    fn empty_result_set_yields_zero() {
        let agg = ScoreAggregator::new().aggregate(&BTreeMap::new());
        assert_eq!(agg.overall_score, 0.0);
    }
}
