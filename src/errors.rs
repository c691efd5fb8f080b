//! Unified error types for dealflow orchestration operations.
//!
//! The taxonomy mirrors how failures propagate through the engine:
//! analyzer-local failures (validation, timeout, execution) are recovered by
//! the orchestrator; storage and pipeline failures halt the run. All
//! variants convert to `anyhow::Error` so orchestration boundaries can stay
//! on `anyhow::Result`.

use thiserror::Error;

/// Categorized error type for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DealflowError {
    /// Analyzer input failed validation; the analyzer is skipped.
    #[error("analyzer '{analyzer}' rejected input: {}", errors.join("; "))]
    Validation {
        analyzer: String,
        errors: Vec<String>,
    },

    /// An analyzer exceeded its timeout budget.
    #[error("analyzer '{analyzer}' timed out after {timeout_ms}ms")]
    AnalyzerTimeout { analyzer: String, timeout_ms: u64 },

    /// An analyzer returned an error or panicked.
    #[error("analyzer '{analyzer}' failed: {message}")]
    AnalyzerFailure { analyzer: String, message: String },

    /// Storage failure (I/O, serialization). Version-allocation races
    /// cannot surface here: both stores serialize saves per deal.
    #[error("storage error: {0}")]
    Storage(String),

    /// An orchestrator cycle failed unrecoverably; the pipeline halts.
    #[error("pipeline failed at cycle {cycle}: {message}")]
    PipelineFailure { cycle: u8, message: String },

    /// Invalid engine configuration detected at construction.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DealflowError {
    pub fn validation(analyzer: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Validation {
            analyzer: analyzer.into(),
            errors,
        }
    }

    pub fn analyzer_failure(analyzer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AnalyzerFailure {
            analyzer: analyzer.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the failure is analyzer-local and recoverable by the
    /// orchestrator when `continue_on_error` is set.
    pub fn is_analyzer_local(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::AnalyzerTimeout { .. } | Self::AnalyzerFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_local_errors_are_recoverable() {
        assert!(DealflowError::AnalyzerTimeout {
            analyzer: "risk_profile".into(),
            timeout_ms: 60_000,
        }
        .is_analyzer_local());
        assert!(
            DealflowError::validation("narrative_quality", vec!["missing docs".into()])
                .is_analyzer_local()
        );
        assert!(!DealflowError::Storage("disk full".into()).is_analyzer_local());
        assert!(!DealflowError::PipelineFailure {
            cycle: 2,
            message: "cycle failed".into(),
        }
        .is_analyzer_local());
    }

    #[test]
    fn display_includes_analyzer_name() {
        let err = DealflowError::analyzer_failure("financial_health", "ledger parse error");
        assert!(err.to_string().contains("financial_health"));
    }
}
