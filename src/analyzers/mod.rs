//! Analyzer plug-in contract and registry.
//!
//! Each analyzer scores one dimension of a deal (narrative quality,
//! financial health, risk, ...). The engine treats them as opaque
//! capabilities behind [`AnalyzerPort`]: validate input, hash input for
//! traceability, analyze under the orchestrator's timeout/retry discipline.
//! The scoring algorithms themselves live outside this crate.

pub mod declared;

pub use declared::DeclaredScoreAnalyzer;

use crate::core::AnalyzerResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Input handed to every analyzer for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerInput {
    pub deal_id: String,
    pub analysis_cycle: u8,
    /// Pre-extracted deal content (documents already ingested upstream).
    pub input_data: serde_json::Value,
}

/// Static description of an analyzer implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerMetadata {
    pub name: String,
    pub version: String,
    pub released_at: DateTime<Utc>,
    #[serde(default)]
    pub changelog: Vec<String>,
}

/// Outcome of input validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Pluggable unit of scoring logic.
#[async_trait]
pub trait AnalyzerPort: Send + Sync {
    fn metadata(&self) -> AnalyzerMetadata;

    fn validate_input(&self, input: &AnalyzerInput) -> ValidationReport;

    /// Deterministic hash of the input as this analyzer sees it.
    fn input_hash(&self, input: &AnalyzerInput) -> String {
        hash_json(&input.input_data)
    }

    /// Score the deal. May fail or exceed the orchestrator's timeout;
    /// retries and isolation are the orchestrator's responsibility.
    async fn analyze(&self, input: AnalyzerInput) -> anyhow::Result<AnalyzerResult>;
}

/// SHA-256 hex digest of a JSON value's canonical serialization.
///
/// `serde_json` keeps object keys in map order for `Value` (BTreeMap-backed
/// unless `preserve_order` is enabled), so equal values hash equally.
pub fn hash_json(value: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Name-keyed analyzer registry with deterministic iteration order.
#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: BTreeMap<String, Arc<dyn AnalyzerPort>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an analyzer under its metadata name. Duplicate names are
    /// rejected so two implementations cannot silently shadow each other.
    pub fn register(&mut self, analyzer: Arc<dyn AnalyzerPort>) -> anyhow::Result<()> {
        let name = analyzer.metadata().name;
        if self.analyzers.contains_key(&name) {
            anyhow::bail!("analyzer '{name}' is already registered");
        }
        self.analyzers.insert(name, analyzer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AnalyzerPort>> {
        self.analyzers.get(name)
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Analyzers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn AnalyzerPort>)> {
        self.analyzers.iter()
    }

    /// The standard underwriting registry: six declared-dimension analyzers.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for dimension in [
            "narrative_quality",
            "financial_health",
            "risk_profile",
            "team_strength",
            "market_opportunity",
            "traction",
        ] {
            registry
                .register(Arc::new(DeclaredScoreAnalyzer::new(dimension)))
                .expect("standard dimensions are distinct");
        }
        registry
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.analyzers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_json_is_deterministic() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(hash_json(&a), hash_json(&b));
        assert_ne!(hash_json(&a), hash_json(&json!({"a": 1, "b": 3})));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = AnalyzerRegistry::new();
        registry
            .register(Arc::new(DeclaredScoreAnalyzer::new("risk_profile")))
            .unwrap();
        let err = registry
            .register(Arc::new(DeclaredScoreAnalyzer::new("risk_profile")))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn standard_registry_iterates_in_name_order() {
        let registry = AnalyzerRegistry::standard();
        assert_eq!(registry.len(), 6);
        let names: Vec<_> = registry.iter().map(|(name, _)| name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
