//! Scoring layers: legacy aggregation, phase inference, and the
//! feature-gated fundability assessment built on top of them.

pub mod aggregator;
pub mod fundability;
pub mod phase;

pub use aggregator::{AggregateScore, ScoreAggregator};
pub use fundability::{FundabilityGate, GateReport};
pub use phase::PhaseInferenceEngine;
