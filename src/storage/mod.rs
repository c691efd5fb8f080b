//! Versioned, idempotent DIO persistence.
//!
//! Stores are append-only: a DIO row is never mutated after insert. Saving
//! content identical to the latest stored version short-circuits with
//! `is_duplicate = true` and allocates nothing. Version allocation happens
//! under a per-deal serialization point so two concurrent cycles can neither
//! allocate the same version nor clobber each other's write.

pub mod file;
pub mod memory;

pub use file::FileDioStore;
pub use memory::InMemoryDioStore;

use crate::core::Dio;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Result of an idempotent save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub dio_id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// True when the content matched the latest stored version and no row
    /// was written.
    pub is_duplicate: bool,
}

/// Filter for [`DioStore::query_dios`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DioFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_overall_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl DioFilter {
    pub fn matches(&self, dio: &Dio) -> bool {
        if let Some(deal_id) = &self.deal_id {
            if &dio.deal_id != deal_id {
                return false;
            }
        }
        if let Some(min_version) = self.min_version {
            if dio.version < min_version {
                return false;
            }
        }
        if let Some(min_score) = self.min_overall_score {
            if dio.overall_score < min_score {
                return false;
            }
        }
        true
    }
}

/// Versioned DIO store keyed by `deal_id` with uniqueness on
/// `(deal_id, version)`.
pub trait DioStore: Send + Sync {
    /// Idempotent save; see module docs for the duplicate short-circuit.
    fn save_dio(&self, dio: Dio) -> anyhow::Result<SaveReceipt>;

    fn latest_dio(&self, deal_id: &str) -> anyhow::Result<Option<Dio>>;

    fn dio_version(&self, deal_id: &str, version: u32) -> anyhow::Result<Option<Dio>>;

    /// Full history in ascending version order.
    fn dio_history(&self, deal_id: &str) -> anyhow::Result<Vec<Dio>>;

    fn query_dios(&self, filter: &DioFilter) -> anyhow::Result<Vec<Dio>>;

    /// Remove one version row. Returns whether anything was deleted.
    fn delete_dio(&self, dio_id: &str) -> anyhow::Result<bool>;
}

/// SHA-256 hex digest over the DIO's deterministic content fingerprint.
pub fn content_hash(dio: &Dio) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dio.content_fingerprint().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage identity for a deal's version row.
pub fn dio_id_for(deal_id: &str, version: u32) -> String {
    format!("{deal_id}:v{version}")
}

/// Seal a snapshot with its storage-assigned identity. Called exactly once
/// per row, under the per-deal lock, before insert.
pub(crate) fn seal(mut dio: Dio, version: u32, hash: String) -> Dio {
    dio.version = version;
    dio.dio_id = dio_id_for(&dio.deal_id, version);
    dio.content_hash = hash;
    dio.created_at = Utc::now();
    dio
}
