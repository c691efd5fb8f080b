//! In-memory DIO store.
//!
//! Backs tests and single-process deployments. The dashmap entry guard
//! serializes read-latest/compare/allocate/insert per deal, which is the
//! whole correctness story for monotonic versioning under concurrency.

use crate::core::Dio;
use crate::storage::{content_hash, seal, DioFilter, DioStore, SaveReceipt};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct InMemoryDioStore {
    deals: DashMap<String, Vec<Dio>>,
}

impl InMemoryDioStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DioStore for InMemoryDioStore {
    fn save_dio(&self, dio: Dio) -> anyhow::Result<SaveReceipt> {
        let hash = content_hash(&dio);
        // Entry guard holds the shard lock for this deal until insert
        // completes; concurrent savers for the same deal serialize here.
        let mut history = self.deals.entry(dio.deal_id.clone()).or_default();

        if let Some(latest) = history.last() {
            if latest.content_hash == hash {
                log::debug!(
                    "deal {}: content unchanged, returning v{} as duplicate",
                    dio.deal_id,
                    latest.version
                );
                return Ok(SaveReceipt {
                    dio_id: latest.dio_id.clone(),
                    version: latest.version,
                    created_at: latest.created_at,
                    is_duplicate: true,
                });
            }
        }

        let version = history.last().map(|d| d.version + 1).unwrap_or(1);
        let sealed = seal(dio, version, hash);
        let receipt = SaveReceipt {
            dio_id: sealed.dio_id.clone(),
            version: sealed.version,
            created_at: sealed.created_at,
            is_duplicate: false,
        };
        history.push(sealed);
        Ok(receipt)
    }

    fn latest_dio(&self, deal_id: &str) -> anyhow::Result<Option<Dio>> {
        Ok(self
            .deals
            .get(deal_id)
            .and_then(|history| history.last().cloned()))
    }

    fn dio_version(&self, deal_id: &str, version: u32) -> anyhow::Result<Option<Dio>> {
        Ok(self.deals.get(deal_id).and_then(|history| {
            history.iter().find(|dio| dio.version == version).cloned()
        }))
    }

    fn dio_history(&self, deal_id: &str) -> anyhow::Result<Vec<Dio>> {
        // Rows are appended with increasing versions, so insertion order is
        // ascending already.
        Ok(self
            .deals
            .get(deal_id)
            .map(|history| history.clone())
            .unwrap_or_default())
    }

    fn query_dios(&self, filter: &DioFilter) -> anyhow::Result<Vec<Dio>> {
        let mut matches: Vec<Dio> = self
            .deals
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|dio| filter.matches(dio))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        matches.sort_by(|a, b| (&a.deal_id, a.version).cmp(&(&b.deal_id, b.version)));
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn delete_dio(&self, dio_id: &str) -> anyhow::Result<bool> {
        for mut entry in self.deals.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|dio| dio.dio_id != dio_id);
            if entry.value().len() != before {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Dio;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn draft(deal_id: &str, overall_score: f64) -> Dio {
        Dio {
            deal_id: deal_id.into(),
            dio_id: String::new(),
            version: 0,
            created_at: Utc::now(),
            content_hash: String::new(),
            overall_score,
            coverage: 1.0,
            confidence: 0.8,
            analyzer_results: BTreeMap::new(),
            phase_inference_v1: None,
            fundability_assessment_v1: None,
            fundability_decision_v1: None,
        }
    }

    #[test]
    fn first_save_allocates_version_one() {
        let store = InMemoryDioStore::new();
        let receipt = store.save_dio(draft("deal-1", 70.0)).unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(receipt.dio_id, "deal-1:v1");
        assert!(!receipt.is_duplicate);
    }

    #[test]
    fn identical_content_is_a_duplicate_without_new_version() {
        let store = InMemoryDioStore::new();
        let first = store.save_dio(draft("deal-1", 70.0)).unwrap();
        let second = store.save_dio(draft("deal-1", 70.0)).unwrap();
        assert_eq!(first.version, second.version);
        assert!(second.is_duplicate);
        assert_eq!(store.dio_history("deal-1").unwrap().len(), 1);
    }

    #[test]
    fn changed_content_allocates_next_version() {
        let store = InMemoryDioStore::new();
        store.save_dio(draft("deal-1", 70.0)).unwrap();
        let receipt = store.save_dio(draft("deal-1", 71.0)).unwrap();
        assert_eq!(receipt.version, 2);
        assert!(!receipt.is_duplicate);
    }

    #[test]
    fn history_is_ascending() {
        let store = InMemoryDioStore::new();
        for score in [60.0, 61.0, 62.0] {
            store.save_dio(draft("deal-1", score)).unwrap();
        }
        let versions: Vec<u32> = store
            .dio_history("deal-1")
            .unwrap()
            .iter()
            .map(|d| d.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn deals_are_independent() {
        let store = InMemoryDioStore::new();
        store.save_dio(draft("deal-1", 70.0)).unwrap();
        let receipt = store.save_dio(draft("deal-2", 70.0)).unwrap();
        assert_eq!(receipt.version, 1);
    }

    #[test]
    fn concurrent_saves_never_share_a_version() {
        let store = Arc::new(InMemoryDioStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.save_dio(draft("deal-1", 50.0 + i as f64)).unwrap()
            }));
        }
        let mut versions: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().version)
            .collect();
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), 8, "every non-duplicate save got its own version");
    }

    #[test]
    fn delete_removes_one_row() {
        let store = InMemoryDioStore::new();
        store.save_dio(draft("deal-1", 70.0)).unwrap();
        store.save_dio(draft("deal-1", 71.0)).unwrap();
        assert!(store.delete_dio("deal-1:v1").unwrap());
        assert!(!store.delete_dio("deal-1:v1").unwrap());
        let history = store.dio_history("deal-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 2);
    }

    #[test]
    fn query_filters_by_score_and_deal() {
        let store = InMemoryDioStore::new();
        store.save_dio(draft("deal-1", 40.0)).unwrap();
        store.save_dio(draft("deal-1", 80.0)).unwrap();
        store.save_dio(draft("deal-2", 90.0)).unwrap();

        let filter = DioFilter {
            min_overall_score: Some(75.0),
            ..Default::default()
        };
        let matches = store.query_dios(&filter).unwrap();
        assert_eq!(matches.len(), 2);

        let filter = DioFilter {
            deal_id: Some("deal-1".into()),
            min_overall_score: Some(75.0),
            ..Default::default()
        };
        assert_eq!(store.query_dios(&filter).unwrap().len(), 1);
    }
}
