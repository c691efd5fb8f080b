//! File-backed DIO store.
//!
//! One JSON history file per deal under a store directory. Writes go
//! through a temp file followed by an atomic rename so a crashed process
//! never leaves a half-written history, and a per-deal mutex serializes the
//! read/compare/allocate/append sequence.

use crate::core::Dio;
use crate::storage::{content_hash, seal, DioFilter, DioStore, SaveReceipt};
use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct FileDioStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileDioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create store directory {}", dir.display()))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, deal_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(deal_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn history_path(&self, deal_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(deal_id)))
    }

    fn read_history(&self, path: &Path) -> Result<Vec<Dio>> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("corrupt history file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn write_history(&self, path: &Path, history: &[Dio]) -> Result<()> {
        let temp = temp_path(path);
        let contents = serde_json::to_string_pretty(history)?;
        fs::write(&temp, contents)
            .with_context(|| format!("failed to write {}", temp.display()))?;
        fs::rename(&temp, path)
            .with_context(|| format!("failed to move {} into place", temp.display()))?;
        Ok(())
    }

    fn deal_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl DioStore for FileDioStore {
    fn save_dio(&self, dio: Dio) -> Result<SaveReceipt> {
        let hash = content_hash(&dio);
        let lock = self.lock_for(&dio.deal_id);
        let _guard = lock.lock();

        let path = self.history_path(&dio.deal_id);
        let mut history = self.read_history(&path)?;

        if let Some(latest) = history.last() {
            if latest.content_hash == hash {
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
        self.write_history(&path, &history)?;
        Ok(receipt)
    }

    fn latest_dio(&self, deal_id: &str) -> Result<Option<Dio>> {
        let history = self.read_history(&self.history_path(deal_id))?;
        Ok(history.into_iter().last())
    }

    fn dio_version(&self, deal_id: &str, version: u32) -> Result<Option<Dio>> {
        let history = self.read_history(&self.history_path(deal_id))?;
        Ok(history.into_iter().find(|dio| dio.version == version))
    }

    fn dio_history(&self, deal_id: &str) -> Result<Vec<Dio>> {
        self.read_history(&self.history_path(deal_id))
    }

    fn query_dios(&self, filter: &DioFilter) -> Result<Vec<Dio>> {
        let mut matches = Vec::new();
        for path in self.deal_files()? {
            let history = self.read_history(&path)?;
            matches.extend(history.into_iter().filter(|dio| filter.matches(dio)));
        }
        matches.sort_by(|a, b| (&a.deal_id, a.version).cmp(&(&b.deal_id, b.version)));
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn delete_dio(&self, dio_id: &str) -> Result<bool> {
        let Some(deal_id) = dio_id.rsplit_once(":v").map(|(deal, _)| deal) else {
            return Ok(false);
        };
        let lock = self.lock_for(deal_id);
        let _guard = lock.lock();

        let path = self.history_path(deal_id);
        let mut history = self.read_history(&path)?;
        let before = history.len();
        history.retain(|dio| dio.dio_id != dio_id);
        if history.len() == before {
            return Ok(false);
        }
        self.write_history(&path, &history)?;
        Ok(true)
    }
}

/// Collision-safe temp path next to the target so the rename stays on one
/// filesystem.
fn temp_path(target: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_extension(format!("tmp.{}.{n}", std::process::id()))
}

/// Keep deal ids filesystem-safe without losing uniqueness for the usual
/// id alphabet.
fn sanitize(deal_id: &str) -> String {
    deal_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

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
    fn save_and_reload_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileDioStore::new(dir.path()).unwrap();
            store.save_dio(draft("deal-1", 70.0)).unwrap();
            store.save_dio(draft("deal-1", 71.0)).unwrap();
        }
        let fresh = FileDioStore::new(dir.path()).unwrap();
        let history = fresh.dio_history("deal-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
        assert_eq!(fresh.latest_dio("deal-1").unwrap().unwrap().version, 2);
    }

    #[test]
    fn duplicate_detection_survives_reload() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileDioStore::new(dir.path()).unwrap();
            store.save_dio(draft("deal-1", 70.0)).unwrap();
        }
        let fresh = FileDioStore::new(dir.path()).unwrap();
        let receipt = fresh.save_dio(draft("deal-1", 70.0)).unwrap();
        assert!(receipt.is_duplicate);
        assert_eq!(receipt.version, 1);
    }

    #[test]
    fn delete_rewrites_history_without_the_row() {
        let dir = TempDir::new().unwrap();
        let store = FileDioStore::new(dir.path()).unwrap();
        store.save_dio(draft("deal-1", 70.0)).unwrap();
        store.save_dio(draft("deal-1", 71.0)).unwrap();
        assert!(store.delete_dio("deal-1:v1").unwrap());
        let history = store.dio_history("deal-1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 2);
    }

    #[test]
    fn odd_deal_ids_get_safe_filenames() {
        let dir = TempDir::new().unwrap();
        let store = FileDioStore::new(dir.path()).unwrap();
        let receipt = store.save_dio(draft("acme/series-b 2026", 55.0)).unwrap();
        assert_eq!(receipt.version, 1);
        assert_eq!(
            store.latest_dio("acme/series-b 2026").unwrap().unwrap().deal_id,
            "acme/series-b 2026"
        );
    }
}
