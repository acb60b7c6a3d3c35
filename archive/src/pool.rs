//! Process-wide pool of opened durable archives, keyed by storage path (§5). Mirrors
//! the original Python `_sessions` module dict: lazily initialized on first use, with
//! an explicit `forget_pools()` teardown entry point rather than any automatic expiry.

use crate::config::ArchiveConfig;
use crate::error::CResult;
use crate::storage::log_cask::FileEngine;
use crate::txn::Store;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

static POOL: OnceLock<Mutex<HashMap<PathBuf, Store<FileEngine>>>> = OnceLock::new();

fn pool() -> &'static Mutex<HashMap<PathBuf, Store<FileEngine>>> {
    POOL.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the pooled `Store` for `path`, opening and inserting one on first use.
pub fn open_pooled(path: PathBuf, config: &ArchiveConfig) -> CResult<Store<FileEngine>> {
    let mut guard = pool().lock().expect("archive pool poisoned");
    if let Some(store) = guard.get(&path) {
        return Ok(store.clone());
    }
    let engine = FileEngine::new_compact(path.clone(), config.compact_garbage_ratio)?;
    let store = Store::new(engine);
    guard.insert(path, store.clone());
    Ok(store)
}

/// Drops every pooled archive handle. Intended for test teardown and process shutdown;
/// in-flight transactions against a dropped handle are unaffected (they hold their own
/// `Arc` references).
pub fn forget_pools() {
    pool().lock().expect("archive pool poisoned").clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopening_the_same_path_returns_the_same_pooled_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pooled");
        let config = ArchiveConfig::default();

        let a = open_pooled(path.clone(), &config).unwrap();
        let b = open_pooled(path.clone(), &config).unwrap();
        {
            let mut txn = a.begin();
            txn.set(b"k", vec![1]);
            txn.commit().unwrap();
        }
        let mut txn = b.begin();
        assert_eq!(txn.get(b"k").unwrap(), Some(vec![1]));

        forget_pools();
    }
}
