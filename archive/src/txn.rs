//! The ambient transaction (§4.0, §5): a local write-buffer overlay over a shared
//! engine, plus advisory per-row locking. Every public archive operation receives a
//! `&mut Txn<E>` and never opens or commits it -- the caller does that.

use crate::codec::keycode::{decode_i64, encode_i64};
use crate::error::CResult;
use crate::storage::engine::{prefix_range, Engine};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};

/// A named row lock target. `archive_version`/`revert` lock `Object(docid)`;
/// `archive_container` locks `Container(container_id)` -- the Rust stand-in for a
/// `SELECT ... FOR UPDATE` taken before reading `max(version_num)` or diffing a
/// container's contents (§5).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockTarget {
    Object(i64),
    Container(i64),
}

impl LockTarget {
    fn as_bytes(&self) -> Vec<u8> {
        match self {
            LockTarget::Object(id) => {
                let mut out = vec![0u8];
                encode_i64(*id, &mut out);
                out
            }
            LockTarget::Container(id) => {
                let mut out = vec![1u8];
                encode_i64(*id, &mut out);
                out
            }
        }
    }
}

/// A process-wide table of held row locks. One `LockTable` is shared by every `Txn`
/// opened against the same engine, via `Store::begin`.
pub struct LockTable {
    held: Mutex<HashSet<Vec<u8>>>,
    cond: Condvar,
}

impl LockTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { held: Mutex::new(HashSet::new()), cond: Condvar::new() })
    }

    /// Blocks until `target` is free, then marks it held and returns a guard that
    /// releases it on drop.
    fn acquire(self: &Arc<Self>, target: LockTarget) -> RowLock {
        let key = target.as_bytes();
        let mut held = self.held.lock().expect("lock table poisoned");
        while held.contains(&key) {
            held = self.cond.wait(held).expect("lock table poisoned");
        }
        held.insert(key.clone());
        drop(held);
        RowLock { table: self.clone(), key: Some(key) }
    }
}

/// RAII guard for a held row lock. Released, and other waiters woken, on drop -- which
/// is also what happens when a `Txn` is dropped without a `commit()`, so a rolled-back
/// transaction never leaves a lock stuck.
pub struct RowLock {
    table: Arc<LockTable>,
    key: Option<Vec<u8>>,
}

impl Drop for RowLock {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut held = self.table.held.lock().expect("lock table poisoned");
            held.remove(&key);
            drop(held);
            self.table.cond.notify_all();
        }
    }
}

/// A shared, opened storage engine plus its lock table. `Archive::open` constructs one
/// of these and hands out `Txn`s from it; the process-wide pool (§5) keys a registry of
/// these by storage path.
pub struct Store<E: Engine> {
    engine: Arc<Mutex<E>>,
    locks: Arc<LockTable>,
}

impl<E: Engine> Store<E> {
    pub fn new(engine: E) -> Self {
        Self { engine: Arc::new(Mutex::new(engine)), locks: LockTable::new() }
    }

    pub fn begin(&self) -> Txn<E> {
        Txn { engine: self.engine.clone(), locks: self.locks.clone(), write_buffer: BTreeMap::new(), held_locks: Vec::new() }
    }
}

impl<E: Engine> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone(), locks: self.locks.clone() }
    }
}

/// The ambient transaction. Reads consult the local write-buffer first (read-your-own-
/// writes), then fall through to the shared engine. Nothing reaches the engine until
/// `commit()`; dropping a `Txn` without committing discards the buffer and releases any
/// held locks, which is the archive's rollback.
pub struct Txn<E: Engine> {
    engine: Arc<Mutex<E>>,
    locks: Arc<LockTable>,
    write_buffer: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    held_locks: Vec<RowLock>,
}

impl<E: Engine> Txn<E> {
    pub fn get(&mut self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.write_buffer.get(key) {
            return Ok(buffered.clone());
        }
        self.engine.lock().expect("engine poisoned").get(key)
    }

    pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.write_buffer.insert(key.to_vec(), Some(value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.write_buffer.insert(key.to_vec(), None);
    }

    /// All live (key, value) pairs under `prefix`, merging the local write-buffer over
    /// the engine's committed contents, in key order.
    pub fn scan_prefix(&mut self, prefix: &[u8]) -> CResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        {
            let mut engine = self.engine.lock().expect("engine poisoned");
            for item in engine.scan_prefix(prefix) {
                let (key, value) = item?;
                merged.insert(key, Some(value));
            }
        }
        let (start, end) = prefix_range(prefix);
        for (key, value) in self.write_buffer.range((start, end)) {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
    }

    /// Blocks until `target` is free, then holds it until this `Txn` is dropped.
    pub fn lock(&mut self, target: LockTarget) {
        let guard = self.locks.acquire(target);
        self.held_locks.push(guard);
    }

    /// Allocates the next value of a monotonic counter stored at `counter_key`,
    /// starting at 1. Used for blob ids and class ids (`keys::next_blob_id()`,
    /// `keys::next_class_id()`).
    pub fn next_id(&mut self, counter_key: &[u8]) -> CResult<i64> {
        let current = match self.get(counter_key)? {
            Some(bytes) => {
                let mut slice: &[u8] = &bytes;
                decode_i64(&mut slice)?
            }
            None => 0,
        };
        let next = current + 1;
        let mut encoded = Vec::new();
        encode_i64(next, &mut encoded);
        self.set(counter_key, encoded);
        Ok(next)
    }

    /// Applies the write-buffer to the engine in key order and flushes. Held locks are
    /// released only after the flush completes (dropped along with `self` at the end of
    /// this call), matching §5: writers waiting on the same row see a fully committed
    /// state once they acquire the lock.
    pub fn commit(mut self) -> CResult<()> {
        let mut engine = self.engine.lock().expect("engine poisoned");
        for (key, value) in std::mem::take(&mut self.write_buffer) {
            match value {
                Some(v) => engine.set(&key, v)?,
                None => engine.delete(&key)?,
            }
        }
        engine.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryEngine;

    #[test]
    fn reads_own_writes_before_commit() {
        let store = Store::new(MemoryEngine::new());
        let mut txn = store.begin();
        assert_eq!(txn.get(b"a").unwrap(), None);
        txn.set(b"a", vec![1]);
        assert_eq!(txn.get(b"a").unwrap(), Some(vec![1]));
        txn.commit().unwrap();

        let mut txn2 = store.begin();
        assert_eq!(txn2.get(b"a").unwrap(), Some(vec![1]));
    }

    #[test]
    fn drop_without_commit_discards_writes() {
        let store = Store::new(MemoryEngine::new());
        let mut txn = store.begin();
        txn.set(b"a", vec![1]);
        drop(txn);

        let mut txn2 = store.begin();
        assert_eq!(txn2.get(b"a").unwrap(), None);
    }

    #[test]
    fn next_id_is_monotonic_and_starts_at_one() {
        let store = Store::new(MemoryEngine::new());
        let mut txn = store.begin();
        assert_eq!(txn.next_id(b"ctr").unwrap(), 1);
        assert_eq!(txn.next_id(b"ctr").unwrap(), 2);
        txn.commit().unwrap();

        let mut txn2 = store.begin();
        assert_eq!(txn2.next_id(b"ctr").unwrap(), 3);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let store = Store::new(MemoryEngine::new());
        let mut txn = store.begin();
        txn.lock(LockTarget::Object(1));
        drop(txn);

        // A second txn can acquire the same lock without blocking forever.
        let mut txn2 = store.begin();
        txn2.lock(LockTarget::Object(1));
    }
}
