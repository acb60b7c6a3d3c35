//! The top-level facade (§2): wires C1-C7 together atop a single `Txn<E>` supplied by
//! the caller for every operation. `Archive<E>` itself is stateless with respect to any
//! one call -- it only holds the shared `Store<E>` (for `begin()`), the configuration,
//! and the application's class resolver.

use crate::blob_store::BlobReader;
use crate::class_registry;
use crate::config::ArchiveConfig;
use crate::container_differ;
use crate::error::CResult;
use crate::model::{ClassResolver, ClassRow, ContainerDiff, ContainerInput, ContainerRecord, HistoryRecord, VersionInput};
use crate::shredder;
use crate::storage::engine::Engine;
use crate::traversal;
use crate::txn::{Store, Txn};
use crate::version_log;

pub struct Archive<E: Engine> {
    store: Store<E>,
    config: ArchiveConfig,
    resolver: Box<dyn ClassResolver>,
}

impl<E: Engine> Archive<E> {
    pub fn new(engine: E, config: ArchiveConfig, resolver: Box<dyn ClassResolver>) -> Self {
        Self { store: Store::new(engine), config, resolver }
    }

    /// Starts a new ambient transaction against this archive's engine. The caller
    /// passes `&mut txn` into exactly one top-level operation, then calls
    /// `txn.commit()` or drops it to roll back.
    pub fn begin(&self) -> Txn<E> {
        self.store.begin()
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn archive_version(&self, txn: &mut Txn<E>, input: VersionInput<'_>) -> CResult<i32> {
        version_log::archive_version(txn, &self.config, self.resolver.as_ref(), input)
    }

    pub fn revert(&self, txn: &mut Txn<E>, docid: i64, version_num: i32) -> CResult<()> {
        version_log::revert(txn, docid, version_num)
    }

    pub fn history(&self, txn: &mut Txn<E>, docid: i64, only_current: bool) -> CResult<Vec<HistoryRecord>> {
        version_log::history(txn, docid, only_current)
    }

    pub fn get_version(&self, txn: &mut Txn<E>, docid: i64, version_num: i32) -> CResult<HistoryRecord> {
        version_log::get_version(txn, docid, version_num)
    }

    /// Opens one of the named blobs listed in a `HistoryRecord::blob_names` for reading.
    pub fn open_blob(
        &self,
        txn: &mut Txn<E>,
        docid: i64,
        version_num: i32,
        name: &str,
    ) -> CResult<BlobReader> {
        version_log::open_blob(txn, &self.config, docid, version_num, name)
    }

    pub fn class(&self, txn: &mut Txn<E>, class_id: i32) -> CResult<ClassRow> {
        class_registry::get(txn, class_id)
    }

    pub fn archive_container(&self, txn: &mut Txn<E>, input: ContainerInput, user: &str) -> CResult<ContainerDiff> {
        container_differ::archive_container(txn, input, user)
    }

    pub fn container_contents(&self, txn: &mut Txn<E>, container_id: i64) -> CResult<ContainerRecord> {
        traversal::container_contents(txn, container_id)
    }

    pub fn iter_hierarchy(
        &self,
        txn: &mut Txn<E>,
        top_container_id: i64,
        max_depth: Option<u32>,
        follow_deleted: bool,
        follow_moved: bool,
    ) -> CResult<Vec<ContainerRecord>> {
        traversal::iter_hierarchy(txn, top_container_id, max_depth, follow_deleted, follow_moved)
    }

    pub fn filter_container_ids(&self, txn: &mut Txn<E>, ids: &[i64]) -> CResult<Vec<i64>> {
        traversal::filter_container_ids(txn, ids)
    }

    pub fn which_contain_deleted(&self, txn: &mut Txn<E>, ids: &[i64], max_depth: Option<u32>) -> CResult<Vec<i64>> {
        traversal::which_contain_deleted(txn, ids, max_depth)
    }

    pub fn shred(&self, txn: &mut Txn<E>, docids: &[i64], container_ids: &[i64]) -> CResult<()> {
        shredder::shred(txn, docids, container_ids)
    }
}
