//! Version log (C3) and blob-link index (C4): per-docid version numbering, the
//! current-version pointer, revert, and history reads.

use crate::blob_store;
use crate::blob_store::BlobReader;
use crate::class_registry;
use crate::codec::value::ValueCodec;
use crate::config::ArchiveConfig;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::{ClassResolver, CurrentRow, HistoryRecord, ObjectRow, StateRow, VersionInput};
use crate::storage::engine::Engine;
use crate::txn::{LockTarget, Txn};
use chrono::Utc;

fn current_version<E: Engine>(txn: &mut Txn<E>, docid: i64) -> CResult<Option<i32>> {
    match txn.get(&keys::current(docid))? {
        Some(bytes) => Ok(Some(ValueCodec::new().decode::<CurrentRow>(&bytes)?.version_num)),
        None => Ok(None),
    }
}

fn max_version<E: Engine>(txn: &mut Txn<E>, docid: i64) -> CResult<i32> {
    let rows = txn.scan_prefix(&keys::state_prefix(docid))?;
    Ok(rows.len() as i32)
}

/// Appends a new version for `input.docid` and advances its current-version pointer.
/// See §4.3 for the numbered steps this follows.
pub fn archive_version<E: Engine>(
    txn: &mut Txn<E>,
    config: &ArchiveConfig,
    resolver: &dyn ClassResolver,
    input: VersionInput<'_>,
) -> CResult<i32> {
    txn.lock(LockTarget::Object(input.docid));
    let codec = ValueCodec::new();

    let object_key = keys::object(input.docid);
    if txn.get(&object_key)?.is_none() {
        let object = ObjectRow { docid: input.docid, created: input.created };
        txn.set(&object_key, codec.encode(&object)?);
    }

    let prior_version = max_version(txn, input.docid)?;
    let new_version = prior_version + 1;
    let derived_from_version = current_version(txn, input.docid)?;

    let class_id = class_registry::intern(txn, resolver, &input.class)?;

    let state = StateRow {
        docid: input.docid,
        version_num: new_version,
        derived_from_version,
        class_id,
        path: input.path,
        archive_time: Utc::now(),
        modified: input.modified,
        user: input.user,
        title: input.title,
        description: input.description,
        attrs: input.attrs,
        comment: input.comment,
    };
    txn.set(&keys::state(input.docid, new_version), codec.encode(&state)?);

    for attachment in input.blobs {
        if attachment.name.is_empty() {
            return Err(Error::InvalidInput("blob attachment name must be non-empty".into()));
        }
        let blob_id = blob_store::put(txn, config, attachment.source)?;
        txn.set(&keys::blob_link(input.docid, new_version, &attachment.name), codec.encode(&blob_id)?);
        blob_store::link_added(txn, blob_id, input.docid, new_version, &attachment.name);
    }

    txn.set(&keys::current(input.docid), codec.encode(&CurrentRow { version_num: new_version })?);
    Ok(new_version)
}

/// Moves the current-version pointer back to an existing version without appending a
/// new one.
pub fn revert<E: Engine>(txn: &mut Txn<E>, docid: i64, version_num: i32) -> CResult<()> {
    txn.lock(LockTarget::Object(docid));
    if txn.get(&keys::state(docid, version_num))?.is_none() {
        return Err(Error::NotFound(format!("version {version_num} of docid {docid}")));
    }
    let codec = ValueCodec::new();
    txn.set(&keys::current(docid), codec.encode(&CurrentRow { version_num })?);
    Ok(())
}

fn to_history_record<E: Engine>(
    txn: &mut Txn<E>,
    state: StateRow,
    current: i32,
) -> CResult<HistoryRecord> {
    let class = class_registry::get(txn, state.class_id)?;
    let prefix = keys::blob_link_prefix(state.docid, state.version_num);
    let mut blob_names = Vec::new();
    for (key, _) in txn.scan_prefix(&prefix)? {
        blob_names.push(keys::decode_blob_link_name(&key, state.docid, state.version_num)?);
    }
    blob_names.sort();

    Ok(HistoryRecord {
        version_num: state.version_num,
        derived_from_version: state.derived_from_version,
        class,
        path: state.path,
        archive_time: state.archive_time,
        modified: state.modified,
        user: state.user,
        title: state.title,
        description: state.description,
        attrs: state.attrs,
        comment: state.comment,
        blob_names,
        current_version: current,
    })
}

/// All versions of `docid`, newest first. `only_current` restricts the result to the
/// single version the current-version pointer addresses.
pub fn history<E: Engine>(txn: &mut Txn<E>, docid: i64, only_current: bool) -> CResult<Vec<HistoryRecord>> {
    let current = current_version(txn, docid)?.ok_or_else(|| Error::NotFound(format!("docid {docid}")))?;
    let codec = ValueCodec::new();
    let mut states: Vec<StateRow> = txn
        .scan_prefix(&keys::state_prefix(docid))?
        .into_iter()
        .map(|(_, v)| codec.decode(&v))
        .collect::<CResult<Vec<_>>>()?;
    states.sort_by(|a, b| b.version_num.cmp(&a.version_num));

    if only_current {
        states.retain(|s| s.version_num == current);
    }

    states.into_iter().map(|s| to_history_record(txn, s, current)).collect()
}

/// Opens the blob named `name` on `(docid, version_num)` as a seekable read-only
/// stream, realizing the `blobs: mapping<name, read-stream>` field of `HistoryRecord`
/// (§6) as an explicit lookup rather than a pre-populated map of open handles, so a
/// caller never pays to open blobs it doesn't read.
pub fn open_blob<E: Engine>(
    txn: &mut Txn<E>,
    config: &ArchiveConfig,
    docid: i64,
    version_num: i32,
    name: &str,
) -> CResult<BlobReader> {
    let bytes = txn
        .get(&keys::blob_link(docid, version_num, name))?
        .ok_or_else(|| Error::NotFound(format!("blob link {name:?} on docid {docid} version {version_num}")))?;
    let blob_id: i32 = ValueCodec::new().decode(&bytes)?;
    blob_store::open(txn, config, blob_id)
}

/// One version's record, failing with `NotFound` if it does not exist.
pub fn get_version<E: Engine>(txn: &mut Txn<E>, docid: i64, version_num: i32) -> CResult<HistoryRecord> {
    let current = current_version(txn, docid)?.ok_or_else(|| Error::NotFound(format!("docid {docid}")))?;
    let bytes = txn
        .get(&keys::state(docid, version_num))?
        .ok_or_else(|| Error::NotFound(format!("version {version_num} of docid {docid}")))?;
    let state: StateRow = ValueCodec::new().decode(&bytes)?;
    to_history_record(txn, state, current)
}
