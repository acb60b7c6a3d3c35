//! Container differ (C5): reconciles a freshly supplied `{namespace, name} -> docid`
//! mapping against what is currently recorded, emitting add/remove/rename/move/
//! undelete events per §4.4's six steps and tie-break rules.

use crate::codec::value::ValueCodec;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::{ContainerDiff, ContainerInput, ContainerItemRow, ContainerRow, DeletedItemRow};
use crate::storage::engine::Engine;
use crate::txn::{LockTarget, Txn};
use chrono::Utc;
use std::collections::{HashMap, HashSet};

/// Applies `input` as the new complete contents of `input.container_id`, diffing it
/// against the existing ContainerItems and DeletedItems for that container. Calling
/// this twice with the same input is a no-op in effect.
pub fn archive_container<E: Engine>(txn: &mut Txn<E>, input: ContainerInput, user: &str) -> CResult<ContainerDiff> {
    for entry in &input.entries {
        if entry.name.is_empty() {
            return Err(Error::InvalidInput("container item name must be non-empty".into()));
        }
    }

    txn.lock(LockTarget::Container(input.container_id));
    let codec = ValueCodec::new();

    // Step 1: upsert the Container row.
    let container_key = keys::container(input.container_id);
    let existing_path = match txn.get(&container_key)? {
        Some(bytes) => Some(codec.decode::<ContainerRow>(&bytes)?.path),
        None => None,
    };
    if existing_path.as_deref() != Some(input.path.as_str()) {
        let row = ContainerRow { container_id: input.container_id, path: input.path.clone() };
        txn.set(&container_key, codec.encode(&row)?);
    }

    // Step 2: build `old` and `old_by_docid` from the existing ContainerItems.
    let item_prefix = keys::container_item_prefix(input.container_id);
    let mut old: HashMap<(String, String), i64> = HashMap::new();
    for (key, value) in txn.scan_prefix(&item_prefix)? {
        let (namespace, name) = keys::decode_container_item_suffix(&key, input.container_id)?;
        let docid = codec.decode::<ContainerItemRow>(&value)?.docid;
        old.insert((namespace, name), docid);
    }
    let old_by_docid: HashMap<i64, (String, String)> =
        old.iter().map(|((ns, name), docid)| (*docid, (ns.clone(), name.clone()))).collect();

    // Step 3: build `new` from the supplied entries.
    let mut new: HashMap<(String, String), i64> = HashMap::new();
    for entry in &input.entries {
        new.insert((entry.namespace.clone(), entry.name.clone()), entry.docid);
    }

    // Step 4: set differences on (namespace, name).
    let mut diff = ContainerDiff::default();
    for (key, docid) in &new {
        match old.get(key) {
            None => {
                txn.set(
                    &keys::container_item(input.container_id, &key.0, &key.1),
                    codec.encode(&ContainerItemRow { docid: *docid })?,
                );
                diff.added.push(crate::model::ContainerEntry {
                    namespace: key.0.clone(),
                    name: key.1.clone(),
                    docid: *docid,
                });
            }
            Some(old_docid) if old_docid != docid => {
                txn.set(
                    &keys::container_item(input.container_id, &key.0, &key.1),
                    codec.encode(&ContainerItemRow { docid: *docid })?,
                );
            }
            Some(_) => {}
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            txn.delete(&keys::container_item(input.container_id, &key.0, &key.1));
        }
    }

    // Maintain the cross-container membership index: a docid is a member of this
    // container iff it appears somewhere in `new`, regardless of which slot.
    let old_docids: HashSet<i64> = old.values().copied().collect();
    let new_docids: HashSet<i64> = new.values().copied().collect();
    for docid in old_docids.difference(&new_docids) {
        txn.delete(&keys::container_membership(*docid, input.container_id));
    }
    for docid in new_docids.difference(&old_docids) {
        txn.set(&keys::container_membership(*docid, input.container_id), vec![]);
    }

    // Step 5: undelete -- any DeletedItem whose docid is present in the new set of
    // docids no longer belongs in the deletion log.
    let deleted_prefix = keys::deleted_item_prefix(input.container_id);
    let mut existing_deleted: Vec<i64> = Vec::new();
    for (key, _) in txn.scan_prefix(&deleted_prefix)? {
        let mut rest: &[u8] = &key[deleted_prefix.len()..];
        existing_deleted.push(crate::codec::keycode::decode_i64(&mut rest)?);
    }
    for docid in &existing_deleted {
        if new_docids.contains(docid) {
            txn.delete(&keys::deleted_item(input.container_id, *docid));
            diff.undeleted.push(*docid);
        }
    }

    // Step 6: a docid that left the container entirely (not just renamed/rebound)
    // gets a DeletedItem under the (namespace, name) it last lived at.
    let now = Utc::now();
    for (docid, (namespace, name)) in &old_by_docid {
        if !new_docids.contains(docid) {
            txn.set(
                &keys::deleted_item(input.container_id, *docid),
                codec.encode(&DeletedItemRow {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    deleted_time: now,
                    deleted_by: user.to_string(),
                })?,
            );
            diff.deleted.push(*docid);
        }
    }

    Ok(diff)
}
