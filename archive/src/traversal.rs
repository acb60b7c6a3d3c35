//! Container traversal (C6): reading a container's live contents and deletion log,
//! breadth-first hierarchy walks over the container DAG, and the "which containers
//! have deleted descendants" search.

use crate::codec::keycode::decode_i64;
use crate::codec::value::ValueCodec;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::{ContainerEntry, ContainerItemRow, ContainerRecord, ContainerRow, DeletedItemRow, DeletedItemView};
use crate::storage::engine::Engine;
use crate::txn::Txn;
use std::collections::{HashMap, HashSet};

fn container_ids_holding<E: Engine>(txn: &mut Txn<E>, docid: i64) -> CResult<Vec<i64>> {
    let prefix = keys::container_membership_prefix(docid);
    let mut ids = Vec::new();
    for (key, _) in txn.scan_prefix(&prefix)? {
        ids.push(keys::decode_container_membership_suffix(&key, docid)?);
    }
    ids.sort();
    Ok(ids)
}

/// The live entries and deletion log of one container.
pub fn container_contents<E: Engine>(txn: &mut Txn<E>, container_id: i64) -> CResult<ContainerRecord> {
    let codec = ValueCodec::new();
    let container_bytes = txn
        .get(&keys::container(container_id))?
        .ok_or_else(|| Error::NotFound(format!("container {container_id}")))?;
    let container: ContainerRow = codec.decode(&container_bytes)?;

    let item_prefix = keys::container_item_prefix(container_id);
    let mut entries = Vec::new();
    for (key, value) in txn.scan_prefix(&item_prefix)? {
        let (namespace, name) = keys::decode_container_item_suffix(&key, container_id)?;
        let docid = codec.decode::<ContainerItemRow>(&value)?.docid;
        entries.push(ContainerEntry { namespace, name, docid });
    }

    let deleted_prefix = keys::deleted_item_prefix(container_id);
    let mut deleted = Vec::new();
    for (key, value) in txn.scan_prefix(&deleted_prefix)? {
        let mut rest: &[u8] = &key[deleted_prefix.len()..];
        let docid = decode_i64(&mut rest)?;
        let row: DeletedItemRow = codec.decode(&value)?;
        let new_container_ids = container_ids_holding(txn, docid)?;
        let moved = !new_container_ids.is_empty();
        deleted.push(DeletedItemView {
            namespace: row.namespace,
            name: row.name,
            docid,
            deleted_time: row.deleted_time,
            deleted_by: row.deleted_by,
            new_container_ids,
            moved,
        });
    }
    deleted.sort_by(|a, b| {
        b.deleted_time.cmp(&a.deleted_time).then(a.namespace.cmp(&b.namespace)).then(a.name.cmp(&b.name))
    });

    Ok(ContainerRecord { container_id, path: container.path, entries, deleted })
}

/// The subset of `ids` that currently exist as Containers.
pub fn filter_container_ids<E: Engine>(txn: &mut Txn<E>, ids: &[i64]) -> CResult<Vec<i64>> {
    let mut out = Vec::new();
    for &id in ids {
        if txn.get(&keys::container(id))?.is_some() {
            out.push(id);
        }
    }
    Ok(out)
}

/// Cycle-defense and depth-bound bookkeeping for a breadth-first hierarchy walk,
/// factored out as a plain helper so it can be unit tested without a `Txn`.
pub struct BfsState {
    pub seen: HashSet<i64>,
    pub frontier: Vec<i64>,
}

impl BfsState {
    pub fn new(top: i64) -> Self {
        let mut seen = HashSet::new();
        seen.insert(top);
        Self { seen, frontier: vec![top] }
    }

    /// Computes the next frontier from this level's live children and deleted docids
    /// (split into not-moved and moved), applying `seen` to drop anything already
    /// visited. Mutates `self.frontier` to the result and returns it.
    pub fn advance(
        &mut self,
        live_children: &[i64],
        deleted_not_moved: &[i64],
        deleted_moved: &[i64],
        follow_deleted: bool,
        follow_moved: bool,
    ) -> &[i64] {
        let mut next = Vec::new();
        let mut candidates: Vec<i64> = live_children.to_vec();
        if follow_deleted {
            candidates.extend_from_slice(deleted_not_moved);
        }
        if follow_moved {
            candidates.extend_from_slice(deleted_moved);
        }
        for id in candidates {
            if self.seen.insert(id) {
                next.push(id);
            }
        }
        self.frontier = next;
        &self.frontier
    }
}

/// Breadth-first walk over the container DAG starting at `top_container_id`, assuming
/// container_ids double as docids so a live/deleted child entry may itself be a
/// container. Each container_id is yielded at most once (P9); non-container children
/// are silently treated as leaves.
pub fn iter_hierarchy<E: Engine>(
    txn: &mut Txn<E>,
    top_container_id: i64,
    max_depth: Option<u32>,
    follow_deleted: bool,
    follow_moved: bool,
) -> CResult<Vec<ContainerRecord>> {
    let mut state = BfsState::new(top_container_id);
    let mut out = Vec::new();
    let mut depth: u32 = 0;

    loop {
        if state.frontier.is_empty() {
            break;
        }
        let mut live_children = Vec::new();
        let mut deleted_not_moved = Vec::new();
        let mut deleted_moved = Vec::new();

        for &container_id in state.frontier.clone().iter() {
            if txn.get(&keys::container(container_id))?.is_none() {
                continue;
            }
            let record = container_contents(txn, container_id)?;
            for entry in &record.entries {
                live_children.push(entry.docid);
            }
            for d in &record.deleted {
                if d.moved {
                    deleted_moved.push(d.docid);
                } else {
                    deleted_not_moved.push(d.docid);
                }
            }
            out.push(record);
        }

        depth += 1;
        if let Some(max) = max_depth {
            if depth > max {
                break;
            }
        }
        state.advance(&live_children, &deleted_not_moved, &deleted_moved, follow_deleted, follow_moved);
    }

    Ok(out)
}

/// For each input container_id, whether any descendant within `max_depth` has a
/// DeletedItem that is truly deleted (its docid holds no ContainerItem anywhere), not
/// merely moved. Walks all roots level-synchronized, maintaining a reverse map from
/// each visited container back to the roots that can still reach it, so one batched
/// query per level suffices and a root stops expanding as soon as it is resolved.
pub fn which_contain_deleted<E: Engine>(
    txn: &mut Txn<E>,
    ids: &[i64],
    max_depth: Option<u32>,
) -> CResult<Vec<i64>> {
    let mut resolved: HashSet<i64> = HashSet::new();
    let mut seen_per_root: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut reverse: HashMap<i64, HashSet<i64>> = HashMap::new();
    for &id in ids {
        seen_per_root.entry(id).or_default().insert(id);
        reverse.entry(id).or_default().insert(id);
    }

    let mut frontier: HashSet<i64> = ids.iter().copied().collect();
    let mut depth = 0u32;

    while !frontier.is_empty() {
        let mut next_frontier: HashSet<i64> = HashSet::new();

        for &container_id in &frontier {
            let ancestors: Vec<i64> = reverse
                .get(&container_id)
                .into_iter()
                .flatten()
                .copied()
                .filter(|a| !resolved.contains(a))
                .collect();
            if ancestors.is_empty() {
                continue;
            }
            if txn.get(&keys::container(container_id))?.is_none() {
                continue;
            }
            let record = container_contents(txn, container_id)?;

            if record.deleted.iter().any(|d| !d.moved) {
                for &root in &ancestors {
                    resolved.insert(root);
                }
                continue;
            }

            for entry in &record.entries {
                for &root in &ancestors {
                    let seen = seen_per_root.entry(root).or_default();
                    if seen.insert(entry.docid) {
                        reverse.entry(entry.docid).or_default().insert(root);
                        next_frontier.insert(entry.docid);
                    }
                }
            }
        }

        depth += 1;
        if let Some(max) = max_depth {
            if depth > max {
                break;
            }
        }
        frontier = next_frontier;
    }

    let mut out: Vec<i64> = resolved.into_iter().collect();
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfs_state_visits_each_id_once_even_with_cycles() {
        let mut state = BfsState::new(1);
        state.advance(&[2, 3], &[], &[], false, false);
        assert_eq!(state.frontier, vec![2, 3]);
        // 1 reappears as a "child" of 2 (a cycle back to the root) and must not recur.
        state.advance(&[1, 4], &[], &[], false, false);
        assert_eq!(state.frontier, vec![4]);
    }

    #[test]
    fn bfs_state_follow_deleted_and_moved_are_independent() {
        let mut state = BfsState::new(1);
        let next = state.advance(&[2], &[3], &[4], false, false).to_vec();
        assert_eq!(next, vec![2]);

        let mut state = BfsState::new(1);
        let next = state.advance(&[2], &[3], &[4], true, false).to_vec();
        assert_eq!(next, vec![2, 3]);

        let mut state = BfsState::new(1);
        let next = state.advance(&[2], &[3], &[4], true, true).to_vec();
        assert_eq!(next, vec![2, 3, 4]);
    }
}
