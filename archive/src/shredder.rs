//! Shredder (C7): atomic, permanent deletion of documents and containers, cascading to
//! orphaned blobs (§4.6).

use crate::blob_store;
use crate::codec::value::ValueCodec;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::ContainerItemRow;
use crate::storage::engine::Engine;
use crate::txn::Txn;
use std::collections::HashSet;

/// Permanently deletes `docids` and `container_ids`. If any `container_id` would be
/// left holding a live item not also in `docids`, fails with `ContainerNotEmpty` and
/// leaves the transaction's write-buffer untouched (the check runs to completion for
/// every container before any write is issued).
pub fn shred<E: Engine>(txn: &mut Txn<E>, docids: &[i64], container_ids: &[i64]) -> CResult<()> {
    let codec = ValueCodec::new();
    let docid_set: HashSet<i64> = docids.iter().copied().collect();

    for &container_id in container_ids {
        let item_prefix = keys::container_item_prefix(container_id);
        for (_, value) in txn.scan_prefix(&item_prefix)? {
            let docid = codec.decode::<ContainerItemRow>(&value)?.docid;
            if !docid_set.contains(&docid) {
                return Err(Error::ContainerNotEmpty(container_id));
            }
        }
    }

    let mut referenced_blob_ids: HashSet<i32> = HashSet::new();
    let all_container_ids: Vec<i64> = txn
        .scan_prefix(&keys::all_containers_prefix())?
        .into_iter()
        .map(|(key, _)| keys::decode_container_id(&key))
        .collect::<CResult<Vec<_>>>()?;

    for &docid in docids {
        txn.delete(&keys::object(docid));
        txn.delete(&keys::current(docid));

        let version_nums: Vec<i32> = txn
            .scan_prefix(&keys::state_prefix(docid))?
            .into_iter()
            .map(|(key, _)| keys::decode_state_version(&key, docid))
            .collect::<CResult<Vec<_>>>()?;

        for version_num in version_nums {
            txn.delete(&keys::state(docid, version_num));
            let link_prefix = keys::blob_link_prefix(docid, version_num);
            for (key, value) in txn.scan_prefix(&link_prefix)? {
                let name = keys::decode_blob_link_name(&key, docid, version_num)?;
                let blob_id: i32 = codec.decode(&value)?;
                referenced_blob_ids.insert(blob_id);
                txn.delete(&key);
                txn.delete(&keys::blob_link_by_blob(blob_id, docid, version_num, &name));
            }
        }

        let membership_prefix = keys::container_membership_prefix(docid);
        let holding: Vec<i64> = txn
            .scan_prefix(&membership_prefix)?
            .into_iter()
            .map(|(key, _)| keys::decode_container_membership_suffix(&key, docid))
            .collect::<CResult<Vec<_>>>()?;
        for container_id in holding {
            let item_prefix = keys::container_item_prefix(container_id);
            for (key, value) in txn.scan_prefix(&item_prefix)? {
                if codec.decode::<ContainerItemRow>(&value)?.docid == docid {
                    txn.delete(&key);
                }
            }
            txn.delete(&keys::container_membership(docid, container_id));
        }

        // §9: shred removes the docid unconditionally from every DeletedItem too, not
        // only the containers it's currently listed as a live member of.
        for &container_id in &all_container_ids {
            txn.delete(&keys::deleted_item(container_id, docid));
        }
    }

    for &container_id in container_ids {
        txn.delete(&keys::container(container_id));
    }

    blob_store::drop_orphans(txn, &referenced_blob_ids.into_iter().collect::<Vec<_>>())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveConfig;
    use crate::container_differ::archive_container;
    use crate::model::{BlobAttachment, ClassDescriptor, ClassResolver, ContainerEntry, ContainerInput, VersionInput};
    use crate::storage::memory::MemoryEngine;
    use crate::traversal::container_contents;
    use crate::txn::Store;
    use crate::version_log::{archive_version, get_version};
    use chrono::Utc;
    use std::any::TypeId;
    use std::io::Cursor;

    struct Doc;
    struct ClassResolverStub;
    impl ClassResolver for ClassResolverStub {
        fn resolve(&self, _module: &str, _name: &str) -> Option<TypeId> {
            Some(TypeId::of::<Doc>())
        }
    }

    fn input<'a>(docid: i64, blobs: Vec<BlobAttachment<'a>>) -> VersionInput<'a> {
        VersionInput {
            docid,
            class: ClassDescriptor { module: "app".into(), name: "Doc".into(), type_id: TypeId::of::<Doc>() },
            created: Utc::now(),
            modified: Utc::now(),
            path: "/a".into(),
            user: "u".into(),
            title: None,
            description: None,
            attrs: None,
            comment: None,
            blobs,
        }
    }

    #[test]
    fn shred_cascades_to_orphan_blobs_and_refuses_nonempty_containers() {
        let store = Store::new(MemoryEngine::new());
        let config = ArchiveConfig::default();
        let resolver = ClassResolverStub;
        let mut txn = store.begin();

        let mut eggs1 = Cursor::new(b"eggs".to_vec());
        let mut bacon = Cursor::new(b"bacon".to_vec());
        archive_version(
            &mut txn,
            &config,
            &resolver,
            input(
                4,
                vec![
                    BlobAttachment { name: "eggs".into(), source: &mut eggs1 },
                    BlobAttachment { name: "bacon".into(), source: &mut bacon },
                ],
            ),
        )
        .unwrap();

        let mut eggs2 = Cursor::new(b"eggs".to_vec());
        archive_version(&mut txn, &config, &resolver, input(6, vec![BlobAttachment { name: "eggs".into(), source: &mut eggs2 }]))
            .unwrap();

        shred(&mut txn, &[4], &[]).unwrap();
        assert!(get_version(&mut txn, 4, 1).is_err());
        // docid 6 still references the shared "eggs" blob, so it survives.
        let v6 = get_version(&mut txn, 6, 1).unwrap();
        assert_eq!(v6.blob_names, vec!["eggs".to_string()]);
    }

    #[test]
    fn shred_refuses_nonempty_container_and_leaves_state_unchanged() {
        let store = Store::new(MemoryEngine::new());
        let config = ArchiveConfig::default();
        let resolver = ClassResolverStub;
        let mut txn = store.begin();
        archive_version(&mut txn, &config, &resolver, input(4, vec![])).unwrap();
        archive_container(
            &mut txn,
            ContainerInput {
                container_id: 5,
                path: "/c5".into(),
                entries: vec![ContainerEntry { namespace: "".into(), name: "a".into(), docid: 4 }],
                user: "u".into(),
            },
            "u",
        )
        .unwrap();

        let before = container_contents(&mut txn, 5).unwrap();
        let result = shred(&mut txn, &[], &[5]);
        assert!(matches!(result, Err(Error::ContainerNotEmpty(5))));
        let after = container_contents(&mut txn, 5).unwrap();
        assert_eq!(before, after);
        assert!(get_version(&mut txn, 4, 1).is_ok());
    }
}
