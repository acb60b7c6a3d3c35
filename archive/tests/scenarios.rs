//! End-to-end scenarios exercised through the `Archive<E>` facade rather than any one
//! module in isolation, covering the multi-step flows individual unit tests don't: two
//! versions plus a revert, blob dedup across versions, a container rename, a move across
//! containers, hierarchy traversal with deletions, and a shred that cascades to orphan
//! blobs while refusing a non-empty container.

use docarchive::archive::Archive;
use docarchive::config::ArchiveConfig;
use docarchive::error::Error;
use docarchive::model::{
    BlobAttachment, ClassDescriptor, ClassResolver, ContainerEntry, ContainerInput, VersionInput,
};
use docarchive::storage::memory::MemoryEngine;
use chrono::Utc;
use std::any::TypeId;
use std::io::Cursor;

struct Doc;

struct AppResolver;
impl ClassResolver for AppResolver {
    fn resolve(&self, _module: &str, _name: &str) -> Option<TypeId> {
        Some(TypeId::of::<Doc>())
    }
}

fn archive() -> Archive<MemoryEngine> {
    Archive::new(MemoryEngine::new(), ArchiveConfig::default(), Box::new(AppResolver))
}

fn class() -> ClassDescriptor {
    ClassDescriptor { module: "app".into(), name: "Doc".into(), type_id: TypeId::of::<Doc>() }
}

fn version(docid: i64, title: &str) -> VersionInput<'static> {
    VersionInput {
        docid,
        class: class(),
        created: Utc::now(),
        modified: Utc::now(),
        path: format!("/docs/{docid}"),
        user: "alice".into(),
        title: Some(title.into()),
        description: None,
        attrs: None,
        comment: None,
        blobs: vec![],
    }
}

fn entry(namespace: &str, name: &str, docid: i64) -> ContainerEntry {
    ContainerEntry { namespace: namespace.into(), name: name.into(), docid }
}

/// S1: archiving a docid twice numbers the versions 1, 2, ...; reverting moves the
/// current-version pointer back without appending a new version.
#[test]
fn two_versions_then_revert_through_the_facade() {
    let archive = archive();
    let mut txn = archive.begin();

    let v1 = archive.archive_version(&mut txn, version(4, "draft")).unwrap();
    let v2 = archive.archive_version(&mut txn, version(4, "final")).unwrap();
    assert_eq!((v1, v2), (1, 2));

    let hist = archive.history(&mut txn, 4, false).unwrap();
    assert_eq!(hist.len(), 2);
    assert_eq!(hist[0].version_num, 2);
    assert_eq!(hist[0].current_version, 2);
    assert_eq!(hist[1].current_version, 2);

    archive.revert(&mut txn, 4, 1).unwrap();
    let current = archive.history(&mut txn, 4, true).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].version_num, 1);
    assert_eq!(current[0].title.as_deref(), Some("draft"));
    assert_eq!(current[0].current_version, 1);

    // Reverting does not create a new version: max version_num is still 2.
    let old = archive.get_version(&mut txn, 4, 2).unwrap();
    assert_eq!(old.current_version, 1);
    assert!(archive.get_version(&mut txn, 4, 3).is_err());

    txn.commit().unwrap();
}

/// S2: the same blob content attached under two different docids is stored once.
#[test]
fn blob_dedup_across_documents() {
    let archive = archive();
    let mut txn = archive.begin();

    let mut first = version(4, "with logo");
    let mut logo_a = Cursor::new(b"PNGDATA".to_vec());
    first.blobs.push(BlobAttachment { name: "logo.png".into(), source: &mut logo_a });
    archive.archive_version(&mut txn, first).unwrap();

    let mut second = version(6, "also with logo");
    let mut logo_b = Cursor::new(b"PNGDATA".to_vec());
    second.blobs.push(BlobAttachment { name: "logo.png".into(), source: &mut logo_b });
    archive.archive_version(&mut txn, second).unwrap();

    let v4 = archive.get_version(&mut txn, 4, 1).unwrap();
    let v6 = archive.get_version(&mut txn, 6, 1).unwrap();
    assert_eq!(v4.blob_names, vec!["logo.png".to_string()]);
    assert_eq!(v6.blob_names, vec!["logo.png".to_string()]);

    let mut reader = archive.open_blob(&mut txn, 6, 1, "logo.png").unwrap();
    let mut out = Vec::new();
    std::io::Read::read_to_end(&mut reader, &mut out).unwrap();
    assert_eq!(out, b"PNGDATA");

    txn.commit().unwrap();
}

/// S3: renaming a docid within the same container slot leaves no deletion record.
#[test]
fn container_rename_leaves_no_deletion() {
    let archive = archive();
    let mut txn = archive.begin();

    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 10, path: "/c10".into(), entries: vec![entry("", "report", 4)], user: "alice".into() },
            "alice",
        )
        .unwrap();
    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 10, path: "/c10".into(), entries: vec![entry("", "report-final", 4)], user: "alice".into() },
            "alice",
        )
        .unwrap();

    let contents = archive.container_contents(&mut txn, 10).unwrap();
    assert!(contents.deleted.is_empty());
    assert!(contents.entries.contains(&entry("", "report-final", 4)));

    txn.commit().unwrap();
}

/// S4: moving a docid from one container to another leaves a deletion record in the
/// source container, marked `moved`, pointing at the destination.
#[test]
fn move_across_containers_marks_the_deletion_moved() {
    let archive = archive();
    let mut txn = archive.begin();

    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 10, path: "/c10".into(), entries: vec![entry("", "a", 4)], user: "alice".into() },
            "alice",
        )
        .unwrap();
    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 11, path: "/c11".into(), entries: vec![], user: "alice".into() },
            "alice",
        )
        .unwrap();

    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 10, path: "/c10".into(), entries: vec![], user: "alice".into() },
            "alice",
        )
        .unwrap();
    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 11, path: "/c11".into(), entries: vec![entry("", "a", 4)], user: "alice".into() },
            "alice",
        )
        .unwrap();

    let source = archive.container_contents(&mut txn, 10).unwrap();
    assert_eq!(source.deleted.len(), 1);
    assert!(source.deleted[0].moved);
    assert_eq!(source.deleted[0].new_container_ids, vec![11]);

    txn.commit().unwrap();
}

/// S5: a four-level container hierarchy (4 -> {5, 6 -> {7, 8}}), with 7 deleted from 6
/// and 6 deleted from 4. `iter_hierarchy` without `follow_deleted` stops at live
/// children; with it, it walks into deleted-but-still-existing containers too; and
/// `max_depth` bounds how far it goes regardless.
#[test]
fn hierarchy_traversal_with_deletions() {
    let archive = archive();
    let mut txn = archive.begin();

    for (container_id, children) in [(4, vec![5, 6]), (5, vec![]), (6, vec![7, 8]), (7, vec![]), (8, vec![])] {
        let entries = children.iter().map(|&c| entry("", &c.to_string(), c)).collect();
        archive
            .archive_container(
                &mut txn,
                ContainerInput { container_id, path: format!("/c{container_id}"), entries, user: "alice".into() },
                "alice",
            )
            .unwrap();
    }

    // Delete 7 from 6, and 6 from 4.
    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 6, path: "/c6".into(), entries: vec![entry("", "8", 8)], user: "alice".into() },
            "alice",
        )
        .unwrap();
    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 4, path: "/c4".into(), entries: vec![entry("", "5", 5)], user: "alice".into() },
            "alice",
        )
        .unwrap();

    let live_only: Vec<i64> = archive.iter_hierarchy(&mut txn, 4, None, false, false).unwrap().iter().map(|r| r.container_id).collect();
    let mut live_only_sorted = live_only.clone();
    live_only_sorted.sort();
    assert_eq!(live_only_sorted, vec![4, 5]);

    let with_deleted: Vec<i64> =
        archive.iter_hierarchy(&mut txn, 4, None, true, false).unwrap().iter().map(|r| r.container_id).collect();
    let mut with_deleted_sorted = with_deleted.clone();
    with_deleted_sorted.sort();
    assert_eq!(with_deleted_sorted, vec![4, 5, 6, 7, 8]);

    let bounded: Vec<i64> =
        archive.iter_hierarchy(&mut txn, 4, Some(1), true, false).unwrap().iter().map(|r| r.container_id).collect();
    let mut bounded_sorted = bounded.clone();
    bounded_sorted.sort();
    assert_eq!(bounded_sorted, vec![4, 5, 6]);

    txn.commit().unwrap();
}

/// S6: shredding a docid cascades to drop a blob it solely referenced, but leaves a
/// blob shared with a surviving docid intact; shredding a container that still holds a
/// live item for an un-shredded docid fails and leaves everything unchanged.
#[test]
fn shred_cascades_and_refuses_nonempty_container() {
    let archive = archive();
    let mut txn = archive.begin();

    let mut shared_a = Cursor::new(b"shared".to_vec());
    let mut only_here = Cursor::new(b"unique".to_vec());
    let mut first = version(4, "to be shredded");
    first.blobs.push(BlobAttachment { name: "shared.bin".into(), source: &mut shared_a });
    first.blobs.push(BlobAttachment { name: "unique.bin".into(), source: &mut only_here });
    archive.archive_version(&mut txn, first).unwrap();

    let mut shared_b = Cursor::new(b"shared".to_vec());
    let mut second = version(6, "survives");
    second.blobs.push(BlobAttachment { name: "shared.bin".into(), source: &mut shared_b });
    archive.archive_version(&mut txn, second).unwrap();

    archive.shred(&mut txn, &[4], &[]).unwrap();
    assert!(archive.get_version(&mut txn, 4, 1).is_err());
    let survivor = archive.get_version(&mut txn, 6, 1).unwrap();
    assert_eq!(survivor.blob_names, vec!["shared.bin".to_string()]);

    archive
        .archive_container(
            &mut txn,
            ContainerInput { container_id: 20, path: "/c20".into(), entries: vec![entry("", "a", 6)], user: "alice".into() },
            "alice",
        )
        .unwrap();

    let before = archive.container_contents(&mut txn, 20).unwrap();
    let result = archive.shred(&mut txn, &[], &[20]);
    assert!(matches!(result, Err(Error::ContainerNotEmpty(20))));
    let after = archive.container_contents(&mut txn, 20).unwrap();
    assert_eq!(before, after);

    txn.commit().unwrap();
}
