//! Encoded keys for the archive's nine relations (§3) plus the secondary indexes
//! needed to answer the lookups the distilled spec describes in prose (e.g. "for every
//! docid in old_by_docid", "the set of container_ids that currently hold a
//! ContainerItem for this docid"). See DESIGN.md for why these exist: a SQL backend
//! would answer them with a WHERE clause; an ordered key-value engine needs an index.

use crate::codec::keycode::{decode_i32, decode_i64, decode_string, encode_fixed, encode_i32, encode_i64, encode_string};
use crate::error::CResult;

/// Key variant tags. The tag byte is the first byte of every encoded key, which keeps
/// different relations from ever comparing equal as byte ranges and lets a prefix scan
/// target exactly one relation.
#[repr(u8)]
enum Tag {
    Object = 0,
    Class = 1,
    ClassByName = 2,
    NextClassId = 3,
    NextBlobId = 4,
    State = 5,
    Current = 6,
    BlobInfo = 7,
    BlobByFingerprint = 8,
    Chunk = 9,
    BlobLink = 10,
    Container = 11,
    ContainerItem = 12,
    DeletedItem = 14,
    ContainerMembership = 15,
    BlobLinkByBlob = 16,
}

fn encoded(tag: Tag) -> Vec<u8> {
    vec![tag as u8]
}

pub fn object(docid: i64) -> Vec<u8> {
    let mut k = encoded(Tag::Object);
    encode_i64(docid, &mut k);
    k
}

pub fn class(class_id: i32) -> Vec<u8> {
    let mut k = encoded(Tag::Class);
    encode_i32(class_id, &mut k);
    k
}

pub fn class_by_name(module: &str, name: &str) -> Vec<u8> {
    let mut k = encoded(Tag::ClassByName);
    encode_string(module, &mut k);
    encode_string(name, &mut k);
    k
}

pub fn next_class_id() -> Vec<u8> {
    encoded(Tag::NextClassId)
}

pub fn next_blob_id() -> Vec<u8> {
    encoded(Tag::NextBlobId)
}

/// All State rows for a docid, in ascending version_num order.
pub fn state_prefix(docid: i64) -> Vec<u8> {
    let mut k = encoded(Tag::State);
    encode_i64(docid, &mut k);
    k
}

pub fn state(docid: i64, version_num: i32) -> Vec<u8> {
    let mut k = state_prefix(docid);
    encode_i32(version_num, &mut k);
    k
}

/// Decodes the version_num suffix of a State key, given its docid prefix was already
/// matched by a prefix scan.
pub fn decode_state_version(key: &[u8], docid: i64) -> CResult<i32> {
    let mut rest: &[u8] = &key[state_prefix(docid).len()..];
    decode_i32(&mut rest)
}

pub fn current(docid: i64) -> Vec<u8> {
    let mut k = encoded(Tag::Current);
    encode_i64(docid, &mut k);
    k
}

pub fn blob_info(blob_id: i32) -> Vec<u8> {
    let mut k = encoded(Tag::BlobInfo);
    encode_i32(blob_id, &mut k);
    k
}

pub fn blob_by_fingerprint(length: i64, md5: &[u8; 16], sha256: &[u8; 32]) -> Vec<u8> {
    let mut k = encoded(Tag::BlobByFingerprint);
    encode_i64(length, &mut k);
    encode_fixed(md5, &mut k);
    encode_fixed(sha256, &mut k);
    k
}

/// All Chunk rows for a blob, in ascending chunk_index order.
pub fn chunk_prefix(blob_id: i32) -> Vec<u8> {
    let mut k = encoded(Tag::Chunk);
    encode_i32(blob_id, &mut k);
    k
}

pub fn chunk(blob_id: i32, chunk_index: i32) -> Vec<u8> {
    let mut k = chunk_prefix(blob_id);
    encode_i32(chunk_index, &mut k);
    k
}

/// All BlobLink rows for a (docid, version_num), keyed by name.
pub fn blob_link_prefix(docid: i64, version_num: i32) -> Vec<u8> {
    let mut k = encoded(Tag::BlobLink);
    encode_i64(docid, &mut k);
    encode_i32(version_num, &mut k);
    k
}

pub fn blob_link(docid: i64, version_num: i32, name: &str) -> Vec<u8> {
    let mut k = blob_link_prefix(docid, version_num);
    encode_string(name, &mut k);
    k
}

pub fn decode_blob_link_name(key: &[u8], docid: i64, version_num: i32) -> CResult<String> {
    let mut rest: &[u8] = &key[blob_link_prefix(docid, version_num).len()..];
    decode_string(&mut rest)
}

/// Secondary index: reverse lookup from a blob to every BlobLink that references it, so
/// `drop_orphans` (C2) can tell whether a blob has any surviving link without scanning
/// the whole BlobLink relation.
pub fn blob_link_by_blob_prefix(blob_id: i32) -> Vec<u8> {
    let mut k = encoded(Tag::BlobLinkByBlob);
    encode_i32(blob_id, &mut k);
    k
}

pub fn blob_link_by_blob(blob_id: i32, docid: i64, version_num: i32, name: &str) -> Vec<u8> {
    let mut k = blob_link_by_blob_prefix(blob_id);
    encode_i64(docid, &mut k);
    encode_i32(version_num, &mut k);
    encode_string(name, &mut k);
    k
}

/// Every Container row, regardless of id. Used by the shredder to locate every
/// DeletedItem referencing a docid being destroyed, since there is no reverse index
/// from docid to "containers where it was once deleted from" -- a full scan is
/// acceptable for an operation that is already a bulk, destructive, infrequent one.
pub fn all_containers_prefix() -> Vec<u8> {
    encoded(Tag::Container)
}

pub fn decode_container_id(key: &[u8]) -> CResult<i64> {
    let mut rest: &[u8] = &key[all_containers_prefix().len()..];
    decode_i64(&mut rest)
}

pub fn container(container_id: i64) -> Vec<u8> {
    let mut k = encoded(Tag::Container);
    encode_i64(container_id, &mut k);
    k
}

/// All ContainerItem rows for a container, ordered by (namespace, name).
pub fn container_item_prefix(container_id: i64) -> Vec<u8> {
    let mut k = encoded(Tag::ContainerItem);
    encode_i64(container_id, &mut k);
    k
}

pub fn container_item(container_id: i64, namespace: &str, name: &str) -> Vec<u8> {
    let mut k = container_item_prefix(container_id);
    encode_string(namespace, &mut k);
    encode_string(name, &mut k);
    k
}

pub fn decode_container_item_suffix(key: &[u8], container_id: i64) -> CResult<(String, String)> {
    let mut rest: &[u8] = &key[container_item_prefix(container_id).len()..];
    let namespace = decode_string(&mut rest)?;
    let name = decode_string(&mut rest)?;
    Ok((namespace, name))
}

/// All DeletedItem rows for a container, keyed by docid (re-sorted by deleted_time at
/// read time, per §4.5's ordering requirement).
pub fn deleted_item_prefix(container_id: i64) -> Vec<u8> {
    let mut k = encoded(Tag::DeletedItem);
    encode_i64(container_id, &mut k);
    k
}

pub fn deleted_item(container_id: i64, docid: i64) -> Vec<u8> {
    let mut k = deleted_item_prefix(container_id);
    encode_i64(docid, &mut k);
    k
}

/// Secondary index: all containers that currently hold `docid` as a live
/// ContainerItem. Used to compute `new_container_ids`/`moved` and to drive traversal.
pub fn container_membership_prefix(docid: i64) -> Vec<u8> {
    let mut k = encoded(Tag::ContainerMembership);
    encode_i64(docid, &mut k);
    k
}

pub fn container_membership(docid: i64, container_id: i64) -> Vec<u8> {
    let mut k = container_membership_prefix(docid);
    encode_i64(container_id, &mut k);
    k
}

pub fn decode_container_membership_suffix(key: &[u8], docid: i64) -> CResult<i64> {
    let mut rest: &[u8] = &key[container_membership_prefix(docid).len()..];
    decode_i64(&mut rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_prefix_scans_stay_within_docid() {
        let a = state(1, 1);
        let b = state(1, 2);
        let c = state(2, 1);
        assert!(a.starts_with(&state_prefix(1)));
        assert!(b.starts_with(&state_prefix(1)));
        assert!(!c.starts_with(&state_prefix(1)));
        assert!(a < b);
    }

    #[test]
    fn container_item_suffix_round_trips() {
        let key = container_item(5, "headers", "b");
        let (ns, name) = decode_container_item_suffix(&key, 5).unwrap();
        assert_eq!(ns, "headers");
        assert_eq!(name, "b");
    }
}
