//! Row types stored under the keys in `keys.rs`, plus the external-interface structs
//! from §6 (`VersionInput`, `ContainerInput`, `HistoryRecord`, `ContainerRecord`,
//! `DeletedItemView`).

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::any::TypeId;

/// An application-supplied class token (§4.1). `type_id` stands in for the dynamic
/// "class handle" of the distilled spec; `module`/`name` are the durable identity
/// persisted across restarts (a `TypeId` is only stable within one process run).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub module: String,
    pub name: String,
    pub type_id: TypeId,
}

/// Resolves a `(module, name)` pair back to the `TypeId` the embedding application
/// currently associates with it. Implemented by the caller; `intern` fails with
/// `BrokenClassReference` when this returns `None` or a different `TypeId` than the
/// one on the supplied descriptor.
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, module: &str, name: &str) -> Option<TypeId>;
}

/// Stored under `keys::object(docid)`. Created on the first `archive_version` call for
/// a docid and never overwritten afterward -- `created` is captured once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub docid: i64,
    pub created: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassRow {
    pub class_id: i32,
    pub module: String,
    pub name: String,
}

/// One archived version of a document. Stored under `keys::state(docid, version_num)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateRow {
    pub docid: i64,
    pub version_num: i32,
    /// The version this one was derived from, if any (absent for the first version of
    /// a docid, and for a version created by `revert`, which points back at the
    /// reverted-to version rather than the one preceding it -- see DESIGN.md).
    pub derived_from_version: Option<i32>,
    pub class_id: i32,
    pub path: String,
    pub archive_time: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub user: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attrs: Option<serde_json::Value>,
    pub comment: Option<String>,
}

/// The current-version pointer for a docid. Stored under `keys::current(docid)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentRow {
    pub version_num: i32,
}

/// Blob metadata, keyed by the blob's own id (`keys::blob_info`) and cross-indexed by
/// its (length, md5, sha256) fingerprint (`keys::blob_by_fingerprint`) for dedup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobInfoRow {
    pub blob_id: i32,
    pub length: i64,
    #[serde(with = "serde_bytes")]
    pub md5: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub sha256: Vec<u8>,
    pub chunk_count: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerRow {
    pub container_id: i64,
    pub path: String,
}

/// A live container entry. Stored under `keys::container_item(container_id, namespace,
/// name)`, cross-indexed by container membership (`keys::container_membership`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerItemRow {
    pub docid: i64,
}

/// Records a docid's departure from a container, whether by deletion, rename-into-a-
/// replaced-slot, or move elsewhere. Stored under `keys::deleted_item(container_id,
/// docid)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedItemRow {
    pub namespace: String,
    pub name: String,
    pub deleted_time: DateTime<Utc>,
    pub deleted_by: String,
}

/// Input to `archive_version` (§6). `class` is mandatory: Rust has no implicit
/// per-value class reflection equivalent to the distilled spec's "class is null => use
/// the runtime class of input" (resolved Open Question, see DESIGN.md).
pub struct VersionInput<'a> {
    pub docid: i64,
    pub class: ClassDescriptor,
    /// Used only to populate `Object.created` the first time this docid is archived;
    /// ignored on every subsequent version.
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub path: String,
    pub user: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attrs: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub blobs: Vec<BlobAttachment<'a>>,
}

/// One named attachment supplied with a version. `source` is read to EOF and hashed/
/// chunked by the blob store; it must support `Read + Seek` so the store can rewind it
/// if it already has a blob with a matching fingerprint (avoiding a double read in the
/// common no-dedup case isn't possible without hashing as you stream, so a rewind is
/// the simplest correct contract -- see DESIGN.md).
pub struct BlobAttachment<'a> {
    pub name: String,
    pub source: &'a mut dyn crate::blob_store::BlobSource,
}

/// Input to `archive_container` (§6): the complete new mapping of `{namespace, name} ->
/// docid` for one container, to be diffed against what is currently recorded.
#[derive(Clone, Debug)]
pub struct ContainerInput {
    pub container_id: i64,
    pub path: String,
    /// The complete new `{namespace, name} -> docid` mapping for this container
    /// (namespace "" is the default namespace, matching `map`/`ns_map` in the distilled
    /// spec's §6 flattened into one list).
    pub entries: Vec<ContainerEntry>,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContainerEntry {
    pub namespace: String,
    pub name: String,
    pub docid: i64,
}

/// One row of `history(docid)` (§6), newest version first.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRecord {
    pub version_num: i32,
    pub derived_from_version: Option<i32>,
    pub class: ClassRow,
    pub path: String,
    pub archive_time: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub user: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attrs: Option<serde_json::Value>,
    pub comment: Option<String>,
    pub blob_names: Vec<String>,
    /// The docid's current-version pointer at the time this record was read, regardless
    /// of whether `version_num` is the version it points at (§6).
    pub current_version: i32,
}

impl HistoryRecord {
    pub fn is_current(&self) -> bool {
        self.version_num == self.current_version
    }
}

/// One entry of the deleted-items view for a container (§6), ordered by
/// `deleted_time` descending then `namespace` then `name`.
#[derive(Clone, Debug, PartialEq)]
pub struct DeletedItemView {
    pub namespace: String,
    pub name: String,
    pub docid: i64,
    pub deleted_time: DateTime<Utc>,
    pub deleted_by: String,
    /// The set of container_ids that currently hold `docid` as a live ContainerItem.
    /// Empty for a true deletion, non-empty when the docid was effectively moved.
    pub new_container_ids: Vec<i64>,
    pub moved: bool,
}

/// `container_contents(container_id)` (§4.5/§6): current live entries plus the
/// deletion log. `iter_hierarchy` yields one of these per visited container.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerRecord {
    pub container_id: i64,
    pub path: String,
    pub entries: Vec<ContainerEntry>,
    pub deleted: Vec<DeletedItemView>,
}

/// Outcome of a single `archive_container` call, returned so callers can log or act on
/// what changed without re-diffing themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerDiff {
    pub added: Vec<ContainerEntry>,
    pub undeleted: Vec<i64>,
    pub deleted: Vec<i64>,
}
