//! Archive-wide configuration (§1.1): scoped to what an embedded library needs, not a
//! REPL -- no connection strings or driver options, since the storage path is already
//! the only thing `ArchiveConfig` needs to hand `FileEngine`.

use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Chunk size used by `blob_store::put` when streaming a blob into Chunk rows.
    pub chunk_size: usize,
    /// Blobs at or under this length are buffered in memory by `blob_store::open`;
    /// larger ones spill to a temp file.
    pub memory_limit: u64,
    /// Ratio of garbage to total disk size past which `FileEngine::new_compact` runs a
    /// compaction when opening a durable archive.
    pub compact_garbage_ratio: f64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            memory_limit: 1024 * 1024,
            compact_garbage_ratio: 0.5,
        }
    }
}
