//! Content-addressable blob store (C2): chunked streaming, length+MD5+SHA-256 dedup,
//! and orphan collection.

use crate::codec::value::ValueCodec;
use crate::config::ArchiveConfig;
use crate::error::{CResult, Error};
use crate::keys;
use crate::model::BlobInfoRow;
use crate::storage::engine::Engine;
use crate::txn::Txn;
use md5::{Digest as Md5Digest, Md5};
use sha2::{Digest as Sha256Digest, Sha256};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// A rewindable byte source. `put` reads it twice: once to fingerprint, once (on a
/// cache miss) to store chunks.
pub trait BlobSource: Read + Seek {}
impl<T: Read + Seek> BlobSource for T {}

/// A seekable read-only view over a stored blob, returned by `open`. Buffered in memory
/// for small blobs, spilled to a temp file otherwise. `write` always fails: the type
/// exists so misuse is a deterministic runtime error rather than a missing method.
pub enum BlobReader {
    Memory(Cursor<Vec<u8>>),
    Spilled(std::fs::File),
}

impl BlobReader {
    pub fn write(&mut self, _buf: &[u8]) -> CResult<usize> {
        Err(Error::ReadOnlyBlob)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            BlobReader::Memory(c) => c.read(buf),
            BlobReader::Spilled(f) => f.read(buf),
        }
    }
}

impl Seek for BlobReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            BlobReader::Memory(c) => c.seek(pos),
            BlobReader::Spilled(f) => f.seek(pos),
        }
    }
}

/// Consumes `source` in `config.chunk_size`-sized chunks, computing its fingerprint in
/// one pass. On a dedup hit, returns the existing blob_id without a second read. On a
/// miss, rewinds and streams the reader again to append Chunk rows.
pub fn put<E: Engine>(txn: &mut Txn<E>, config: &ArchiveConfig, source: &mut dyn BlobSource) -> CResult<i32> {
    let codec = ValueCodec::new();
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut length: i64 = 0;
    let mut buf = vec![0u8; config.chunk_size];

    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha256.update(&buf[..n]);
        length += n as i64;
    }
    source.seek(SeekFrom::Start(0))?;
    let md5: [u8; 16] = md5.finalize().into();
    let sha256: [u8; 32] = sha256.finalize().into();

    let fingerprint_key = keys::blob_by_fingerprint(length, &md5, &sha256);
    if let Some(bytes) = txn.get(&fingerprint_key)? {
        return codec.decode(&bytes);
    }

    let blob_id = txn.next_id(&keys::next_blob_id())? as i32;
    let mut info =
        BlobInfoRow { blob_id, length, md5: md5.to_vec(), sha256: sha256.to_vec(), chunk_count: 0 };
    txn.set(&keys::blob_info(blob_id), codec.encode(&info)?);

    let mut chunk_index: i32 = 0;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        txn.set(&keys::chunk(blob_id, chunk_index), buf[..n].to_vec());
        chunk_index += 1;
    }
    info.chunk_count = chunk_index;
    txn.set(&keys::blob_info(blob_id), codec.encode(&info)?);
    txn.set(&fingerprint_key, codec.encode(&blob_id)?);

    log::debug!("blob {blob_id} stored ({length} bytes, {chunk_index} chunks)");
    Ok(blob_id)
}

fn blob_info<E: Engine>(txn: &mut Txn<E>, blob_id: i32) -> CResult<BlobInfoRow> {
    let bytes = txn
        .get(&keys::blob_info(blob_id))?
        .ok_or_else(|| Error::NotFound(format!("blob {blob_id}")))?;
    ValueCodec::new().decode(&bytes)
}

/// Returns a seekable read-only view of a blob's full content. Chunks are streamed
/// straight into the destination (an in-memory buffer below `memory_limit`, a temp file
/// above it) one at a time, never held beyond the chunk being copied.
pub fn open<E: Engine>(txn: &mut Txn<E>, config: &ArchiveConfig, blob_id: i32) -> CResult<BlobReader> {
    let info = blob_info(txn, blob_id)?;

    if info.length <= config.memory_limit as i64 {
        let mut data = Vec::with_capacity(info.length.max(0) as usize);
        for chunk_index in 0..info.chunk_count {
            let bytes = txn
                .get(&keys::chunk(blob_id, chunk_index))?
                .ok_or_else(|| Error::Storage(format!("missing chunk {chunk_index} of blob {blob_id}")))?;
            data.extend_from_slice(&bytes);
        }
        Ok(BlobReader::Memory(Cursor::new(data)))
    } else {
        let mut tmp = tempfile::NamedTempFile::new()?;
        for chunk_index in 0..info.chunk_count {
            let bytes = txn
                .get(&keys::chunk(blob_id, chunk_index))?
                .ok_or_else(|| Error::Storage(format!("missing chunk {chunk_index} of blob {blob_id}")))?;
            tmp.write_all(&bytes)?;
        }
        tmp.flush()?;
        let mut file = tmp.into_file();
        file.seek(SeekFrom::Start(0))?;
        Ok(BlobReader::Spilled(file))
    }
}

/// Records that `blob_id` gained a named link from `(docid, version_num, name)`, for
/// the reverse index `drop_orphans` uses.
pub fn link_added<E: Engine>(txn: &mut Txn<E>, blob_id: i32, docid: i64, version_num: i32, name: &str) {
    txn.set(&keys::blob_link_by_blob(blob_id, docid, version_num, name), vec![]);
}

/// Deletes every blob in `candidate_blob_ids` that has no surviving BlobLink.
pub fn drop_orphans<E: Engine>(txn: &mut Txn<E>, candidate_blob_ids: &[i32]) -> CResult<()> {
    for &blob_id in candidate_blob_ids {
        if !txn.scan_prefix(&keys::blob_link_by_blob_prefix(blob_id))?.is_empty() {
            continue;
        }
        let info = blob_info(txn, blob_id)?;
        for chunk_index in 0..info.chunk_count {
            txn.delete(&keys::chunk(blob_id, chunk_index));
        }
        txn.delete(&keys::blob_info(blob_id));
        txn.delete(&keys::blob_by_fingerprint(info.length, info.md5_array(), info.sha256_array()));
        log::debug!("dropped orphan blob {blob_id}");
    }
    Ok(())
}

impl BlobInfoRow {
    fn md5_array(&self) -> &[u8; 16] {
        self.md5.as_slice().try_into().expect("md5 is always 16 bytes")
    }

    fn sha256_array(&self) -> &[u8; 32] {
        self.sha256.as_slice().try_into().expect("sha256 is always 32 bytes")
    }
}
