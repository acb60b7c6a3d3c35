use crate::error::CResult;
use crate::storage::{ScanIteratorT, Status};

/// An ordered byte-keyed storage engine, where both keys and values are arbitrary byte
/// strings stored in lexicographical key order. Writes are only guaranteed durable after
/// calling flush().
///
/// Only supports single-threaded use since all methods (including reads) take a mutable
/// reference -- serialized access can't be avoided anyway, since the archive's own
/// `Txn` layer is what provides concurrent access to callers (see `txn.rs`).
pub trait Engine: std::fmt::Display + Send {
    /// The iterator returned by scan().
    type ScanIterator<'a>: ScanIteratorT + 'a
    where
        Self: Sized + 'a;

    /// Deletes a key, or does nothing if it does not exist.
    fn delete(&mut self, key: &[u8]) -> CResult<()>;

    /// Flushes any buffered data to the underlying storage medium.
    fn flush(&mut self) -> CResult<()>;

    /// Gets a value for a key, if it exists.
    fn get(&mut self, key: &[u8]) -> CResult<Option<Vec<u8>>>;

    /// Iterates over an ordered range of key/value pairs.
    fn scan(&mut self, range: impl std::ops::RangeBounds<Vec<u8>>) -> Self::ScanIterator<'_>
    where
        Self: Sized;

    /// Like scan, but can be used from trait objects. The iterator will use dynamic
    /// dispatch, which has a minor performance penalty.
    fn scan_dyn(
        &mut self,
        range: (std::ops::Bound<Vec<u8>>, std::ops::Bound<Vec<u8>>),
    ) -> Box<dyn ScanIteratorT + '_>;

    /// Iterates over all key/value pairs starting with prefix.
    fn scan_prefix(&mut self, prefix: &[u8]) -> Self::ScanIterator<'_>
    where
        Self: Sized,
    {
        let (start, end) = prefix_range(prefix);
        self.scan((start, end))
    }

    /// Sets a value for a key, replacing the existing value if any.
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> CResult<()>;

    /// Returns engine status.
    fn status(&mut self) -> CResult<Status>;
}

/// Computes the (start, end) bounds of all keys having `prefix` as a prefix. Shared by
/// `Engine::scan_prefix` and by `Txn`'s local write-buffer range scans, so the two agree
/// on what "prefix" means.
pub fn prefix_range(
    prefix: &[u8],
) -> (std::ops::Bound<Vec<u8>>, std::ops::Bound<Vec<u8>>) {
    let start = std::ops::Bound::Included(prefix.to_vec());
    let end = match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => std::ops::Bound::Excluded(
            prefix.iter().take(i).copied().chain(std::iter::once(prefix[i] + 1)).collect(),
        ),
        None => std::ops::Bound::Unbounded,
    };
    (start, end)
}
