//! Error taxonomy for the archive (see DESIGN.md: no thiserror, hand-rolled to match the
//! rest of the crate's style).

use std::fmt;

pub type CResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A class token supplied to `archive_version` could not be resolved back to the
    /// same handle via (module, name).
    BrokenClassReference { module: String, name: String },

    /// `get_version`, `revert`, or `container_contents` addressed a nonexistent entity.
    NotFound(String),

    /// `shred` would leave a shredded container holding live items.
    ContainerNotEmpty(i64),

    /// A name/namespace was empty where non-empty is required, or a required
    /// capability was missing from an input struct.
    InvalidInput(String),

    /// A write was attempted against a blob read stream.
    ReadOnlyBlob,

    /// The reader passed to `put` was not rewindable, or a read/write against it failed.
    Io(std::io::Error),

    /// A value failed to (de)serialize to/from its stored JSON representation.
    Serialization(String),

    /// An unrecoverable error from the storage engine (corruption, lock poisoning).
    /// Propagated unchanged so the caller can retry the enclosing transaction.
    Storage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BrokenClassReference { module, name } => {
                write!(f, "class reference ({module}, {name}) did not resolve to the supplied handle")
            }
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::ContainerNotEmpty(container_id) => {
                write!(f, "container {container_id} is not empty")
            }
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::ReadOnlyBlob => write!(f, "blob read streams are read-only"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Error::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
