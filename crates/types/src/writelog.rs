//! Write logs and their hashed on-disk form.
//!
//! A write log is the ordered list of key operations that transformed one
//! root into another. The database does not store values inline; before a
//! log is persisted its inserted values are replaced by the content hashes
//! of the leaf nodes carrying them, and on retrieval the hashes are
//! rehydrated back into values by fetching those leaves.

use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// A single logged operation: insert `key -> value` or delete `key`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LogEntry {
    /// The affected key.
    pub key: Vec<u8>,
    /// The inserted value, or `None` for a deletion.
    pub value: Option<Vec<u8>>,
}

impl LogEntry {
    /// An insert entry.
    pub fn insert(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// A delete entry.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// An ordered write log.
pub type WriteLog = Vec<LogEntry>;

/// Per-entry annotation produced by the tree layer during commit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LogEntryAnnotation {
    /// Hash of the leaf node that carries the inserted value; `None` for
    /// deletions.
    pub inserted_node: Option<Hash>,
}

/// Annotations parallel to a write log.
pub type Annotations = Vec<LogEntryAnnotation>;

/// A stored write-log entry with the value replaced by its leaf hash.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HashedLogEntry {
    /// The affected key.
    pub key: Vec<u8>,
    /// Hash of the leaf carrying the inserted value; `None` for deletions.
    pub inserted_hash: Option<Hash>,
}

/// The on-disk form of a write log.
pub type HashedWriteLog = Vec<HashedLogEntry>;

/// Replace inserted values by their leaf-node hashes for storage.
///
/// `annotations` must parallel `log` entry for entry.
///
/// # Panics
///
/// Panics if the two slices differ in length; the tree layer produces them
/// together and a mismatch is a programming error.
pub fn hash_write_log(log: &WriteLog, annotations: &Annotations) -> HashedWriteLog {
    assert_eq!(
        log.len(),
        annotations.len(),
        "write log and annotations must be parallel"
    );
    log.iter()
        .zip(annotations.iter())
        .map(|(entry, ann)| HashedLogEntry {
            key: entry.key.clone(),
            inserted_hash: ann.inserted_node,
        })
        .collect()
}
