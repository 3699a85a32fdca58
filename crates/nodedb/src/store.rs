//! The backing-store abstraction.
//!
//! The engine runs over any embedded key-value store that offers
//! managed-timestamp MVCC: every transaction and write batch is created at a
//! caller-chosen timestamp, and a reader at timestamp `ts` observes, per
//! key, the newest write committed at or below `ts`. Metadata lives at the
//! reserved [`TS_METADATA`](crate::TS_METADATA) timestamp, node and
//! write-log data at `version_to_ts(version)`.
//!
//! Implementations live in their own crates; `sapwood-store-memory`
//! provides the structurally-shared in-memory store used by tests and
//! simulation.

/// Error type for backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend error.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A snapshot read transaction at a fixed timestamp.
pub trait ReadTxn {
    /// Get the value stored under `key`, as visible at this transaction's
    /// timestamp.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Like [`ReadTxn::get`], additionally returning the commit timestamp of
    /// the observed item.
    fn get_with_ts(&self, key: &[u8]) -> Result<Option<(Vec<u8>, u64)>, StoreError>;

    /// Iterate all live entries whose key starts with `prefix`, in key
    /// order.
    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>;
}

/// A read-write transaction.
///
/// Reads observe the snapshot at the transaction's creation timestamp
/// merged with the transaction's own pending writes. Writes are buffered
/// until [`RwTxn::commit_at`]; dropping the transaction discards them.
pub trait RwTxn: ReadTxn {
    /// Buffer a write of `key -> value`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Buffer a deletion of `key`.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Atomically apply all buffered writes at commit timestamp `ts`.
    fn commit_at(self, ts: u64) -> Result<(), StoreError>;
}

/// A write batch bound to a default commit timestamp.
///
/// Batches do not read; they accumulate writes and apply them atomically on
/// [`WriteBatch::flush`]. Dropping an unflushed batch cancels it.
pub trait WriteBatch {
    /// Buffer a write of `key -> value` at the batch's timestamp.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Buffer a deletion of `key` at the batch's timestamp.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Buffer a deletion of `key` at an explicit timestamp.
    ///
    /// Used when a single batch must touch keyspaces living at different
    /// timestamps, e.g. multipart-restore log entries at the metadata
    /// timestamp alongside node deletions at a version timestamp.
    fn delete_at(&mut self, key: &[u8], ts: u64) -> Result<(), StoreError>;

    /// Atomically apply all buffered writes.
    fn flush(self) -> Result<(), StoreError>;
}

/// Handle to a running background garbage-collection worker.
pub trait GcWorker: Send {
    /// Stop the worker and wait for it to exit.
    fn stop(self: Box<Self>);
}

/// An embedded key-value store with managed-timestamp MVCC.
pub trait Store: Send + Sync + 'static {
    /// Snapshot read transactions.
    type ReadTxn<'a>: ReadTxn
    where
        Self: 'a;

    /// Read-write transactions.
    type RwTxn<'a>: RwTxn
    where
        Self: 'a;

    /// Write batches.
    type WriteBatch<'a>: WriteBatch
    where
        Self: 'a;

    /// Begin a snapshot read at timestamp `ts`.
    fn read_at(&self, ts: u64) -> Self::ReadTxn<'_>;

    /// Begin a read-write transaction reading at timestamp `ts`.
    ///
    /// The commit timestamp is chosen at commit time and may differ from
    /// the read timestamp.
    fn write_at(&self, ts: u64) -> Self::RwTxn<'_>;

    /// Create a write batch with default commit timestamp `ts`.
    fn write_batch_at(&self, ts: u64) -> Self::WriteBatch<'_>;

    /// Allow the store to discard versions invalidated at or below `ts`.
    fn set_discard_timestamp(&self, ts: u64);

    /// Start the background value-log GC worker.
    fn start_gc(&self) -> Box<dyn GcWorker>;

    /// Approximate on-disk size in bytes.
    fn size(&self) -> Result<u64, StoreError>;

    /// Flush pending writes to stable storage.
    fn sync(&self) -> Result<(), StoreError>;

    /// Close the store. Further operations are undefined.
    fn close(&self);
}
