//! Versioned, content-addressed Merkle node database.
//!
//! The engine stores the nodes of an authenticated tree across many
//! versions inside an embedded key-value store with managed-timestamp
//! MVCC transactions. On top of the raw node store it tracks, per version,
//! the set of committed roots and their derived-root lineage, synthesizes
//! write logs between roots by walking that lineage, finalizes versions
//! (discarding roots that lost the race and their exclusively-owned nodes),
//! prunes the earliest finalized version, and supports chunked checkpoint
//! restores with atomic rollback.
//!
//! # Architecture
//!
//! The engine is generic over the [`Store`] trait, which captures exactly
//! what it needs from the backing store: snapshot reads and read-write
//! transactions at caller-chosen timestamps, write batches, prefix
//! iteration, a discard-timestamp bound for MVCC garbage, and a background
//! value-log GC worker. `sapwood-store-memory` provides the in-memory
//! implementation used by tests and simulation.
//!
//! Merkle node structure stays opaque: the tree layer supplies a
//! [`NodeCodec`](sapwood_types::NodeCodec) used only to follow child
//! pointers while pruning and to pull leaf values when rehydrating write
//! logs.
//!
//! # Concurrency
//!
//! All metadata mutation is serialized by a single engine-wide lock; read
//! paths (`get_node`, `get_write_log`, `has_root`, version getters) never
//! take it and instead rely on MVCC snapshots at the appropriate version
//! timestamp.

#![warn(missing_docs)]

mod batch;
mod db;
mod error;
mod gc;
mod keys;
mod meta;
mod store;
mod writelog;

pub mod test_helpers;

pub use batch::Batch;
pub use db::{Config, NodeDb};
pub use error::Error;
pub use meta::DB_VERSION;
pub use store::{GcWorker, ReadTxn, RwTxn, Store, StoreError, WriteBatch};
pub use writelog::WriteLogIterator;

/// The multipart-version value meaning "no restore in progress".
pub const MULTIPART_VERSION_NONE: u64 = 0;

/// The reserved backing-store timestamp for all metadata writes.
///
/// Strictly below every version timestamp so that metadata committed here is
/// visible to snapshots at any version.
pub const TS_METADATA: u64 = 1;

/// The backing-store timestamp for data committed at `version`.
pub fn version_to_ts(version: u64) -> u64 {
    version + 2
}

/// Inverse of [`version_to_ts`].
pub fn ts_to_version(ts: u64) -> u64 {
    ts - 2
}
