//! # In-Memory Store
//!
//! In-memory implementation of the node database's backing-store trait,
//! used for deterministic tests and simulation.
//!
//! Uses `im::OrdMap` for O(1) structural-sharing clones, so snapshot
//! transactions are cheap regardless of data size, and keeps a small
//! version chain per key to provide the managed-timestamp MVCC semantics
//! the engine relies on.

#![warn(missing_docs)]

mod store;

pub use store::{MemoryGcWorker, MemoryReadTxn, MemoryRwTxn, MemoryStore, MemoryWriteBatch};
