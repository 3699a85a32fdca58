//! Core types for the sapwood node database.
//!
//! This crate provides the foundational types shared by the storage engine
//! and its consumers:
//!
//! - **Primitives**: `Hash` (blake3 content hash), `Namespace`
//! - **Roots**: `Root`, `RootType`, `TypedHash` (the root fingerprint)
//! - **Tree seams**: `TreeNode` / `NodeCodec` traits and `NodePointer`
//! - **Write logs**: `WriteLog`, `Annotations` and their hashed on-disk form
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. The engine
//! never interprets Merkle node structure directly; everything it needs goes
//! through the `TreeNode`/`NodeCodec` seam defined here.

#![warn(missing_docs)]

mod hash;
mod node;
mod root;
mod writelog;

pub use hash::{Hash, ParseHashError};
pub use node::{DecodeError, NodeCodec, NodePointer, TreeNode};
pub use root::{Namespace, Root, RootType, TypedHash};
pub use writelog::{
    hash_write_log, Annotations, HashedLogEntry, HashedWriteLog, LogEntry, LogEntryAnnotation,
    WriteLog,
};
