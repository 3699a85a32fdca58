//! Error taxonomy of the node database.

use crate::store::StoreError;
use sapwood_types::DecodeError;

/// Errors surfaced by the node database.
///
/// Every user-visible failure maps to one of these kinds; transient
/// backing-store errors are wrapped in [`Error::Store`] rather than leaking
/// backend internals as the primary kind. Structural corruption (missing
/// updated-nodes records for known roots, undecodeable metadata) is not
/// represented here; it panics, since continuing would compound the damage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Root's namespace does not match the engine's.
    #[error("node database: namespace does not match")]
    BadNamespace,

    /// Node key absent at the read timestamp.
    #[error("node database: node not found")]
    NodeNotFound,

    /// Root marker or roots-metadata entry missing.
    #[error("node database: root not found")]
    RootNotFound,

    /// No write-log path between the two roots, or write logs discarded.
    #[error("node database: write log not found")]
    WriteLogNotFound,

    /// The new root does not follow the declared old root.
    #[error("node database: root must follow old root")]
    RootMustFollowOld,

    /// The old root's version was already pruned.
    #[error("node database: previous version mismatch")]
    PreviousVersionMismatch,

    /// The version (or its predecessor) has not been finalized yet.
    #[error("node database: version not finalized")]
    NotFinalized,

    /// The version has already been finalized.
    #[error("node database: version already finalized")]
    AlreadyFinalized,

    /// Prune called on a version that is not the earliest.
    #[error("node database: version is not the earliest version")]
    NotEarliest,

    /// Prune would leave zero finalized versions.
    #[error("node database: cannot prune latest version")]
    CannotPruneLatestVersion,

    /// A multipart restore is active, or targets a conflicting version.
    #[error("node database: multipart insert already in progress")]
    MultipartInProgress,

    /// Multipart version is zero or does not match the active restore.
    #[error("node database: invalid multipart version")]
    InvalidMultipartVersion,

    /// Mutation attempted on a read-only database.
    #[error("node database: database is read-only")]
    ReadOnly,

    /// A migration marker is present; the database must be upgraded first.
    #[error("node database: database upgrade in progress")]
    UpgradeInProgress,

    /// Engine version mismatch at open.
    #[error("node database: incompatible database version (expected: {expected} got: {actual})")]
    IncompatibleVersion {
        /// The engine's compiled database version.
        expected: u64,
        /// The version stamped into the database.
        actual: u64,
    },

    /// Operation not available while importing checkpoint chunks.
    #[error("node database: operation not allowed in chunk mode")]
    ChunkModeNotAllowed,

    /// Finalize called with an empty root set.
    #[error("node database: need at least one root to finalize")]
    NoRootsToFinalize,

    /// Roots passed to finalize do not share a single version.
    #[error("node database: roots to finalize have mismatched versions")]
    FinalizeVersionMismatch,

    /// A stored node blob failed to decode.
    #[error("node database: failed to decode node: {0}")]
    MalformedNode(#[from] DecodeError),

    /// Transient backing-store failure.
    #[error("node database: backing store error: {0}")]
    Store(#[from] StoreError),
}
