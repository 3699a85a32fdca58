//! The seam between the node database and the tree layer.
//!
//! The engine stores Merkle nodes as opaque blobs keyed by content hash. The
//! only structural knowledge it ever needs (child hashes for pruning
//! traversals, leaf values for write-log rehydration) comes through the
//! traits here, supplied by the tree layer at configuration time.

use crate::hash::Hash;

/// A pointer to a tree node.
///
/// A pointer is *clean* when the node it references has been committed and
/// its hash is final. The engine only ever dereferences clean pointers;
/// passing a dirty one is a programming error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodePointer {
    /// Content hash of the referenced node.
    pub hash: Hash,
    /// Whether the referenced node is committed and hashed.
    pub clean: bool,
}

impl NodePointer {
    /// A clean pointer to the node with the given hash.
    pub fn new(hash: Hash) -> Self {
        Self { hash, clean: true }
    }
}

/// A decoded Merkle tree node.
///
/// Implemented by the tree layer; the engine treats nodes as opaque except
/// for the three accessors below.
pub trait TreeNode: Send + Sync {
    /// Content hash of the node's encoding.
    fn hash(&self) -> Hash;

    /// Deterministic binary encoding of the node.
    fn encode(&self) -> Vec<u8>;

    /// Hashes of the node's children, empty for leaves.
    fn children(&self) -> Vec<Hash>;

    /// The stored value if this is a leaf node.
    fn leaf_value(&self) -> Option<&[u8]>;
}

/// Decoder for stored node blobs, supplied by the tree layer.
pub trait NodeCodec: Send + Sync {
    /// Decode a stored blob into a tree node.
    fn decode(&self, data: &[u8]) -> Result<Box<dyn TreeNode>, DecodeError>;
}

/// A node blob could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed node encoding: {0}")]
pub struct DecodeError(pub String);
