//! Shared test helpers for node database test suites.
//!
//! Provides a minimal concrete tree implementation of the
//! [`TreeNode`]/[`NodeCodec`] seam so the engine can be exercised without a
//! real Merkle tree: binary inner nodes over leaf key-value pairs, hashed
//! with blake3 over their encodings.

use sapwood_types::{DecodeError, Hash, NodeCodec, TreeNode};

const LEAF_TAG: u8 = 0x00;
const INNER_TAG: u8 = 0x01;

/// A test tree node: a leaf holding a key-value pair, or an inner node with
/// up to two children referenced by hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestNode {
    /// A leaf carrying a key-value pair.
    Leaf {
        /// The stored key.
        key: Vec<u8>,
        /// The stored value.
        value: Vec<u8>,
    },
    /// An inner node; a zero hash means the slot is empty.
    Inner {
        /// Left child hash.
        left: Hash,
        /// Right child hash.
        right: Hash,
    },
}

/// Build a leaf node.
pub fn leaf(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> TestNode {
    TestNode::Leaf {
        key: key.into(),
        value: value.into(),
    }
}

/// Build an inner node over two child hashes.
pub fn inner(left: Hash, right: Hash) -> TestNode {
    TestNode::Inner { left, right }
}

impl TreeNode for TestNode {
    fn hash(&self) -> Hash {
        Hash::digest(&self.encode())
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            TestNode::Leaf { key, value } => {
                let mut out = Vec::with_capacity(1 + 4 + key.len() + value.len());
                out.push(LEAF_TAG);
                out.extend_from_slice(&(key.len() as u32).to_be_bytes());
                out.extend_from_slice(key);
                out.extend_from_slice(value);
                out
            }
            TestNode::Inner { left, right } => {
                let mut out = Vec::with_capacity(1 + 2 * Hash::BYTES);
                out.push(INNER_TAG);
                out.extend_from_slice(left.as_bytes());
                out.extend_from_slice(right.as_bytes());
                out
            }
        }
    }

    fn children(&self) -> Vec<Hash> {
        match self {
            TestNode::Leaf { .. } => Vec::new(),
            TestNode::Inner { left, right } => [*left, *right]
                .into_iter()
                .filter(|h| !h.is_zero())
                .collect(),
        }
    }

    fn leaf_value(&self) -> Option<&[u8]> {
        match self {
            TestNode::Leaf { value, .. } => Some(value),
            TestNode::Inner { .. } => None,
        }
    }
}

/// Codec for [`TestNode`] encodings.
pub struct TestCodec;

impl NodeCodec for TestCodec {
    fn decode(&self, data: &[u8]) -> Result<Box<dyn TreeNode>, DecodeError> {
        match data.first() {
            Some(&LEAF_TAG) => {
                if data.len() < 5 {
                    return Err(DecodeError("truncated leaf".into()));
                }
                let key_len = u32::from_be_bytes(data[1..5].try_into().unwrap()) as usize;
                if data.len() < 5 + key_len {
                    return Err(DecodeError("truncated leaf key".into()));
                }
                Ok(Box::new(TestNode::Leaf {
                    key: data[5..5 + key_len].to_vec(),
                    value: data[5 + key_len..].to_vec(),
                }))
            }
            Some(&INNER_TAG) => {
                if data.len() != 1 + 2 * Hash::BYTES {
                    return Err(DecodeError("bad inner node length".into()));
                }
                Ok(Box::new(TestNode::Inner {
                    left: Hash::from_raw(&data[1..1 + Hash::BYTES]),
                    right: Hash::from_raw(&data[1 + Hash::BYTES..]),
                }))
            }
            Some(&tag) => Err(DecodeError(format!("unknown node tag {tag:#x}"))),
            None => Err(DecodeError("empty node encoding".into())),
        }
    }
}

/// Build a left-leaning tree over the given leaves.
///
/// Returns every node of the tree (leaves first) together with the root
/// hash. A single leaf is its own root.
pub fn build_tree(leaves: &[(&[u8], &[u8])]) -> (Vec<TestNode>, Hash) {
    assert!(!leaves.is_empty(), "build_tree needs at least one leaf");

    let mut nodes: Vec<TestNode> = leaves
        .iter()
        .map(|(key, value)| leaf(*key, *value))
        .collect();

    let mut root = nodes[0].hash();
    for i in 1..leaves.len() {
        let node = inner(root, nodes[i].hash());
        root = node.hash();
        nodes.push(node);
    }
    (nodes, root)
}
