//! Key encoding for the node database's storage namespaces.
//!
//! Every key starts with a one-byte tag; variable-length fields are
//! fixed-size (hashes, typed hashes) or big-endian integers so that the
//! encoding is byte-deterministic and prefix scans iterate in the intended
//! order.
//!
//! | Tag  | Key shape                                        | Value                     |
//! |------|--------------------------------------------------|---------------------------|
//! | 0x00 | `node(hash)`                                     | serialized node           |
//! | 0x01 | `writelog(version, new_root_th, old_root_th)`    | CBOR hashed write log     |
//! | 0x02 | `roots_metadata(version)`                        | CBOR roots metadata       |
//! | 0x03 | `root_updated_nodes(version, th)`                | CBOR updated-node list    |
//! | 0x04 | `metadata()`                                     | CBOR metadata record      |
//! | 0x05 | `multipart_log(th)`                              | empty                     |
//! | 0x06 | `root_node(th)`                                  | empty                     |
//! | 0x07 | `migration_metadata()`                           | owned by the upgrade path |

use sapwood_types::{Hash, TypedHash};

const NODE_TAG: u8 = 0x00;
const WRITE_LOG_TAG: u8 = 0x01;
const ROOTS_METADATA_TAG: u8 = 0x02;
const ROOT_UPDATED_NODES_TAG: u8 = 0x03;
const METADATA_TAG: u8 = 0x04;
const MULTIPART_LOG_TAG: u8 = 0x05;
const ROOT_NODE_TAG: u8 = 0x06;
const MIGRATION_METADATA_TAG: u8 = 0x07;

/// Key for a stored node blob.
pub fn node_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + Hash::BYTES);
    key.push(NODE_TAG);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Key for a stored hashed write log.
pub fn write_log_key(version: u64, new_root: &TypedHash, old_root: &TypedHash) -> Vec<u8> {
    let mut key = write_log_new_root_prefix(version, new_root);
    key.extend_from_slice(&old_root.to_bytes());
    key
}

/// Prefix matching every write log committed at `version`.
pub fn write_log_version_prefix(version: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8);
    key.push(WRITE_LOG_TAG);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

/// Prefix matching every write log at `version` that produced `new_root`.
pub fn write_log_new_root_prefix(version: u64, new_root: &TypedHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + 2 * TypedHash::BYTES);
    key.push(WRITE_LOG_TAG);
    key.extend_from_slice(&version.to_be_bytes());
    key.extend_from_slice(&new_root.to_bytes());
    key
}

/// Decode a write-log key into `(version, new_root, old_root)`.
pub fn decode_write_log_key(key: &[u8]) -> Option<(u64, TypedHash, TypedHash)> {
    if key.len() != 1 + 8 + 2 * TypedHash::BYTES || key[0] != WRITE_LOG_TAG {
        return None;
    }
    let version = u64::from_be_bytes(key[1..9].try_into().ok()?);
    let new_root = TypedHash::from_bytes(&key[9..9 + TypedHash::BYTES])?;
    let old_root = TypedHash::from_bytes(&key[9 + TypedHash::BYTES..])?;
    Some((version, new_root, old_root))
}

/// Key for a version's roots metadata.
pub fn roots_metadata_key(version: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8);
    key.push(ROOTS_METADATA_TAG);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

/// Key for the updated-node list of `(version, root)`.
pub fn root_updated_nodes_key(version: u64, root: &TypedHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + TypedHash::BYTES);
    key.push(ROOT_UPDATED_NODES_TAG);
    key.extend_from_slice(&version.to_be_bytes());
    key.extend_from_slice(&root.to_bytes());
    key
}

/// Key for the database metadata record.
pub fn metadata_key() -> Vec<u8> {
    vec![METADATA_TAG]
}

/// Key for a multipart-restore log entry.
pub fn multipart_log_key(th: &TypedHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + TypedHash::BYTES);
    key.push(MULTIPART_LOG_TAG);
    key.extend_from_slice(&th.to_bytes());
    key
}

/// Prefix matching every multipart-restore log entry.
pub fn multipart_log_prefix() -> Vec<u8> {
    vec![MULTIPART_LOG_TAG]
}

/// Decode a multipart-restore log key.
pub fn decode_multipart_log_key(key: &[u8]) -> Option<TypedHash> {
    if key.len() != 1 + TypedHash::BYTES || key[0] != MULTIPART_LOG_TAG {
        return None;
    }
    TypedHash::from_bytes(&key[1..])
}

/// Key for a root-existence marker.
pub fn root_node_key(th: &TypedHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + TypedHash::BYTES);
    key.push(ROOT_NODE_TAG);
    key.extend_from_slice(&th.to_bytes());
    key
}

/// Key for the migration-in-progress marker written by the upgrade tooling.
pub fn migration_metadata_key() -> Vec<u8> {
    vec![MIGRATION_METADATA_TAG]
}
