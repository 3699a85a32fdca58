//! Persistent metadata records.
//!
//! Two record shapes live at the metadata timestamp: the singleton database
//! metadata (engine version, namespace, version watermarks, multipart
//! state) and the per-version roots metadata mapping each committed root
//! fingerprint to the roots derived from it within the same version.

use crate::error::Error;
use crate::keys;
use crate::store::{ReadTxn, RwTxn};
use parking_lot::RwLock;
use sapwood_types::{Hash, Namespace, TypedHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The database schema version stamped into the metadata record.
///
/// A mismatch at open time means the database was produced by a different
/// engine generation and must go through the migration path first.
pub const DB_VERSION: u64 = 5;

/// The serialized form of the singleton metadata record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct MetadataValue {
    /// Database schema version.
    pub version: u64,
    /// Namespace the database is bound to.
    pub namespace: Namespace,
    /// Earliest version with queryable data.
    pub earliest_version: u64,
    /// Last finalized version, if any version has been finalized yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finalized_version: Option<u64>,
    /// Version of the in-progress multipart restore, zero when none.
    #[serde(default)]
    pub multipart_version: u64,
}

/// The singleton metadata record with its own reader lock.
///
/// Read accessors take only the inner lock so that snapshot read paths can
/// consult version watermarks without contending on the engine-wide
/// metadata lock. Mutators additionally persist the record through the
/// caller's transaction; callers hold the engine metadata lock.
pub(crate) struct Metadata {
    value: RwLock<MetadataValue>,
}

impl Metadata {
    pub fn new(value: MetadataValue) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn earliest_version(&self) -> u64 {
        self.value.read().earliest_version
    }

    pub fn last_finalized_version(&self) -> Option<u64> {
        self.value.read().last_finalized_version
    }

    pub fn multipart_version(&self) -> u64 {
        self.value.read().multipart_version
    }

    pub fn set_earliest_version<T: RwTxn>(&self, txn: &mut T, version: u64) -> Result<(), Error> {
        let mut value = self.value.write();
        // The earliest version can only move forward.
        if version < value.earliest_version {
            return Ok(());
        }
        value.earliest_version = version;
        Self::save(&value, txn)
    }

    pub fn set_last_finalized_version<T: RwTxn>(
        &self,
        txn: &mut T,
        version: u64,
    ) -> Result<(), Error> {
        let mut value = self.value.write();
        if let Some(last) = value.last_finalized_version {
            if version <= last {
                return Ok(());
            }
        }
        // The first finalized version also becomes the earliest one.
        if value.last_finalized_version.is_none() {
            value.earliest_version = version;
        }
        value.last_finalized_version = Some(version);
        Self::save(&value, txn)
    }

    pub fn set_multipart_version<T: RwTxn>(&self, txn: &mut T, version: u64) -> Result<(), Error> {
        let mut value = self.value.write();
        value.multipart_version = version;
        Self::save(&value, txn)
    }

    pub fn save<T: RwTxn>(value: &MetadataValue, txn: &mut T) -> Result<(), Error> {
        let data = serde_cbor::to_vec(value).expect("metadata encoding must succeed");
        txn.set(&keys::metadata_key(), &data)?;
        Ok(())
    }
}

/// Per-version map from a root fingerprint to the roots derived from it.
///
/// A root whose derived list is empty is a lone root: nothing committed on
/// top of it within its version.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RootsMetadata {
    /// Version this record belongs to; not serialized, implied by the key.
    #[serde(skip)]
    pub version: u64,
    /// Root fingerprint -> derived root fingerprints.
    pub roots: HashMap<TypedHash, Vec<TypedHash>>,
}

impl RootsMetadata {
    /// Load the roots metadata for `version`, creating an empty record if
    /// none is stored yet.
    ///
    /// # Panics
    ///
    /// Panics if a stored record fails to decode; that is structural
    /// corruption, not an operational error.
    pub fn load_or_init<T: ReadTxn + ?Sized>(txn: &T, version: u64) -> Result<Self, Error> {
        match txn.get(&keys::roots_metadata_key(version))? {
            None => Ok(Self {
                version,
                roots: HashMap::new(),
            }),
            Some(data) => {
                let mut meta: Self = serde_cbor::from_slice(&data).unwrap_or_else(|err| {
                    panic!("node database: corrupted roots metadata for version {version}: {err}")
                });
                meta.version = version;
                Ok(meta)
            }
        }
    }

    /// Persist the record through the given transaction.
    pub fn save<T: RwTxn>(&self, txn: &mut T) -> Result<(), Error> {
        let data = serde_cbor::to_vec(self).expect("roots metadata encoding must succeed");
        txn.set(&keys::roots_metadata_key(self.version), &data)?;
        Ok(())
    }
}

/// A node inserted or logically removed by the batch that produced a root.
///
/// Retained per `(version, root)` until the version is finalized, at which
/// point the lists decide which nodes became lone and can be deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UpdatedNode {
    /// Whether the node was logically removed rather than inserted.
    #[serde(default)]
    pub removed: bool,
    /// Content hash of the node.
    pub hash: Hash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapwood_types::RootType;

    #[test]
    fn test_metadata_value_roundtrip() {
        let value = MetadataValue {
            version: DB_VERSION,
            namespace: Namespace::from_raw([7; 32]),
            earliest_version: 3,
            last_finalized_version: Some(9),
            multipart_version: 0,
        };
        let bytes = serde_cbor::to_vec(&value).unwrap();
        let decoded: MetadataValue = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded.version, value.version);
        assert_eq!(decoded.namespace, value.namespace);
        assert_eq!(decoded.earliest_version, 3);
        assert_eq!(decoded.last_finalized_version, Some(9));
        assert_eq!(decoded.multipart_version, 0);
    }

    #[test]
    fn test_metadata_value_optional_fields() {
        // A record written before any finalization decodes with None.
        let value = MetadataValue {
            version: DB_VERSION,
            namespace: Namespace::from_raw([1; 32]),
            earliest_version: 0,
            last_finalized_version: None,
            multipart_version: 0,
        };
        let bytes = serde_cbor::to_vec(&value).unwrap();
        let decoded: MetadataValue = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded.last_finalized_version, None);
    }

    #[test]
    fn test_roots_metadata_roundtrip() {
        let parent = TypedHash::new(RootType::State, Hash::digest(b"parent"));
        let child = TypedHash::new(RootType::State, Hash::digest(b"child"));
        let mut roots = HashMap::new();
        roots.insert(parent, vec![child]);
        roots.insert(child, vec![]);

        let meta = RootsMetadata { version: 4, roots };
        let bytes = serde_cbor::to_vec(&meta).unwrap();
        let decoded: RootsMetadata = serde_cbor::from_slice(&bytes).unwrap();
        // Version is implied by the storage key, not the payload.
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.roots, meta.roots);
    }

    #[test]
    fn test_updated_node_roundtrip() {
        let nodes = vec![
            UpdatedNode {
                removed: false,
                hash: Hash::digest(b"a"),
            },
            UpdatedNode {
                removed: true,
                hash: Hash::digest(b"b"),
            },
        ];
        let bytes = serde_cbor::to_vec(&nodes).unwrap();
        let decoded: Vec<UpdatedNode> = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, nodes);
    }
}
