//! Root identifiers and fingerprints.

use crate::hash::Hash;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 32-byte opaque namespace identifier.
///
/// Every engine instance is bound to a single namespace; roots carrying any
/// other namespace are rejected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Namespace([u8; 32]);

impl Namespace {
    /// Size of a namespace identifier in bytes.
    pub const BYTES: usize = 32;

    /// Create a namespace from raw bytes.
    pub fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes as slice reference.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({}..)", &hex::encode(self.0)[..8])
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct NamespaceVisitor;

impl<'de> Visitor<'de> for NamespaceVisitor {
    type Value = Namespace;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 32-byte namespace")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Namespace, E> {
        if v.len() != Namespace::BYTES {
            return Err(E::invalid_length(v.len(), &self));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(v);
        Ok(Namespace(arr))
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(NamespaceVisitor)
    }
}

/// The kind of tree a root commits to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
#[repr(u8)]
pub enum RootType {
    /// Not a tree root; used to tag plain node entries in restore logs.
    #[default]
    Invalid = 0,
    /// A state tree root.
    State = 1,
    /// An I/O tree root.
    Io = 2,
}

impl RootType {
    /// Decode from the on-disk tag byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Invalid),
            1 => Some(Self::State),
            2 => Some(Self::Io),
            _ => None,
        }
    }
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "invalid",
            Self::State => "state",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

/// A root of the authenticated tree at a given version.
///
/// A root with a zero hash denotes the well-known empty tree; it is
/// implicitly present in every version and never physically stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Root {
    /// Namespace the root belongs to.
    pub namespace: Namespace,
    /// Version the root was committed at.
    pub version: u64,
    /// Kind of tree the root commits to.
    pub root_type: RootType,
    /// Content hash of the root node.
    pub hash: Hash,
}

impl Root {
    /// Create a new root.
    pub fn new(namespace: Namespace, version: u64, root_type: RootType, hash: Hash) -> Self {
        Self {
            namespace,
            version,
            root_type,
            hash,
        }
    }

    /// The empty root for the given namespace, version and type.
    pub fn empty(namespace: Namespace, version: u64, root_type: RootType) -> Self {
        Self::new(namespace, version, root_type, Hash::ZERO)
    }

    /// Whether this root denotes the empty tree.
    pub fn is_empty(&self) -> bool {
        self.hash.is_zero()
    }

    /// Whether this root can follow `old` in commit lineage.
    ///
    /// The empty tree precedes everything in its namespace; otherwise the
    /// types must match and the old version must not be newer.
    pub fn follows(&self, old: &Root) -> bool {
        if self.namespace != old.namespace {
            return false;
        }
        if old.hash.is_zero() {
            return true;
        }
        self.root_type == old.root_type && old.version <= self.version
    }

    /// The fingerprint `(type, hash)` identifying this root in metadata.
    pub fn typed_hash(&self) -> TypedHash {
        TypedHash::new(self.root_type, self.hash)
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}@{}",
            self.namespace, self.root_type, self.hash, self.version
        )
    }
}

/// A root fingerprint: the `(type, hash)` pair identifying a root within a
/// version, independent of namespace and version.
///
/// Serializes as a 33-byte CBOR byte string (1 type byte + 32 hash bytes) so
/// it can key maps and embed into scan-ordered storage keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypedHash {
    root_type: RootType,
    hash: Hash,
}

impl TypedHash {
    /// Encoded size in bytes.
    pub const BYTES: usize = 1 + Hash::BYTES;

    /// Create a fingerprint from its parts.
    pub fn new(root_type: RootType, hash: Hash) -> Self {
        Self { root_type, hash }
    }

    /// The root type component.
    pub fn root_type(&self) -> RootType {
        self.root_type
    }

    /// The hash component.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Encode into the fixed 33-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        out[0] = self.root_type as u8;
        out[1..].copy_from_slice(self.hash.as_bytes());
        out
    }

    /// Decode from the fixed 33-byte on-disk form.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != Self::BYTES {
            return None;
        }
        Some(Self {
            root_type: RootType::from_u8(data[0])?,
            hash: Hash::from_raw(&data[1..]),
        })
    }
}

impl fmt::Debug for TypedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedHash({}:{:?})", self.root_type, self.hash)
    }
}

impl fmt::Display for TypedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root_type, self.hash)
    }
}

impl Serialize for TypedHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

struct TypedHashVisitor;

impl<'de> Visitor<'de> for TypedHashVisitor {
    type Value = TypedHash;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 33-byte typed hash")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<TypedHash, E> {
        TypedHash::from_bytes(v)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Bytes(v), &self))
    }
}

impl<'de> Deserialize<'de> for TypedHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(TypedHashVisitor)
    }
}
