//! Cryptographic hash type using Blake3.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte cryptographic content hash using Blake3.
///
/// The zero hash is reserved: it denotes the well-known empty tree, which is
/// implicitly present in every version and never physically stored.
///
/// Serializes as a CBOR byte string so on-disk records stay compact and
/// byte-deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Size of hash in bytes.
    pub const BYTES: usize = 32;

    /// Zero hash (all bytes are 0x00). Denotes the empty tree.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash the given bytes with Blake3.
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap raw digest bytes without hashing them.
    ///
    /// # Panics
    ///
    /// Panics unless `bytes` is exactly 32 bytes long.
    pub fn from_raw(bytes: &[u8]) -> Self {
        let arr: [u8; 32] = bytes.try_into().expect("raw hash must be 32 bytes");
        Self(arr)
    }

    /// Borrow the digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy the digest out as an array.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether this is the zero hash (the empty-tree sentinel).
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, ParseHashError> {
        if s.len() != 2 * Self::BYTES {
            return Err(ParseHashError::BadLength(s.len()));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|_| ParseHashError::NotHex)?;
        Ok(Self(out))
    }
}

/// Failure to parse a [`Hash`] from its hex rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHashError {
    /// The input does not have 64 hex digits.
    #[error("hash hex must be 64 characters, not {0}")]
    BadLength(usize),

    /// The input contains characters outside `[0-9a-fA-F]`.
    #[error("hash hex contains non-hex characters")]
    NotHex,
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct HashVisitor;

impl<'de> Visitor<'de> for HashVisitor {
    type Value = Hash;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 32-byte hash")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Hash, E> {
        if v.len() != Hash::BYTES {
            return Err(E::invalid_length(v.len(), &self));
        }
        Ok(Hash::from_raw(v))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Hash, A::Error> {
        // Some encoders emit byte strings as integer sequences.
        let mut arr = [0u8; 32];
        for (i, slot) in arr.iter_mut().enumerate() {
            *slot = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        if seq.next_element::<u8>()?.is_some() {
            return Err(de::Error::invalid_length(33, &self));
        }
        Ok(Hash(arr))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(HashVisitor)
    }
}
