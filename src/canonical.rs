//! Canonical encoding and uniform hashing
//!
//! All persisted records use canonical JSON: UTF-8, sorted object keys,
//! compact separators, trailing LF. All digests come from a single SHA-256
//! with a u32-BE length tag before every field, so no two field sequences
//! can collide by concatenation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::Path;

use crate::{EnochianError, Result};

/// 256-bit digest rendered as lowercase hex in JSON.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from lowercase hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| EnochianError::InvalidDigest {
            value: s.to_string(),
        })?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EnochianError::InvalidDigest {
                value: s.to_string(),
            })?;
        Ok(Digest(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher that length-tags every field.
pub struct FieldHasher {
    inner: Sha256,
}

impl FieldHasher {
    /// Start a fresh hash.
    pub fn new() -> Self {
        FieldHasher {
            inner: Sha256::new(),
        }
    }

    /// Append one field, prefixed with its u32-BE byte length.
    pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update((bytes.len() as u32).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    /// Finish and return the digest.
    pub fn finish(self) -> Digest {
        Digest(self.inner.finalize().into())
    }
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash an ordered field sequence in one call.
pub fn hash_fields(fields: &[&[u8]]) -> Digest {
    let mut hasher = FieldHasher::new();
    for field in fields {
        hasher.field(field);
    }
    hasher.finish()
}

/// Encode a record as canonical JSON bytes.
///
/// Routing through `serde_json::Value` sorts object keys (the underlying map
/// is a BTreeMap); the compact writer plus trailing LF fixes the rest of the
/// byte layout.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)?;
    let mut bytes = serde_json::to_vec(&tree)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a record from canonical JSON bytes.
pub fn from_canonical_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode and prove the bytes were canonical: re-encoding must reproduce the
/// input exactly, otherwise the record is rejected before it enters the core.
pub fn decode_verified<T: Serialize + DeserializeOwned>(bytes: &[u8], origin: &Path) -> Result<T> {
    let value: T = from_canonical_json(bytes)?;
    let reencoded = to_canonical_json(&value)?;
    if reencoded != bytes {
        return Err(EnochianError::CanonicalEncodingMismatch {
            origin: origin.display().to_string(),
        });
    }
    Ok(value)
}

/// Digest of a record's canonical encoding.
pub fn digest_of<T: Serialize>(value: &T) -> Result<Digest> {
    let bytes = to_canonical_json(value)?;
    Ok(hash_fields(&[&bytes]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sorted_keys_and_trailing_lf() {
        let mut map = BTreeMap::new();
        map.insert("zeta".to_string(), 1u32);
        map.insert("alpha".to_string(), 2u32);
        let bytes = to_canonical_json(&map).unwrap();
        assert_eq!(bytes, b"{\"alpha\":2,\"zeta\":1}\n");
    }

    #[test]
    fn test_length_tags_prevent_concatenation_ambiguity() {
        let a = hash_fields(&[b"ab", b"c"]);
        let b = hash_fields(&[b"a", b"bc"]);
        let c = hash_fields(&[b"abc"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_round_trip_rejects_non_canonical() {
        #[derive(Serialize, serde::Deserialize, Debug)]
        struct Rec {
            name: String,
            tier: u8,
        }
        // Pretty-printed input decodes fine but is not canonical.
        let sloppy = b"{\n  \"name\": \"TEX\",\n  \"tier\": 1\n}\n";
        let err = decode_verified::<Rec>(sloppy, Path::new("aethyrs.json")).unwrap_err();
        assert!(matches!(
            err,
            EnochianError::CanonicalEncodingMismatch { .. }
        ));

        let canonical = to_canonical_json(&Rec {
            name: "TEX".into(),
            tier: 1,
        })
        .unwrap();
        assert!(decode_verified::<Rec>(&canonical, Path::new("aethyrs.json")).is_ok());
    }

    #[test]
    fn test_digest_hex_round_trip() {
        let digest = hash_fields(&[b"enochian"]);
        let parsed = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, parsed);
    }
}
