//! Chain hashing using BLAKE3.
//!
//! Every audit event's `this_hash` is a domain-separated BLAKE3 digest over
//! its canonical encoding; the all-zero [`ChainHash::genesis`] sentinel
//! anchors the first event of each tenant chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CryptoError, CryptoResult};

/// A BLAKE3 chain hash (32 bytes).
///
/// Links audit events into per-tenant chains: each event stores the hash of
/// its predecessor and its own recomputable hash. Hashes are hex-encoded
/// wherever they are persisted or displayed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainHash([u8; 32]);

impl ChainHash {
    /// Compute a domain-separated hash over a sequence of byte parts.
    ///
    /// The `context` string feeds BLAKE3 key derivation, so the same bytes
    /// hashed under different contexts never collide across uses.
    #[must_use]
    pub fn derive(context: &str, parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(context);
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// The genesis sentinel: the reserved `prev_hash` of a tenant's first event.
    #[must_use]
    pub const fn genesis() -> Self {
        Self([0u8; 32])
    }

    /// Check whether this is the genesis sentinel.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ChainHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for ChainHash {
    fn default() -> Self {
        Self::genesis()
    }
}

impl AsRef<[u8]> for ChainHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ChainHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<ChainHash> for [u8; 32] {
    fn from(hash: ChainHash) -> Self {
        hash.0
    }
}

/// Identifier of the digest algorithm used for chain hashes.
///
/// Persisted records do not carry this; it is pinned by configuration so a
/// verifier and a writer agree on the digest without negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 with a 256-bit output.
    #[default]
    Blake3,
}

impl HashAlgorithm {
    /// Canonical identifier string, as written in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blake3" => Ok(Self::Blake3),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_deterministic() {
        let a = ChainHash::derive("test.v1", &[b"hello", b" ", b"world"]);
        let b = ChainHash::derive("test.v1", &[b"hello", b" ", b"world"]);
        assert_eq!(a, b);

        assert_ne!(a, ChainHash::derive("test.v1", &[b"different"]));
    }

    #[test]
    fn test_domain_separation() {
        let data: &[&[u8]] = &[b"same data"];
        let h1 = ChainHash::derive("domain1", data);
        let h2 = ChainHash::derive("domain2", data);

        // Same data, different domains = different hashes
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_genesis() {
        let genesis = ChainHash::genesis();
        assert!(genesis.is_genesis());
        assert!(!ChainHash::derive("test.v1", &[b"data"]).is_genesis());
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = ChainHash::derive("test.v1", &[b"payload"]);
        let hex = hash.to_hex();
        let decoded = ChainHash::from_hex(&hex).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        assert!(ChainHash::from_hex("abcd").is_err());
        assert!(ChainHash::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_serde() {
        let hash = ChainHash::derive("test.v1", &[b"payload"]);
        let json = serde_json::to_string(&hash).unwrap();
        let decoded: ChainHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert!(matches!(
            "sha3".parse::<HashAlgorithm>(),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }
}
