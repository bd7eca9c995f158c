//! Process-wide key material.
//!
//! [`KeyMaterial`] is the single source of signing and verification keys:
//! loaded once at startup from configured paths, then shared by reference
//! (typically `Arc<KeyMaterial>`). It is immutable after construction; key
//! rotation is represented only through the [`KeyId`] carried on every
//! signed record.

use std::path::Path;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{KeyPair, PublicKey};
use crate::signature::Signature;

/// Short key fingerprint: the first 8 bytes of the public key.
///
/// Persisted (hex-encoded) on every audit record so verifiers can tell which
/// key produced a signature once rotation exists.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 8 bytes.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        if bytes.len() != 8 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 8,
                actual: bytes.len(),
            });
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes);
        Ok(Self(id))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for KeyId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The key material a process runs with.
///
/// Two shapes exist:
/// - **signing**: private + public halves; can sign and verify.
/// - **verification-only**: public half only; [`KeyMaterial::sign`] fails.
///
/// Construction fails when the required material is absent, so a
/// misconfigured process never comes up half-working.
pub struct KeyMaterial {
    keypair: Option<KeyPair>,
    public_key: PublicKey,
}

impl KeyMaterial {
    /// Build signing material from a loaded key pair.
    #[must_use]
    pub fn signing(keypair: KeyPair) -> Self {
        let public_key = keypair.export_public_key();
        Self {
            keypair: Some(keypair),
            public_key,
        }
    }

    /// Build verification-only material from a public key.
    #[must_use]
    pub fn verify_only(public_key: PublicKey) -> Self {
        Self {
            keypair: None,
            public_key,
        }
    }

    /// Load key material from configured paths.
    ///
    /// - Private key path set: loads the pair; if a public key path is also
    ///   set, the stored public half must match the derived one.
    /// - Only a public key path set: verification-only material.
    /// - Neither set: configuration is unusable, load fails.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFileMissing`] for a configured-but-absent
    /// file, [`CryptoError::InvalidPublicKey`] when the stored public key
    /// does not match the private key, or [`CryptoError::SigningKeyUnavailable`]
    /// when no path is configured at all.
    pub fn load(
        private_key_path: Option<&Path>,
        public_key_path: Option<&Path>,
    ) -> CryptoResult<Self> {
        match (private_key_path, public_key_path) {
            (Some(private), public) => {
                let keypair = KeyPair::load_from_file(private)?;
                if let Some(public) = public {
                    let stored = PublicKey::load_from_file(public)?;
                    if stored != keypair.export_public_key() {
                        return Err(CryptoError::InvalidPublicKey(format!(
                            "public key at {} does not match private key at {}",
                            public.display(),
                            private.display()
                        )));
                    }
                }
                Ok(Self::signing(keypair))
            }
            (None, Some(public)) => Ok(Self::verify_only(PublicKey::load_from_file(public)?)),
            (None, None) => Err(CryptoError::SigningKeyUnavailable),
        }
    }

    /// Whether this material can produce signatures.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.keypair.is_some()
    }

    /// Sign a message.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningKeyUnavailable`] for verification-only material.
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        let keypair = self
            .keypair
            .as_ref()
            .ok_or(CryptoError::SigningKeyUnavailable)?;
        Ok(keypair.sign(message))
    }

    /// Verify a signature against the process public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureVerificationFailed`] if verification fails.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        self.public_key.verify(message, signature)
    }

    /// The public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The key ID carried on records signed with this material.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.public_key.key_id()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id())
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_material() {
        let material = KeyMaterial::signing(KeyPair::generate());
        assert!(material.can_sign());

        let sig = material.sign(b"message").unwrap();
        assert!(material.verify(b"message", &sig).is_ok());
        assert!(material.verify(b"other", &sig).is_err());
    }

    #[test]
    fn test_verify_only_material() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"message");

        let material = KeyMaterial::verify_only(keypair.export_public_key());
        assert!(!material.can_sign());
        assert!(material.verify(b"message", &sig).is_ok());
        assert!(matches!(
            material.sign(b"message"),
            Err(CryptoError::SigningKeyUnavailable)
        ));
    }

    #[test]
    fn test_key_id_matches_public_key() {
        let keypair = KeyPair::generate();
        let material = KeyMaterial::signing(keypair);
        assert_eq!(material.key_id(), material.public_key().key_id());
    }

    #[test]
    fn test_key_id_hex_roundtrip() {
        let id = KeyId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let restored = KeyId::from_hex(&id.to_string()).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_load_from_paths() {
        let dir = tempfile::tempdir().unwrap();
        let private = dir.path().join("audit.key");
        let public = dir.path().join("audit.pub");

        let kp = KeyPair::generate_to_file(&private).unwrap();
        kp.export_public_key().save_to_file(&public).unwrap();

        // Private only
        let material = KeyMaterial::load(Some(&private), None).unwrap();
        assert!(material.can_sign());

        // Private + matching public
        let material = KeyMaterial::load(Some(&private), Some(&public)).unwrap();
        assert!(material.can_sign());

        // Public only
        let material = KeyMaterial::load(None, Some(&public)).unwrap();
        assert!(!material.can_sign());

        // Neither
        assert!(matches!(
            KeyMaterial::load(None, None),
            Err(CryptoError::SigningKeyUnavailable)
        ));
    }

    #[test]
    fn test_load_rejects_mismatched_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let private = dir.path().join("audit.key");
        let public = dir.path().join("audit.pub");

        KeyPair::generate_to_file(&private).unwrap();
        // Write some other key's public half
        KeyPair::generate()
            .export_public_key()
            .save_to_file(&public)
            .unwrap();

        let result = KeyMaterial::load(Some(&private), Some(&public));
        assert!(matches!(result, Err(CryptoError::InvalidPublicKey(_))));
    }
}
