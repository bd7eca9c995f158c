//! Prelude module - commonly used types for convenient import.
//!
//! Use `use custos_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Hashing
pub use crate::{ChainHash, HashAlgorithm};

// Keys and signatures
pub use crate::{KeyId, KeyMaterial, KeyPair, PublicKey, Signature};
