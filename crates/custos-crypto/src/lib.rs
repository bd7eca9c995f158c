//! Custos Crypto - Cryptographic primitives for the tamper-evident audit trail.
//!
//! This crate provides:
//! - Ed25519 key pairs with secure memory handling
//! - Signatures over chain-linked event hashes
//! - BLAKE3 hashing with domain separation for audit chains
//! - [`KeyMaterial`], the single process-wide key loaded at startup
//!
//! # Security Model
//!
//! One asymmetric key pair per process, loaded once from configuration and
//! shared by reference. A signing deployment holds the private key; a
//! verification-only deployment holds just the public half. Every signed
//! record carries the 8-byte [`KeyId`] of the key that produced it, so key
//! rotation stays representable without any rotation logic living here.
//!
//! # Example
//!
//! ```
//! use custos_crypto::{ChainHash, KeyMaterial, KeyPair};
//!
//! let material = KeyMaterial::signing(KeyPair::generate());
//!
//! let hash = ChainHash::derive("example.v1", &[b"payload"]);
//! let signature = material.sign(hash.as_bytes()).unwrap();
//!
//! assert!(material.verify(hash.as_bytes(), &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;
mod keypair;
mod material;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::{ChainHash, HashAlgorithm};
pub use keypair::{KeyPair, PublicKey};
pub use material::{KeyId, KeyMaterial};
pub use signature::Signature;
