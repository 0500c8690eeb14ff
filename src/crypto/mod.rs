//! Cryptographic operations module.
//!
//! Key generation, PKCS#8 encoding, signing and signature checks for the
//! three supported algorithm families:
//!
//! - RSA (PKCS#1 v1.5 with SHA-256)
//! - ECDSA over P-224, P-256, P-384 and P-521
//! - Ed25519
//!
//! # Example
//!
//! ```rust
//! use gencert::crypto::keypair::{generate_keypair, KeyAlgorithm};
//! use gencert::crypto::verifying::VerifyingKey;
//!
//! # fn example() -> gencert::error::Result<()> {
//! let keypair = generate_keypair(KeyAlgorithm::Ed25519)?;
//! let signature = keypair.sign(b"hello")?;
//!
//! let verifier = VerifyingKey::from_spki(&keypair.public_key_info()?).unwrap();
//! assert!(verifier
//!     .verify(&keypair.signature_algorithm(), b"hello", &signature)
//!     .is_ok());
//! # Ok(())
//! # }
//! ```

pub mod keypair;
pub mod verifying;
