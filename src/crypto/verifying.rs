//! Signature checks against a certificate's public key.

use const_oid::db::{rfc5912, rfc8410};
use der::referenced::OwnedToRef;
use der::Encode;
use pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::hazmat::PrehashVerifier;
use signature::Verifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

/// A public key taken from a SubjectPublicKeyInfo.
pub enum VerifyingKey {
    Rsa(RsaPublicKey),
    P224(p224::ecdsa::VerifyingKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl VerifyingKey {
    /// Decode the public key carried by `spki`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self, String> {
        let oid = spki.algorithm.oid;
        let point = spki.subject_public_key.raw_bytes();

        if oid == rfc5912::RSA_ENCRYPTION {
            let der = spki
                .to_der()
                .map_err(|e| format!("failed to encode public key: {}", e))?;
            return RsaPublicKey::from_public_key_der(&der)
                .map(VerifyingKey::Rsa)
                .map_err(|e| format!("invalid RSA public key: {}", e));
        }

        if oid == rfc8410::ID_ED_25519 {
            return ed25519_dalek::VerifyingKey::try_from(point)
                .map(VerifyingKey::Ed25519)
                .map_err(|e| format!("invalid Ed25519 public key: {}", e));
        }

        if oid != rfc5912::ID_EC_PUBLIC_KEY {
            return Err(format!("unsupported public key algorithm {}", oid));
        }

        let curve = spki
            .algorithm
            .owned_to_ref()
            .parameters_oid()
            .map_err(|e| format!("missing curve parameters: {}", e))?;
        let key = match curve {
            c if c == rfc5912::SECP_224_R_1 => {
                p224::ecdsa::VerifyingKey::from_sec1_bytes(point).map(VerifyingKey::P224)
            }
            c if c == rfc5912::SECP_256_R_1 => {
                p256::ecdsa::VerifyingKey::from_sec1_bytes(point).map(VerifyingKey::P256)
            }
            c if c == rfc5912::SECP_384_R_1 => {
                p384::ecdsa::VerifyingKey::from_sec1_bytes(point).map(VerifyingKey::P384)
            }
            c if c == rfc5912::SECP_521_R_1 => {
                p521::ecdsa::VerifyingKey::from_sec1_bytes(point).map(VerifyingKey::P521)
            }
            other => return Err(format!("unsupported elliptic curve {}", other)),
        };
        key.map_err(|e| format!("invalid ECDSA public key: {}", e))
    }

    /// Check `signature` over `message` using the given signature algorithm.
    ///
    /// The algorithm must be the one this key type produces; anything else is
    /// rejected rather than guessed at.
    pub fn verify(
        &self,
        algorithm: &AlgorithmIdentifierOwned,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let oid = algorithm.oid;
        let result = match self {
            VerifyingKey::Rsa(key) if oid == rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| format!("malformed RSA signature: {}", e))?;
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone()).verify(message, &signature)
            }
            VerifyingKey::P224(key) if oid == rfc5912::ECDSA_WITH_SHA_256 => {
                let signature = p224::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("malformed ECDSA signature: {}", e))?;
                key.verify_prehash(&Sha256::digest(message), &signature)
            }
            VerifyingKey::P256(key) if oid == rfc5912::ECDSA_WITH_SHA_256 => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("malformed ECDSA signature: {}", e))?;
                key.verify(message, &signature)
            }
            VerifyingKey::P384(key) if oid == rfc5912::ECDSA_WITH_SHA_384 => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("malformed ECDSA signature: {}", e))?;
                key.verify(message, &signature)
            }
            VerifyingKey::P521(key) if oid == rfc5912::ECDSA_WITH_SHA_512 => {
                let signature = p521::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("malformed ECDSA signature: {}", e))?;
                key.verify(message, &signature)
            }
            VerifyingKey::Ed25519(key) if oid == rfc8410::ID_ED_25519 => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|e| format!("malformed Ed25519 signature: {}", e))?;
                key.verify(message, &signature)
            }
            _ => {
                return Err(format!(
                    "signature algorithm {} does not match the issuer key",
                    oid
                ))
            }
        };

        result.map_err(|_| "signature verification failed".to_string())
    }
}
