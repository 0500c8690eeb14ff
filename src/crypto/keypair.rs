//! Subject and signer key pairs.
//!
//! A certificate key is exactly one of RSA, ECDSA over a named NIST curve, or
//! Ed25519. The set is closed, so it is modelled as an enum rather than a trait
//! object.

use crate::error::{GenCertError, LoadError, Result};
use const_oid::db::{rfc5912, rfc8410};
use const_oid::ObjectIdentifier;
use der::asn1::Any;
use der::{Decode, Encode};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, PrivateKeyInfo};
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use signature::hazmat::PrehashSigner;
use signature::{SignatureEncoding, Signer};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::fmt;
use std::str::FromStr;

/// Named curves accepted by the elliptic-curve selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    P224,
    P256,
    P384,
    P521,
}

impl EcdsaCurve {
    pub const ALL: [EcdsaCurve; 4] = [
        EcdsaCurve::P224,
        EcdsaCurve::P256,
        EcdsaCurve::P384,
        EcdsaCurve::P521,
    ];

    /// Selector string for this curve.
    pub fn name(&self) -> &'static str {
        match self {
            EcdsaCurve::P224 => "P224",
            EcdsaCurve::P256 => "P256",
            EcdsaCurve::P384 => "P384",
            EcdsaCurve::P521 => "P521",
        }
    }

    fn oid(&self) -> ObjectIdentifier {
        match self {
            EcdsaCurve::P224 => rfc5912::SECP_224_R_1,
            EcdsaCurve::P256 => rfc5912::SECP_256_R_1,
            EcdsaCurve::P384 => rfc5912::SECP_384_R_1,
            EcdsaCurve::P521 => rfc5912::SECP_521_R_1,
        }
    }

    fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        EcdsaCurve::ALL.into_iter().find(|curve| curve.oid() == oid)
    }
}

impl fmt::Display for EcdsaCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EcdsaCurve {
    type Err = GenCertError;

    fn from_str(s: &str) -> Result<Self> {
        EcdsaCurve::ALL
            .into_iter()
            .find(|curve| curve.name() == s)
            .ok_or_else(|| GenCertError::UnsupportedCurve(s.to_string()))
    }
}

/// The key algorithm chosen for a subject key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa { bits: usize },
    Ecdsa(EcdsaCurve),
    Ed25519,
}

impl KeyAlgorithm {
    /// Resolve the key algorithm from the configured selectors.
    ///
    /// A non-empty curve selector wins over the Ed25519 flag; with neither set
    /// an RSA key of `rsa_bits` is used. An unknown curve name is rejected
    /// before any key material is generated.
    pub fn select(curve: Option<&str>, ed25519: bool, rsa_bits: usize) -> Result<Self> {
        match curve.filter(|name| !name.is_empty()) {
            Some(name) => Ok(KeyAlgorithm::Ecdsa(name.parse()?)),
            None if ed25519 => Ok(KeyAlgorithm::Ed25519),
            None => Ok(KeyAlgorithm::Rsa { bits: rsa_bits }),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "RSA-{}", bits),
            KeyAlgorithm::Ecdsa(curve) => write!(f, "ECDSA-{}", curve),
            KeyAlgorithm::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

/// A private key of one of the supported algorithm families.
#[derive(Clone)]
pub enum KeyPair {
    Rsa(RsaPrivateKey),
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.algorithm())
    }
}

/// Generate a fresh key pair from the OS random source.
///
/// # Example
///
/// ```
/// use gencert::crypto::keypair::{generate_keypair, EcdsaCurve, KeyAlgorithm};
///
/// let keypair = generate_keypair(KeyAlgorithm::Ecdsa(EcdsaCurve::P256)).unwrap();
/// assert!(!keypair.is_rsa());
/// ```
pub fn generate_keypair(algorithm: KeyAlgorithm) -> Result<KeyPair> {
    let keypair = match algorithm {
        KeyAlgorithm::Rsa { bits } => KeyPair::Rsa(
            RsaPrivateKey::new(&mut OsRng, bits)
                .map_err(|e| GenCertError::KeyGeneration(e.to_string()))?,
        ),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P224) => KeyPair::P224(p224::SecretKey::random(&mut OsRng)),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P256) => KeyPair::P256(p256::SecretKey::random(&mut OsRng)),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P384) => KeyPair::P384(p384::SecretKey::random(&mut OsRng)),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P521) => KeyPair::P521(p521::SecretKey::random(&mut OsRng)),
        KeyAlgorithm::Ed25519 => KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
    };
    Ok(keypair)
}

impl KeyPair {
    /// The algorithm family of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa(key) => KeyAlgorithm::Rsa {
                bits: rsa::traits::PublicKeyParts::size(key) * 8,
            },
            KeyPair::P224(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P224),
            KeyPair::P256(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P256),
            KeyPair::P384(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P384),
            KeyPair::P521(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P521),
            KeyPair::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    /// Whether RSA-specific key usage bits (KeyEncipherment) apply.
    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyPair::Rsa(_))
    }

    /// The SubjectPublicKeyInfo for the public half of this key.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            KeyPair::Rsa(key) => RsaPublicKey::from(key).to_public_key_der(),
            KeyPair::P224(key) => key.public_key().to_public_key_der(),
            KeyPair::P256(key) => key.public_key().to_public_key_der(),
            KeyPair::P384(key) => key.public_key().to_public_key_der(),
            KeyPair::P521(key) => key.public_key().to_public_key_der(),
            KeyPair::Ed25519(key) => key.verifying_key().to_public_key_der(),
        }
        .map_err(|e| GenCertError::Signing(format!("Failed to encode public key: {}", e)))?;

        SubjectPublicKeyInfoOwned::from_der(document.as_bytes())
            .map_err(|e| GenCertError::Signing(format!("Failed to decode public key: {}", e)))
    }

    /// The signature algorithm used when this key signs a certificate.
    pub fn signature_algorithm(&self) -> AlgorithmIdentifierOwned {
        match self {
            KeyPair::Rsa(_) => AlgorithmIdentifierOwned {
                oid: rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
            KeyPair::P224(_) => ecdsa_algorithm(rfc5912::ECDSA_WITH_SHA_256),
            KeyPair::P256(_) => ecdsa_algorithm(rfc5912::ECDSA_WITH_SHA_256),
            KeyPair::P384(_) => ecdsa_algorithm(rfc5912::ECDSA_WITH_SHA_384),
            KeyPair::P521(_) => ecdsa_algorithm(rfc5912::ECDSA_WITH_SHA_512),
            KeyPair::Ed25519(_) => AlgorithmIdentifierOwned {
                oid: rfc8410::ID_ED_25519,
                parameters: None,
            },
        }
    }

    /// Sign `message`, returning the encoded signature value.
    ///
    /// ECDSA signatures are DER `Ecdsa-Sig-Value`s, as X.509 requires. P-224
    /// shares SHA-256 with P-256.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.try_sign(message)
            .map_err(|e| GenCertError::Signing(format!("Failed to sign: {}", e)))
    }

    fn try_sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, signature::Error> {
        match self {
            KeyPair::Rsa(key) => {
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                Ok(signer.try_sign(message)?.to_vec())
            }
            KeyPair::P224(key) => {
                // P-224 certificates are signed over a SHA-256 digest.
                let signature: p224::ecdsa::Signature =
                    p224::ecdsa::SigningKey::from(key).sign_prehash(&Sha256::digest(message))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::P256(key) => {
                let signature: p256::ecdsa::Signature =
                    p256::ecdsa::SigningKey::from(key).try_sign(message)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::P384(key) => {
                let signature: p384::ecdsa::Signature =
                    p384::ecdsa::SigningKey::from(key).try_sign(message)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::P521(key) => {
                let signer = p521::ecdsa::SigningKey::from_bytes(&key.to_bytes())?;
                let signature: p521::ecdsa::Signature = signer.try_sign(message)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519(key) => {
                let signature: ed25519_dalek::Signature = key.try_sign(message)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    /// Encode the private key as PKCS#8 DER, whatever its algorithm.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            KeyPair::Rsa(key) => key.to_pkcs8_der(),
            KeyPair::P224(key) => key.to_pkcs8_der(),
            KeyPair::P256(key) => key.to_pkcs8_der(),
            KeyPair::P384(key) => key.to_pkcs8_der(),
            KeyPair::P521(key) => key.to_pkcs8_der(),
            KeyPair::Ed25519(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| GenCertError::KeyEncoding(e.to_string()))?;

        Ok(document.as_bytes().to_vec())
    }

    /// Decode a PKCS#8 DER private key, dispatching on its algorithm identifier.
    pub fn from_pkcs8_der(der: &[u8]) -> std::result::Result<Self, LoadError> {
        let info = PrivateKeyInfo::try_from(der).map_err(|e| LoadError::Der(e.to_string()))?;
        let oid = info.algorithm.oid;

        let keypair = if oid == rfc5912::RSA_ENCRYPTION {
            RsaPrivateKey::from_pkcs8_der(der).map(KeyPair::Rsa)
        } else if oid == rfc5912::ID_EC_PUBLIC_KEY {
            let curve_oid = info
                .algorithm
                .parameters_oid()
                .map_err(|e| LoadError::Der(format!("missing curve parameters: {}", e)))?;
            match EcdsaCurve::from_oid(curve_oid) {
                Some(EcdsaCurve::P224) => p224::SecretKey::from_pkcs8_der(der).map(KeyPair::P224),
                Some(EcdsaCurve::P256) => p256::SecretKey::from_pkcs8_der(der).map(KeyPair::P256),
                Some(EcdsaCurve::P384) => p384::SecretKey::from_pkcs8_der(der).map(KeyPair::P384),
                Some(EcdsaCurve::P521) => p521::SecretKey::from_pkcs8_der(der).map(KeyPair::P521),
                None => {
                    return Err(LoadError::Der(format!(
                        "unsupported elliptic curve {}",
                        curve_oid
                    )))
                }
            }
        } else if oid == rfc8410::ID_ED_25519 {
            ed25519_dalek::SigningKey::from_pkcs8_der(der).map(KeyPair::Ed25519)
        } else {
            return Err(LoadError::Der(format!(
                "unsupported private key algorithm {}",
                oid
            )));
        };

        keypair.map_err(|e| LoadError::Der(e.to_string()))
    }
}

fn ecdsa_algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    }
}

/// DER-encode the SubjectPublicKeyInfo of `keypair`; used to compare keys.
pub fn public_key_der(keypair: &KeyPair) -> Result<Vec<u8>> {
    keypair
        .public_key_info()?
        .to_der()
        .map_err(|e| GenCertError::Signing(format!("Failed to encode public key: {}", e)))
}
