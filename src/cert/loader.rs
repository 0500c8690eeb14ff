//! Certificate and private key loading from PEM files.
//!
//! Certificates are read from the first `CERTIFICATE` block and keys from the
//! first `PRIVATE KEY` (PKCS#8) block of a file. Blocks with labels that are
//! not recognised at all are skipped; a recognised block of the wrong kind is
//! an error.

use crate::crypto::keypair::KeyPair;
use crate::error::LoadError;
use der::Decode;
use rustls_pemfile::Item;
use std::io::Cursor;
use std::path::Path;
use x509_cert::Certificate;

const CERTIFICATE_BLOCK: &str = "CERTIFICATE";
const PRIVATE_KEY_BLOCK: &str = "PRIVATE KEY";

fn item_label(item: &Item) -> &'static str {
    match item {
        Item::X509Certificate(_) => CERTIFICATE_BLOCK,
        Item::Pkcs8Key(_) => PRIVATE_KEY_BLOCK,
        Item::Pkcs1Key(_) => "RSA PRIVATE KEY",
        Item::Sec1Key(_) => "EC PRIVATE KEY",
        Item::Crl(_) => "X509 CRL",
        Item::Csr(_) => "CERTIFICATE REQUEST",
        _ => "unknown",
    }
}

fn first_item(pem_str: &str, expected: &'static str) -> Result<Item, LoadError> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    rustls_pemfile::read_one(&mut cursor)
        .map_err(|e| LoadError::PemDecode(format!("Failed to read PEM: {}", e)))?
        .ok_or(LoadError::MissingBlock(expected))
}

/// Parse the first certificate in a PEM string.
///
/// # Example
///
/// ```
/// use gencert::cert::loader::load_certificate_from_pem;
///
/// assert!(load_certificate_from_pem("not a valid pem").is_err());
/// ```
pub fn load_certificate_from_pem(pem_str: &str) -> Result<Certificate, LoadError> {
    match first_item(pem_str, CERTIFICATE_BLOCK)? {
        Item::X509Certificate(cert_der) => {
            Certificate::from_der(cert_der.as_ref()).map_err(|e| LoadError::Der(e.to_string()))
        }
        other => Err(LoadError::UnexpectedBlock {
            expected: CERTIFICATE_BLOCK,
            found: item_label(&other),
        }),
    }
}

/// Parse the first PKCS#8 private key in a PEM string.
pub fn load_private_key_from_pem(pem_str: &str) -> Result<KeyPair, LoadError> {
    match first_item(pem_str, PRIVATE_KEY_BLOCK)? {
        Item::Pkcs8Key(key_der) => KeyPair::from_pkcs8_der(key_der.secret_pkcs8_der()),
        other => Err(LoadError::UnexpectedBlock {
            expected: PRIVATE_KEY_BLOCK,
            found: item_label(&other),
        }),
    }
}

/// Load a certificate from a PEM file.
///
/// # Arguments
///
/// * `path` - Path to a file whose first PEM block is a certificate
///
/// # Example
///
/// ```rust,no_run
/// use gencert::cert::loader::load_certificate;
///
/// let cert = load_certificate("out/cert.pem").unwrap();
/// println!("issuer: {}", cert.tbs_certificate.issuer);
/// ```
pub fn load_certificate(path: impl AsRef<Path>) -> Result<Certificate, LoadError> {
    let pem = std::fs::read_to_string(path)?;
    load_certificate_from_pem(&pem)
}

/// Load a PKCS#8 private key from a PEM file.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<KeyPair, LoadError> {
    let pem = std::fs::read_to_string(path)?;
    load_private_key_from_pem(&pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::options::IssuanceConfig;
    use crate::cert::template::{parse_hosts, CertificateTemplate};
    use crate::cert::x509_signing::{sign_certificate, to_pem, CERTIFICATE_TAG, PRIVATE_KEY_TAG};
    use crate::crypto::keypair::{generate_keypair, public_key_der, KeyAlgorithm};
    use der::Encode;
    use tempfile::TempDir;

    fn certificate_pem() -> (String, Vec<u8>) {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let template =
            CertificateTemplate::new(&IssuanceConfig::default(), parse_hosts("test"), false)
                .unwrap();
        let der = sign_certificate(
            &template,
            template.subject().unwrap(),
            keypair.public_key_info().unwrap(),
            &keypair,
        )
        .unwrap();
        (to_pem(CERTIFICATE_TAG, &der), der)
    }

    #[test]
    fn test_load_certificate_from_pem() {
        let (pem, der) = certificate_pem();
        let cert = load_certificate_from_pem(&pem).unwrap();
        assert_eq!(cert.to_der().unwrap(), der);
    }

    #[test]
    fn test_load_certificate_from_invalid_pem() {
        let result = load_certificate_from_pem("not a valid pem");
        assert!(matches!(result, Err(LoadError::MissingBlock("CERTIFICATE"))));
    }

    #[test]
    fn test_load_certificate_from_empty_pem() {
        assert!(matches!(
            load_certificate_from_pem(""),
            Err(LoadError::MissingBlock(_))
        ));
    }

    #[test]
    fn test_load_certificate_rejects_key_block() {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let pem = to_pem(PRIVATE_KEY_TAG, &keypair.to_pkcs8_der().unwrap());
        let result = load_certificate_from_pem(&pem);
        assert!(matches!(
            result,
            Err(LoadError::UnexpectedBlock {
                expected: "CERTIFICATE",
                found: "PRIVATE KEY"
            })
        ));
    }

    #[test]
    fn test_load_certificate_rejects_bad_der() {
        let pem = to_pem(CERTIFICATE_TAG, b"definitely not DER");
        assert!(matches!(
            load_certificate_from_pem(&pem),
            Err(LoadError::Der(_))
        ));
    }

    #[test]
    fn test_load_private_key_round_trip() {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let pem = to_pem(PRIVATE_KEY_TAG, &keypair.to_pkcs8_der().unwrap());
        let loaded = load_private_key_from_pem(&pem).unwrap();
        assert_eq!(
            public_key_der(&loaded).unwrap(),
            public_key_der(&keypair).unwrap()
        );
    }

    #[test]
    fn test_load_private_key_rejects_certificate_block() {
        let (pem, _) = certificate_pem();
        assert!(matches!(
            load_private_key_from_pem(&pem),
            Err(LoadError::UnexpectedBlock { .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_certificate(dir.path().join("missing.pem"));
        assert!(matches!(result, Err(LoadError::Read(_))));
        let result = load_private_key(dir.path().join("missing.pem"));
        assert!(matches!(result, Err(LoadError::Read(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let (pem, der) = certificate_pem();
        let path = dir.path().join("cert.pem");
        std::fs::write(&path, pem).unwrap();
        assert_eq!(load_certificate(&path).unwrap().to_der().unwrap(), der);
    }
}
