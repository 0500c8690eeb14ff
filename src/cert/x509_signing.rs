//! X.509 certificate signing using x509-cert.
//!
//! Assembles the to-be-signed certificate from a [`CertificateTemplate`],
//! signs its DER encoding with the issuer key and returns the finished
//! certificate in DER form.

use crate::cert::template::CertificateTemplate;
use crate::crypto::keypair::KeyPair;
use crate::error::{GenCertError, Result};
use der::asn1::BitString;
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::name::Name;
use x509_cert::TbsCertificate;

/// PEM label for certificates.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// PEM label for PKCS#8 private keys.
pub const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// Sign a certificate for `subject_key` described by `template`.
///
/// `issuer` is the issuer distinguished name: the template's own subject for a
/// self-signed certificate, or the parent certificate's subject otherwise.
/// `signer` is the key that produces the signature.
///
/// # Arguments
///
/// * `template` - Serial, validity, names and extensions
/// * `issuer` - Distinguished name written into the issuer field
/// * `subject_key` - Public key being certified
/// * `signer` - Private key of the issuer
///
/// # Example
///
/// ```
/// use gencert::cert::options::IssuanceConfig;
/// use gencert::cert::template::{parse_hosts, CertificateTemplate};
/// use gencert::cert::x509_signing::sign_certificate;
/// use gencert::crypto::keypair::{generate_keypair, KeyAlgorithm};
///
/// # fn example() -> gencert::error::Result<()> {
/// let keypair = generate_keypair(KeyAlgorithm::Ed25519)?;
/// let template =
///     CertificateTemplate::new(&IssuanceConfig::default(), parse_hosts("localhost"), false)?;
/// let issuer = template.subject()?;
/// let der = sign_certificate(&template, issuer, keypair.public_key_info()?, &keypair)?;
/// assert!(!der.is_empty());
/// # Ok(())
/// # }
/// ```
pub fn sign_certificate(
    template: &CertificateTemplate,
    issuer: Name,
    subject_key: SubjectPublicKeyInfoOwned,
    signer: &KeyPair,
) -> Result<Vec<u8>> {
    let signature_algorithm = signer.signature_algorithm();

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: template.serial()?,
        signature: signature_algorithm.clone(),
        issuer,
        validity: template.validity()?,
        subject: template.subject()?,
        subject_public_key_info: subject_key,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(template.extensions()?),
    };

    let tbs_der = tbs
        .to_der()
        .map_err(|e| GenCertError::Signing(format!("Failed to encode TBS: {}", e)))?;
    let signature = signer.sign(&tbs_der)?;
    let signature = BitString::from_bytes(&signature).map_err(|e| {
        GenCertError::Signing(format!("Failed to create signature bitstring: {}", e))
    })?;

    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    };

    cert.to_der()
        .map_err(|e| GenCertError::Signing(format!("Failed to encode certificate: {}", e)))
}

/// Wrap DER bytes in a PEM block with the given label.
pub fn to_pem(tag: &str, der: &[u8]) -> String {
    pem::encode(&pem::Pem::new(tag, der.to_vec()))
}

/// Decode a DER certificate.
pub fn parse_certificate(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| GenCertError::Signing(format!("Failed to decode certificate: {}", e)))
}
