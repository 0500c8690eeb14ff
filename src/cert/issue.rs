//! Certificate issuance.
//!
//! [`generate`] builds and signs a certificate in memory; [`issue`] does the
//! same and writes the PEM files into a destination directory.

use crate::cert::loader::{load_certificate, load_private_key};
use crate::cert::options::{IssuanceConfig, IssueOption, ParentSigner};
use crate::cert::persist::{persist, PersistedArtifacts};
use crate::cert::template::{parse_hosts, CertificateTemplate};
use crate::cert::x509_signing::{sign_certificate, to_pem, CERTIFICATE_TAG, PRIVATE_KEY_TAG};
use crate::crypto::keypair::{generate_keypair, public_key_der, KeyAlgorithm, KeyPair};
use crate::error::{Artifact, GenCertError, LoadError, Result};
use der::Encode;
use std::net::IpAddr;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_cert::name::Name;
use x509_cert::Certificate;

/// A freshly signed certificate together with its private key.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// DER-encoded certificate.
    pub certificate_der: Vec<u8>,
    /// PKCS#8 DER-encoded private key of the certificate subject.
    pub private_key_der: Vec<u8>,
    pub key_algorithm: KeyAlgorithm,
    pub serial_number: u128,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    /// Set by [`issue`]; `None` for in-memory certificates.
    pub artifacts: Option<PersistedArtifacts>,
}

impl IssuedCertificate {
    /// The certificate as a single `CERTIFICATE` PEM block.
    pub fn certificate_pem(&self) -> String {
        to_pem(CERTIFICATE_TAG, &self.certificate_der)
    }

    /// The private key as a single `PRIVATE KEY` PEM block.
    pub fn private_key_pem(&self) -> String {
        to_pem(PRIVATE_KEY_TAG, &self.private_key_der)
    }

    /// Serial number as lowercase hex, for display.
    pub fn serial_hex(&self) -> String {
        hex::encode(self.serial_number.to_be_bytes())
    }
}

struct ParentMaterial {
    certificate: Certificate,
    key: KeyPair,
}

fn parent_error(artifact: Artifact, path: &Path) -> impl FnOnce(LoadError) -> GenCertError + '_ {
    move |source| GenCertError::ParentLoad {
        artifact,
        path: path.to_path_buf(),
        source,
    }
}

/// Load the parent certificate and key and check that they belong together.
fn load_parent(parent: &ParentSigner) -> Result<ParentMaterial> {
    let certificate = load_certificate(&parent.cert_path)
        .map_err(parent_error(Artifact::Certificate, &parent.cert_path))?;
    let key = load_private_key(&parent.key_path)
        .map_err(parent_error(Artifact::PrivateKey, &parent.key_path))?;

    let cert_key = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| {
            parent_error(Artifact::Certificate, &parent.cert_path)(LoadError::Der(e.to_string()))
        })?;
    if public_key_der(&key)? != cert_key {
        return Err(parent_error(Artifact::PrivateKey, &parent.key_path)(
            LoadError::KeyMismatch,
        ));
    }

    debug!(
        cert = %parent.cert_path.display(),
        key = %parent.key_path.display(),
        "loaded parent signer"
    );
    Ok(ParentMaterial { certificate, key })
}

/// Generate a key pair and a signed certificate for `host` without writing anything.
///
/// `host` is a comma-separated list of DNS names and IP addresses.
///
/// # Example
///
/// ```
/// use gencert::cert::issue::generate;
/// use gencert::cert::options::{with_p256, IssuanceConfig};
///
/// # fn example() -> gencert::error::Result<()> {
/// let config = IssuanceConfig::resolve([with_p256()]);
/// let issued = generate("localhost,127.0.0.1", &config)?;
/// assert_eq!(issued.dns_names, vec!["localhost"]);
/// assert!(issued.certificate_pem().starts_with("-----BEGIN CERTIFICATE-----"));
/// # Ok(())
/// # }
/// ```
pub fn generate(host: &str, config: &IssuanceConfig) -> Result<IssuedCertificate> {
    if host.is_empty() {
        return Err(GenCertError::MissingHost);
    }

    let algorithm = config.key_algorithm()?;
    debug!(%algorithm, "generating subject key");
    let subject_key = generate_keypair(algorithm)?;

    let template = CertificateTemplate::new(config, parse_hosts(host), subject_key.is_rsa())?;

    let parent = config.parent.as_ref().map(load_parent).transpose()?;
    let (issuer, signer): (Name, &KeyPair) = match &parent {
        Some(parent) => (parent.certificate.tbs_certificate.subject.clone(), &parent.key),
        None => (template.subject()?, &subject_key),
    };
    debug!(
        self_signed = parent.is_none(),
        ca = config.is_ca,
        "signing certificate"
    );

    let certificate_der =
        sign_certificate(&template, issuer, subject_key.public_key_info()?, signer)?;
    let private_key_der = subject_key.to_pkcs8_der()?;

    Ok(IssuedCertificate {
        certificate_der,
        private_key_der,
        key_algorithm: subject_key.algorithm(),
        serial_number: template.serial_number,
        not_before: template.not_before,
        not_after: template.not_after,
        dns_names: template.hosts.dns_names,
        ip_addresses: template.hosts.ip_addresses,
        artifacts: None,
    })
}

/// Issue a TLS server certificate for `host` and write it into `dest`.
///
/// Writes `<dest>/<cert file>` (default `cert.pem`) and `<dest>/<key file>`
/// (default `key.pem`, mode 0600 on Unix), overwriting existing files.
///
/// # Arguments
///
/// * `host` - Comma-separated DNS names and IP addresses
/// * `dest` - Existing output directory
/// * `options` - Options applied in order over the defaults
///
/// # Example
///
/// ```rust,no_run
/// use gencert::cert::issue::issue;
/// use gencert::cert::options::{with_ca, with_ed25519};
///
/// # fn example() -> gencert::error::Result<()> {
/// let issued = issue("example.com", "out", [with_ed25519(), with_ca()])?;
/// println!("serial {}", issued.serial_hex());
/// # Ok(())
/// # }
/// ```
pub fn issue<I>(host: &str, dest: impl AsRef<Path>, options: I) -> Result<IssuedCertificate>
where
    I: IntoIterator<Item = IssueOption>,
{
    if host.is_empty() {
        return Err(GenCertError::MissingHost);
    }

    let config = IssuanceConfig::resolve(options);
    let mut issued = generate(host, &config)?;

    let artifacts = persist(
        dest.as_ref(),
        &config.cert_file_name,
        &issued.certificate_pem(),
        &config.key_file_name,
        &issued.private_key_pem(),
        config.atomic_write,
    )?;
    info!(
        cert = %artifacts.cert_path.display(),
        key = %artifacts.key_path.display(),
        serial = %issued.serial_hex(),
        "issued certificate"
    );

    issued.artifacts = Some(artifacts);
    Ok(issued)
}
