//! Issuance options.
//!
//! An [`IssuanceConfig`] starts from fixed defaults and is shaped by an ordered
//! list of [`IssueOption`]s. Each option touches one field; when two options
//! touch the same field the later one wins. Nothing is validated here: an
//! unknown curve name or unusable RSA size surfaces later, from key selection
//! or key generation.

use crate::crypto::keypair::{EcdsaCurve, KeyAlgorithm};
use crate::error::Result;
use std::path::PathBuf;

pub const DEFAULT_CERT_FILE_NAME: &str = "cert.pem";
pub const DEFAULT_KEY_FILE_NAME: &str = "key.pem";
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Default validity period: 365 days.
pub const DEFAULT_VALID_FOR: time::Duration = time::Duration::days(365);

/// Certificate and key files of an external signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentSigner {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Resolved configuration for a single issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceConfig {
    pub cert_file_name: String,
    pub key_file_name: String,
    pub parent: Option<ParentSigner>,
    /// Validity start formatted as `Jan 2 15:04:05 2006`; `None` means now.
    pub valid_from: Option<String>,
    pub valid_for: time::Duration,
    pub rsa_bits: usize,
    pub ecdsa_curve: Option<String>,
    pub ed25519: bool,
    pub is_ca: bool,
    pub atomic_write: bool,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            cert_file_name: DEFAULT_CERT_FILE_NAME.to_string(),
            key_file_name: DEFAULT_KEY_FILE_NAME.to_string(),
            parent: None,
            valid_from: None,
            valid_for: DEFAULT_VALID_FOR,
            rsa_bits: DEFAULT_RSA_BITS,
            ecdsa_curve: None,
            ed25519: false,
            is_ca: false,
            atomic_write: false,
        }
    }
}

impl IssuanceConfig {
    /// Apply `options` in order over the defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use gencert::cert::options::{with_ca, with_cert_file_name, IssuanceConfig};
    ///
    /// let config = IssuanceConfig::resolve([
    ///     with_cert_file_name("a.pem"),
    ///     with_ca(),
    ///     with_cert_file_name("b.pem"),
    /// ]);
    /// assert_eq!(config.cert_file_name, "b.pem");
    /// assert!(config.is_ca);
    /// ```
    pub fn resolve<I>(options: I) -> Self
    where
        I: IntoIterator<Item = IssueOption>,
    {
        options
            .into_iter()
            .fold(IssuanceConfig::default(), |mut config, option| {
                option.apply(&mut config);
                config
            })
    }

    /// Pick the subject key algorithm for this configuration.
    pub fn key_algorithm(&self) -> Result<KeyAlgorithm> {
        KeyAlgorithm::select(self.ecdsa_curve.as_deref(), self.ed25519, self.rsa_bits)
    }
}

/// A single named mutation of an [`IssuanceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOption {
    CertFileName(String),
    KeyFileName(String),
    SignByParent { cert_path: PathBuf, key_path: PathBuf },
    StartDate(String),
    Duration(time::Duration),
    Ca,
    RsaBits(usize),
    EcdsaCurve(String),
    Ed25519,
    AtomicWrite,
}

impl IssueOption {
    /// Apply this option to `config`.
    pub fn apply(self, config: &mut IssuanceConfig) {
        match self {
            IssueOption::CertFileName(name) => config.cert_file_name = name,
            IssueOption::KeyFileName(name) => config.key_file_name = name,
            IssueOption::SignByParent {
                cert_path,
                key_path,
            } => {
                // An empty certificate path leaves the certificate self-signed.
                config.parent = (!cert_path.as_os_str().is_empty()).then_some(ParentSigner {
                    cert_path,
                    key_path,
                });
            }
            IssueOption::StartDate(date) => config.valid_from = Some(date),
            IssueOption::Duration(duration) => config.valid_for = duration,
            IssueOption::Ca => config.is_ca = true,
            IssueOption::RsaBits(bits) => config.rsa_bits = bits,
            IssueOption::EcdsaCurve(curve) => config.ecdsa_curve = Some(curve),
            IssueOption::Ed25519 => config.ed25519 = true,
            IssueOption::AtomicWrite => config.atomic_write = true,
        }
    }
}

/// Name of the generated certificate file (default `cert.pem`).
pub fn with_cert_file_name(name: impl Into<String>) -> IssueOption {
    IssueOption::CertFileName(name.into())
}

/// Name of the generated key file (default `key.pem`).
pub fn with_key_file_name(name: impl Into<String>) -> IssueOption {
    IssueOption::KeyFileName(name.into())
}

/// Sign with an existing certificate and PKCS#8 key instead of self-signing.
pub fn with_sign_by_parent(
    cert_path: impl Into<PathBuf>,
    key_path: impl Into<PathBuf>,
) -> IssueOption {
    IssueOption::SignByParent {
        cert_path: cert_path.into(),
        key_path: key_path.into(),
    }
}

/// Validity start, formatted as `Jan 2 15:04:05 2006` (UTC).
pub fn with_start_date(date: impl Into<String>) -> IssueOption {
    IssueOption::StartDate(date.into())
}

/// How long the certificate is valid for. Zero and negative values are allowed.
pub fn with_duration(duration: time::Duration) -> IssueOption {
    IssueOption::Duration(duration)
}

/// Make the certificate its own certificate authority.
pub fn with_ca() -> IssueOption {
    IssueOption::Ca
}

/// RSA modulus size. Ignored when a curve or Ed25519 is selected.
pub fn with_rsa_bits(bits: usize) -> IssueOption {
    IssueOption::RsaBits(bits)
}

/// Select an ECDSA curve by name (`P224`, `P256`, `P384`, `P521`).
pub fn with_ecdsa_curve(curve: impl Into<String>) -> IssueOption {
    IssueOption::EcdsaCurve(curve.into())
}

pub fn with_p224() -> IssueOption {
    with_ecdsa_curve(EcdsaCurve::P224.name())
}

/// ECDSA P-256, the recommended curve.
pub fn with_p256() -> IssueOption {
    with_ecdsa_curve(EcdsaCurve::P256.name())
}

pub fn with_p384() -> IssueOption {
    with_ecdsa_curve(EcdsaCurve::P384.name())
}

pub fn with_p521() -> IssueOption {
    with_ecdsa_curve(EcdsaCurve::P521.name())
}

/// Generate an Ed25519 key. Ignored when a curve is selected.
pub fn with_ed25519() -> IssueOption {
    IssueOption::Ed25519
}

/// Stage each output file in the destination directory and rename it into place.
pub fn with_atomic_write() -> IssueOption {
    IssueOption::AtomicWrite
}
