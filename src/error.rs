//! Error types for gencert.
//!
//! Every failure is terminal for the call that produced it. Nothing is retried
//! and files already written are left in place.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for issuance and verification.
#[derive(Error, Debug)]
pub enum GenCertError {
    /// The host list was empty
    #[error("missing required host parameter")]
    MissingHost,

    /// The elliptic curve selector named no supported curve
    #[error("unrecognized elliptic curve: {0:?}")]
    UnsupportedCurve(String),

    /// Key pair generation failed
    #[error("failed to generate private key: {0}")]
    KeyGeneration(String),

    /// The private key could not be encoded as PKCS#8
    #[error("unable to marshal private key: {0}")]
    KeyEncoding(String),

    /// The validity start string did not match `Jan 2 15:04:05 2006`
    #[error("failed to parse creation date: {0}")]
    DateParse(String),

    /// The random source failed while drawing a serial number
    #[error("failed to generate serial number: {0}")]
    SerialNumber(String),

    /// The parent certificate or key could not be loaded
    #[error("failed to load parent {artifact} {}: {source}", .path.display())]
    ParentLoad {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    /// The certificate could not be built or signed
    #[error("failed to create certificate: {0}")]
    Signing(String),

    /// An output file could not be opened, written or closed
    #[error("failed to {step} {}: {source}", .path.display())]
    FileIo {
        step: IoStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A certificate file could not be read back
    #[error("failed to parse certificate {}: {source}", .path.display())]
    CertificateParse {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    /// Chain or name validation rejected the certificate
    #[error("failed to verify certificate: {0}")]
    Verification(String),
}

/// Failure while loading a PEM file from disk.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to decode PEM: {0}")]
    PemDecode(String),

    #[error("no {0} PEM block found")]
    MissingBlock(&'static str),

    #[error("expected {expected} PEM block, found {found}")]
    UnexpectedBlock {
        expected: &'static str,
        found: &'static str,
    },

    #[error("failed to parse DER data: {0}")]
    Der(String),

    #[error("private key does not match the parent certificate")]
    KeyMismatch,
}

/// Which parent file a [`GenCertError::ParentLoad`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Certificate,
    PrivateKey,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Certificate => f.write_str("certificate"),
            Artifact::PrivateKey => f.write_str("private key"),
        }
    }
}

/// The file operation that failed in a [`GenCertError::FileIo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStep {
    Open,
    Write,
    Close,
}

impl fmt::Display for IoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoStep::Open => f.write_str("open"),
            IoStep::Write => f.write_str("write"),
            IoStep::Close => f.write_str("close"),
        }
    }
}

/// A specialized Result type for gencert operations.
pub type Result<T> = std::result::Result<T, GenCertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenCertError::UnsupportedCurve("P999".to_string());
        assert_eq!(err.to_string(), "unrecognized elliptic curve: \"P999\"");

        let err = GenCertError::MissingHost;
        assert_eq!(err.to_string(), "missing required host parameter");
    }

    #[test]
    fn test_file_io_display_names_step_and_path() {
        let err = GenCertError::FileIo {
            step: IoStep::Open,
            path: PathBuf::from("/out/key.pem"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to open /out/key.pem: denied");
    }

    #[test]
    fn test_parent_load_display_names_artifact() {
        let err = GenCertError::ParentLoad {
            artifact: Artifact::PrivateKey,
            path: PathBuf::from("ca_key.pem"),
            source: LoadError::MissingBlock("PRIVATE KEY"),
        };
        assert_eq!(
            err.to_string(),
            "failed to load parent private key ca_key.pem: no PRIVATE KEY PEM block found"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GenCertError>();
    }

    #[test]
    fn test_result_type() {
        let ok_result: Result<i32> = Ok(42);
        assert!(ok_result.is_ok());

        let err_result: Result<i32> = Err(GenCertError::Verification("expired".to_string()));
        assert!(err_result.is_err());
    }
}
