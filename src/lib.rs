//! gencert: self-signed and CA-signed X.509 certificates for TLS servers
//!
//! Given a comma-separated list of host names and IP addresses this library
//! generates a fresh key pair, builds a server certificate for those hosts and
//! either self-signs it or signs it with an existing certificate authority. It
//! can:
//!
//! - Generate RSA, ECDSA (P-224, P-256, P-384, P-521) or Ed25519 keys
//! - Write the certificate and PKCS#8 key as PEM files
//! - Verify a certificate against a single trusted root for a host name
//!
//! # Architecture
//!
//! Issuance is configured by an ordered list of [`cert::options::IssueOption`]
//! values applied over defaults. All operations return `Result` types; nothing
//! panics and nothing is retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use gencert::cert::options::{with_ca, with_p256};
//! use gencert::error::Result;
//!
//! fn example() -> Result<()> {
//!     gencert::issue("localhost,127.0.0.1", "out", [with_p256(), with_ca()])?;
//!     gencert::verify("out/cert.pem", "out/cert.pem", "localhost")?;
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod crypto;
pub mod error;

// Re-export commonly used types
pub use cert::options::{IssuanceConfig, IssueOption};
pub use cert::{generate, issue, verify, IssuedCertificate};
pub use error::{GenCertError, Result};
