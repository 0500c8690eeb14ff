//! Certificate issuance module.
//!
//! Options resolution, template construction, signing, persistence and a
//! single-root chain verifier for TLS server certificates.

pub mod issue;
pub mod loader;
pub mod options;
pub mod persist;
pub mod template;
pub mod verify;
pub mod x509_signing;

pub use issue::{generate, issue, IssuedCertificate};
pub use verify::verify;
