//! One-level chain verification.
//!
//! The trust store is a single root certificate. A leaf is accepted when it
//! is currently valid, is either the root itself or signed by it, may be used
//! for TLS server authentication, and names the requested host.

use crate::cert::loader::load_certificate;
use crate::crypto::verifying::VerifyingKey;
use crate::error::{GenCertError, Result};
use const_oid::db::rfc5912;
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{Decode, Encode};
use std::net::IpAddr;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName};
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

fn fail(message: impl Into<String>) -> GenCertError {
    GenCertError::Verification(message.into())
}

/// Verify the certificate at `leaf_path` against the root at `root_path` for `dns_name`.
///
/// `dns_name` may also be an IP literal, in which case it is matched against
/// the IP address entries of the leaf.
///
/// # Example
///
/// ```rust,no_run
/// use gencert::cert::verify::verify;
///
/// # fn example() -> gencert::error::Result<()> {
/// verify("out/ca_cert.pem", "out/cert.pem", "test.example.com")?;
/// # Ok(())
/// # }
/// ```
pub fn verify(
    root_path: impl AsRef<Path>,
    leaf_path: impl AsRef<Path>,
    dns_name: &str,
) -> Result<()> {
    let root = load(root_path.as_ref())?;
    let leaf = load(leaf_path.as_ref())?;

    verify_certificate(&root, &leaf, dns_name, OffsetDateTime::now_utc())?;
    info!(
        leaf = %leaf_path.as_ref().display(),
        name = dns_name,
        "certificate verified"
    );
    Ok(())
}

fn load(path: &Path) -> Result<Certificate> {
    load_certificate(path).map_err(|source| GenCertError::CertificateParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Verify `leaf` against the single trusted `root` for `dns_name` at instant `at`.
pub fn verify_certificate(
    root: &Certificate,
    leaf: &Certificate,
    dns_name: &str,
    at: OffsetDateTime,
) -> Result<()> {
    check_signature_algorithm(root)?;
    check_signature_algorithm(leaf)?;
    check_validity("certificate", &leaf.tbs_certificate.validity, at)?;
    check_chain(root, leaf, at)?;
    check_server_auth(leaf)?;
    check_name(leaf, dns_name)
}

/// The signed and unsigned copies of the signature algorithm must agree.
fn check_signature_algorithm(cert: &Certificate) -> Result<()> {
    if cert.signature_algorithm != cert.tbs_certificate.signature {
        return Err(fail(format!(
            "signature algorithm {} does not match the signed algorithm {}",
            cert.signature_algorithm.oid, cert.tbs_certificate.signature.oid
        )));
    }
    Ok(())
}

fn to_offset_date_time(time: &Time) -> Result<OffsetDateTime> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|_| fail("validity time out of range"))?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| fail(e.to_string()))
}

fn check_validity(what: &str, validity: &Validity, at: OffsetDateTime) -> Result<()> {
    let not_before = to_offset_date_time(&validity.not_before)?;
    let not_after = to_offset_date_time(&validity.not_after)?;

    if at < not_before {
        return Err(fail(format!(
            "{} is not valid before {}",
            what, not_before
        )));
    }
    if at > not_after {
        return Err(fail(format!("{} expired at {}", what, not_after)));
    }
    Ok(())
}

fn find_extension<T>(cert: &Certificate) -> Result<Option<T>>
where
    T: AssociatedOid + for<'a> Decode<'a>,
{
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(None);
    };

    extensions
        .iter()
        .find(|ext| ext.extn_id == T::OID)
        .map(|ext| {
            T::from_der(ext.extn_value.as_bytes())
                .map_err(|e| fail(format!("malformed extension {}: {}", T::OID, e)))
        })
        .transpose()
}

fn check_chain(root: &Certificate, leaf: &Certificate, at: OffsetDateTime) -> Result<()> {
    let root_der = root
        .to_der()
        .map_err(|e| fail(format!("failed to encode root: {}", e)))?;
    let leaf_der = leaf
        .to_der()
        .map_err(|e| fail(format!("failed to encode certificate: {}", e)))?;
    if root_der == leaf_der {
        debug!("certificate is the trusted root");
        return Ok(());
    }

    if leaf.tbs_certificate.issuer != root.tbs_certificate.subject {
        return Err(fail(format!(
            "certificate signed by unknown authority {}",
            leaf.tbs_certificate.issuer
        )));
    }
    check_validity("root certificate", &root.tbs_certificate.validity, at)?;

    let is_ca = find_extension::<BasicConstraints>(root)?
        .map(|constraints| constraints.ca)
        .unwrap_or(false);
    if !is_ca {
        return Err(fail("root certificate is not a certificate authority"));
    }
    if let Some(usage) = find_extension::<KeyUsage>(root)? {
        if !usage.key_cert_sign() {
            return Err(fail("root certificate may not sign certificates"));
        }
    }

    let tbs = leaf
        .tbs_certificate
        .to_der()
        .map_err(|e| fail(format!("failed to encode certificate: {}", e)))?;
    VerifyingKey::from_spki(&root.tbs_certificate.subject_public_key_info)
        .and_then(|key| key.verify(&leaf.signature_algorithm, &tbs, leaf.signature.raw_bytes()))
        .map_err(fail)
}

fn check_server_auth(leaf: &Certificate) -> Result<()> {
    match find_extension::<ExtendedKeyUsage>(leaf)? {
        Some(usage)
            if !usage
                .0
                .iter()
                .any(|oid| *oid == rfc5912::ID_KP_SERVER_AUTH || *oid == ANY_EXTENDED_KEY_USAGE) =>
        {
            Err(fail("certificate is not valid for server authentication"))
        }
        _ => Ok(()),
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(octets).ok().map(IpAddr::from),
        _ => None,
    }
}

/// Match `host` against a DNS name `pattern`, honouring a leftmost `*` label.
///
/// Comparison ignores ASCII case and a single trailing dot on either side. A
/// wildcard stands for exactly one non-empty label.
///
/// ```
/// use gencert::cert::verify::match_hostname;
///
/// assert!(match_hostname("*.example.com", "abc.example.com"));
/// assert!(!match_hostname("*.example.com", "example.com"));
/// assert!(!match_hostname("*.example.com", "a.b.example.com"));
/// ```
pub fn match_hostname(pattern: &str, host: &str) -> bool {
    let pattern = pattern.strip_suffix('.').unwrap_or(pattern);
    let host = host.strip_suffix('.').unwrap_or(host);
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let pattern_labels: Vec<&str> = pattern.split('.').collect();
    let host_labels: Vec<&str> = host.split('.').collect();
    if pattern_labels.len() != host_labels.len() {
        return false;
    }

    pattern_labels
        .iter()
        .zip(&host_labels)
        .enumerate()
        .all(|(i, (pattern, host))| {
            if i == 0 && *pattern == "*" {
                !host.is_empty()
            } else {
                !host.is_empty() && pattern.eq_ignore_ascii_case(host)
            }
        })
}

fn check_name(leaf: &Certificate, dns_name: &str) -> Result<()> {
    let names = find_extension::<SubjectAltName>(leaf)?
        .map(|san| san.0)
        .unwrap_or_default();

    let candidate = dns_name
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(dns_name);

    if let Ok(ip) = candidate.parse::<IpAddr>() {
        let wanted = canonical_ip(ip);
        let matched = names.iter().any(|name| match name {
            GeneralName::IpAddress(octets) => ip_from_octets(octets.as_bytes())
                .map(|ip| canonical_ip(ip) == wanted)
                .unwrap_or(false),
            _ => false,
        });
        return if matched {
            Ok(())
        } else {
            Err(fail(format!(
                "certificate is not valid for IP address {}",
                ip
            )))
        };
    }

    let matched = names.iter().any(|name| match name {
        GeneralName::DnsName(pattern) => match_hostname(pattern.as_str(), dns_name),
        _ => false,
    });
    if matched {
        Ok(())
    } else {
        Err(fail(format!(
            "certificate is not valid for {:?}",
            dns_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::issue::generate;
    use crate::cert::options::{with_ca, with_duration, with_ed25519, with_p256, IssuanceConfig};
    use crate::cert::x509_signing::parse_certificate;

    fn certificate(host: &str, config: &IssuanceConfig) -> Certificate {
        parse_certificate(&generate(host, config).unwrap().certificate_der).unwrap()
    }

    #[test]
    fn test_match_hostname() {
        assert!(match_hostname("example.com", "example.com"));
        assert!(match_hostname("Example.COM", "example.com"));
        assert!(match_hostname("example.com.", "example.com"));
        assert!(match_hostname("example.com", "example.com."));
        assert!(match_hostname("*.example.com", "ABC.example.com"));
        assert!(!match_hostname("*.example.com", "example.com"));
        assert!(!match_hostname("*.example.com", "a.b.example.com"));
        assert!(!match_hostname("a.*.com", "a.example.com"));
        assert!(!match_hostname("example.com", "other.com"));
        assert!(!match_hostname("", "example.com"));
        assert!(!match_hostname("*.example.com", ".example.com"));
    }

    #[test]
    fn test_self_signed_verifies_against_itself() {
        let config = IssuanceConfig::resolve([with_ed25519()]);
        let cert = certificate("test.example.com,*.example.com,10.0.0.1", &config);
        let now = OffsetDateTime::now_utc();

        verify_certificate(&cert, &cert, "test.example.com", now).unwrap();
        verify_certificate(&cert, &cert, "abc.example.com", now).unwrap();
        verify_certificate(&cert, &cert, "10.0.0.1", now).unwrap();
        verify_certificate(&cert, &cert, "::ffff:10.0.0.1", now).unwrap();
        assert!(verify_certificate(&cert, &cert, "example.com", now).is_err());
        assert!(verify_certificate(&cert, &cert, "10.0.0.2", now).is_err());
    }

    #[test]
    fn test_validity_window() {
        let config = IssuanceConfig::resolve([with_p256(), with_duration(time::Duration::hours(1))]);
        let cert = certificate("example.com", &config);
        let now = OffsetDateTime::now_utc();

        verify_certificate(&cert, &cert, "example.com", now).unwrap();
        let result =
            verify_certificate(&cert, &cert, "example.com", now + time::Duration::hours(2));
        assert!(matches!(result, Err(GenCertError::Verification(_))));
        let result =
            verify_certificate(&cert, &cert, "example.com", now - time::Duration::hours(1));
        assert!(matches!(result, Err(GenCertError::Verification(_))));
    }

    #[test]
    fn test_unrelated_root_is_rejected() {
        let config = IssuanceConfig::resolve([with_ed25519(), with_ca()]);
        let root = certificate("root", &config);
        let other = certificate("example.com", &IssuanceConfig::resolve([with_ed25519()]));

        // Both carry the same subject, so only the signature check can tell them apart.
        let result = verify_certificate(&root, &other, "example.com", OffsetDateTime::now_utc());
        assert!(matches!(result, Err(GenCertError::Verification(_))));
    }

    #[test]
    fn test_mismatched_signature_algorithm_is_rejected() {
        let config = IssuanceConfig::resolve([with_p256()]);
        let mut cert = certificate("example.com", &config);
        cert.signature_algorithm.oid = rfc5912::ECDSA_WITH_SHA_384;

        let result = verify_certificate(&cert, &cert, "example.com", OffsetDateTime::now_utc());
        match result {
            Err(GenCertError::Verification(message)) => {
                assert!(message.contains("does not match the signed algorithm"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_ca_root_is_rejected() {
        let config = IssuanceConfig::resolve([with_ed25519()]);
        let root = certificate("root", &config);
        let leaf = certificate("example.com", &config);

        let result = verify_certificate(&root, &leaf, "example.com", OffsetDateTime::now_utc());
        match result {
            Err(GenCertError::Verification(message)) => {
                assert!(message.contains("not a certificate authority"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
