//! Certificate template construction.
//!
//! Turns a resolved configuration, a host list and the subject key type into
//! the fields of a TLS server certificate: serial, validity window, names and
//! usage extensions.

use crate::cert::options::IssuanceConfig;
use crate::error::{GenCertError, Result};
use const_oid::db::rfc5912;
use const_oid::AssociatedOid;
use der::asn1::{Any, GeneralizedTime, Ia5String, OctetString, SetOfVec, Utf8StringRef, UtcTime};
use der::{DateTime, Encode};
use flagset::FlagSet;
use rand::rngs::OsRng;
use rand::RngCore;
use std::net::IpAddr;
use time::format_description::{self, BorrowedFormatItem};
use time::{OffsetDateTime, PrimitiveDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

/// Organization placed in every subject name.
pub const SUBJECT_ORGANIZATION: &str = "Acme Co";

/// Accepted layout of an explicit validity start, e.g. `Jan 2 15:04:05 2006`.
///
/// Month names match regardless of case and the hour may be a single digit.
pub const START_DATE_FORMAT: &str = "[month repr:short case_sensitive:false] [day padding:none] \
     [hour padding:none]:[minute]:[second] [year]";

/// Layout used when formatting a validity start.
const START_DATE_OUTPUT_FORMAT: &str =
    "[month repr:short] [day padding:none] [hour]:[minute]:[second] [year]";

/// DNS names and IP addresses taken from a comma-separated host list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostList {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

/// Split `host` on commas and classify each token.
///
/// Tokens are not trimmed. Anything that parses as an IPv4 or IPv6 literal is
/// an IP address; everything else, wildcards included, is kept verbatim as a
/// DNS name.
///
/// # Example
///
/// ```
/// use gencert::cert::template::parse_hosts;
///
/// let hosts = parse_hosts("example.com,127.0.0.1,*.example.com");
/// assert_eq!(hosts.dns_names, vec!["example.com", "*.example.com"]);
/// assert_eq!(hosts.ip_addresses.len(), 1);
/// ```
pub fn parse_hosts(host: &str) -> HostList {
    let mut hosts = HostList::default();
    for token in host.split(',') {
        match token.parse::<IpAddr>() {
            Ok(ip) => hosts.ip_addresses.push(ip),
            Err(_) => hosts.dns_names.push(token.to_string()),
        }
    }
    hosts
}

fn date_format(layout: &'static str) -> Result<Vec<BorrowedFormatItem<'static>>> {
    format_description::parse(layout)
        .map_err(|e| GenCertError::DateParse(format!("invalid date layout: {}", e)))
}

/// Parse an explicit validity start as UTC.
///
/// Dates before 1970 are rejected: certificate times are encoded from Unix
/// timestamps.
pub fn parse_start_date(date: &str) -> Result<OffsetDateTime> {
    let format = date_format(START_DATE_FORMAT)?;
    let parsed = PrimitiveDateTime::parse(date, &format)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| GenCertError::DateParse(format!("{:?}: {}", date, e)))?;

    if parsed < OffsetDateTime::UNIX_EPOCH {
        return Err(GenCertError::DateParse(format!(
            "{:?}: dates before 1970 are not supported",
            date
        )));
    }
    Ok(parsed)
}

/// Format `at` the way [`parse_start_date`] expects it.
pub fn format_start_date(at: OffsetDateTime) -> Result<String> {
    let format = date_format(START_DATE_OUTPUT_FORMAT)?;
    at.format(&format)
        .map_err(|e| GenCertError::DateParse(e.to_string()))
}

/// Draw a serial number uniformly from [0, 2^128).
pub fn generate_serial_number() -> Result<u128> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| GenCertError::SerialNumber(e.to_string()))?;
    Ok(u128::from_be_bytes(bytes))
}

/// Minimal big-endian encoding of a non-negative serial as a DER INTEGER body.
pub fn serial_number_bytes(serial: u128) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut encoded = Vec::with_capacity(17);
    if bytes[first] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(&bytes[first..]);
    encoded
}

/// Read a certificate serial back as a `u128`, if it fits.
pub fn serial_from_certificate(serial: &SerialNumber) -> Option<u128> {
    let bytes = serial.as_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first..];
    if significant.len() > 16 {
        return None;
    }
    let mut padded = [0u8; 16];
    padded[16 - significant.len()..].copy_from_slice(significant);
    Some(u128::from_be_bytes(padded))
}

/// Encode a UTC instant as an X.509 time: UTCTime before 2050,
/// GeneralizedTime from 2050 on.
pub fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let secs = u64::try_from(at.unix_timestamp()).map_err(|_| {
        GenCertError::Signing(format!("validity time {} is before the Unix epoch", at))
    })?;
    let date_time = DateTime::from_unix_duration(std::time::Duration::from_secs(secs))
        .map_err(|e| GenCertError::Signing(format!("validity time out of range: {}", e)))?;

    if date_time.year() < 2050 {
        UtcTime::from_date_time(date_time)
            .map(Time::UtcTime)
            .map_err(|e| GenCertError::Signing(format!("invalid UTCTime: {}", e)))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// Everything about a certificate except the keys and the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub serial_number: u128,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub hosts: HostList,
    pub subject_is_rsa: bool,
    pub is_ca: bool,
}

impl CertificateTemplate {
    /// Build the template for `hosts` under `config`.
    ///
    /// The validity window starts at the configured date (or now) and ends
    /// `config.valid_for` later; a zero or negative duration is kept as is.
    pub fn new(config: &IssuanceConfig, hosts: HostList, subject_is_rsa: bool) -> Result<Self> {
        let not_before = match config.valid_from.as_deref() {
            Some(date) if !date.is_empty() => parse_start_date(date)?,
            _ => OffsetDateTime::now_utc(),
        };
        let not_after = not_before.checked_add(config.valid_for).ok_or_else(|| {
            GenCertError::Signing("validity period overflows the calendar".to_string())
        })?;
        let serial_number = generate_serial_number()?;

        Ok(Self {
            serial_number,
            not_before,
            not_after,
            hosts,
            subject_is_rsa,
            is_ca: config.is_ca,
        })
    }

    /// DigitalSignature always; KeyEncipherment for RSA subjects; KeyCertSign for CAs.
    pub fn key_usage(&self) -> KeyUsage {
        let mut usages: FlagSet<KeyUsages> = KeyUsages::DigitalSignature.into();
        if self.subject_is_rsa {
            usages |= KeyUsages::KeyEncipherment;
        }
        if self.is_ca {
            usages |= KeyUsages::KeyCertSign;
        }
        KeyUsage(usages)
    }

    pub fn serial(&self) -> Result<SerialNumber> {
        SerialNumber::new(&serial_number_bytes(self.serial_number))
            .map_err(|e| GenCertError::SerialNumber(e.to_string()))
    }

    /// The fixed subject, `O=Acme Co`.
    pub fn subject(&self) -> Result<Name> {
        let organization = AttributeTypeAndValue {
            oid: const_oid::db::rfc4519::O,
            value: Any::encode_from(
                &Utf8StringRef::new(SUBJECT_ORGANIZATION)
                    .map_err(|e| GenCertError::Signing(format!("Invalid organization: {}", e)))?,
            )
            .map_err(|e| GenCertError::Signing(format!("Invalid organization: {}", e)))?,
        };

        let attributes = SetOfVec::try_from(vec![organization])
            .map_err(|e| GenCertError::Signing(format!("Failed to add attribute: {}", e)))?;

        Ok(RdnSequence(vec![RelativeDistinguishedName::from(attributes)]))
    }

    pub fn validity(&self) -> Result<Validity> {
        Ok(Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    fn subject_alt_names(&self) -> Result<SubjectAltName> {
        let mut names = Vec::with_capacity(
            self.hosts.dns_names.len() + self.hosts.ip_addresses.len(),
        );
        for dns_name in &self.hosts.dns_names {
            let name = Ia5String::new(dns_name).map_err(|e| {
                GenCertError::Signing(format!("invalid DNS name {:?}: {}", dns_name, e))
            })?;
            names.push(GeneralName::DnsName(name));
        }
        for ip in &self.hosts.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                    Some(v4) => v4.octets().to_vec(),
                    None => v6.octets().to_vec(),
                },
            };
            let octets = OctetString::new(octets)
                .map_err(|e| GenCertError::Signing(format!("invalid IP address {}: {}", ip, e)))?;
            names.push(GeneralName::IpAddress(octets));
        }
        Ok(SubjectAltName(names))
    }

    /// Key usage, extended key usage, basic constraints and subject alternative names.
    pub fn extensions(&self) -> Result<Vec<Extension>> {
        let mut extensions = vec![
            extension(KeyUsage::OID, true, &self.key_usage())?,
            extension(
                ExtendedKeyUsage::OID,
                false,
                &ExtendedKeyUsage(vec![rfc5912::ID_KP_SERVER_AUTH]),
            )?,
            extension(
                BasicConstraints::OID,
                true,
                &BasicConstraints {
                    ca: self.is_ca,
                    path_len_constraint: None,
                },
            )?,
        ];

        let alt_names = self.subject_alt_names()?;
        if !alt_names.0.is_empty() {
            extensions.push(extension(SubjectAltName::OID, false, &alt_names)?);
        }

        Ok(extensions)
    }
}

fn extension<T: Encode>(
    oid: const_oid::ObjectIdentifier,
    critical: bool,
    value: &T,
) -> Result<Extension> {
    let der = value
        .to_der()
        .map_err(|e| GenCertError::Signing(format!("Failed to encode extension {}: {}", oid, e)))?;
    let extn_value = OctetString::new(der)
        .map_err(|e| GenCertError::Signing(format!("Failed to encode extension {}: {}", oid, e)))?;

    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value,
    })
}
