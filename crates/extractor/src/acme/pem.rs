//! PEM and X.509 helpers for ACME certificate material
//!
//! Traefik stores certificates and keys as base64 of the PEM text. A stored
//! certificate is the full chain: the leaf certificate followed by zero or
//! more intermediates.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use x509_parser::extensions::{GeneralName, ParsedExtension, X509Extension};
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::oid_registry::Oid;
use x509_parser::prelude::X509Certificate;

use super::error::PemError;

/// Marker line terminating a PEM certificate block
pub const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

const PEM_BEGIN: &[u8] = b"-----BEGIN ";
const SUMMARY_TIME_FORMAT: &str = "%b %e %H:%M:%S %Y UTC";

/// Parsed leaf certificate details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafInfo {
    /// Human-readable description of the certificate
    pub summary: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Decode base64 (standard alphabet) key material.
pub fn decode_key_material(encoded: &str) -> Result<Vec<u8>, PemError> {
    Ok(STANDARD.decode(encoded)?)
}

/// Split a full chain into the leaf certificate and the remaining chain.
///
/// Blank lines are dropped. Everything up to and including the first
/// `-----END CERTIFICATE-----` line is the leaf; all later lines are the
/// chain. Without an end marker the whole input is the leaf.
pub fn split_chain(full_chain: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut leaf: Vec<&[u8]> = Vec::new();
    let mut chain: Vec<&[u8]> = Vec::new();
    let mut leaf_done = false;

    for line in full_chain.split(|b| *b == b'\n') {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        if leaf_done {
            chain.push(line);
        } else {
            leaf.push(line);
            leaf_done = trimmed == END_CERTIFICATE.as_bytes();
        }
    }

    (leaf.join(&b'\n'), chain.join(&b'\n'))
}

/// Parse the first PEM block of `leaf_pem` as an X.509 certificate.
pub fn parse_leaf(leaf_pem: &[u8]) -> Result<LeafInfo, PemError> {
    if !leaf_pem.windows(PEM_BEGIN.len()).any(|w| w == PEM_BEGIN) {
        return Err(PemError::MissingBlock);
    }
    let block = ::pem::parse(leaf_pem)?;

    let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| PemError::X509(e.to_string()))?;

    let validity = cert.validity();
    let not_before = to_utc(validity.not_before.timestamp())?;
    let not_after = to_utc(validity.not_after.timestamp())?;

    Ok(LeafInfo {
        summary: summarize(&cert, not_before, not_after),
        not_before,
        not_after,
    })
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, PemError> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or(PemError::InvalidValidity(timestamp))
}

fn oid_name(oid: &Oid) -> String {
    oid2sn(oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| oid.to_id_string())
}

fn hex_colon(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Render an openssl-like text description of a certificate.
fn summarize(cert: &X509Certificate<'_>, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> String {
    let mut lines = vec![
        "Certificate:".to_string(),
        "    Data:".to_string(),
        format!(
            "        Version: {} (0x{:x})",
            cert.version().0 + 1,
            cert.version().0
        ),
        "        Serial Number:".to_string(),
        format!("            {}", cert.raw_serial_as_string()),
        format!(
            "    Signature Algorithm: {}",
            oid_name(&cert.signature_algorithm.algorithm)
        ),
        format!("        Issuer: {}", cert.issuer()),
        "        Validity".to_string(),
        format!("            Not Before: {}", not_before.format(SUMMARY_TIME_FORMAT)),
        format!("            Not After : {}", not_after.format(SUMMARY_TIME_FORMAT)),
        format!("        Subject: {}", cert.subject()),
        "        Subject Public Key Info:".to_string(),
        format!(
            "            Public Key Algorithm: {}",
            oid_name(&cert.public_key().algorithm.algorithm)
        ),
    ];

    let extensions = cert.extensions();
    if !extensions.is_empty() {
        lines.push("        X509v3 extensions:".to_string());
        for ext in extensions {
            let critical = if ext.critical { " critical" } else { "" };
            lines.push(format!("            {}:{}", extension_title(ext), critical));
            lines.push(format!("                {}", extension_value(ext)));
        }
    }

    let mut summary = lines.join("\n");
    summary.push('\n');
    summary
}

fn extension_title(ext: &X509Extension<'_>) -> String {
    match ext.parsed_extension() {
        ParsedExtension::SubjectAlternativeName(_) => "X509v3 Subject Alternative Name".into(),
        ParsedExtension::KeyUsage(_) => "X509v3 Key Usage".into(),
        ParsedExtension::ExtendedKeyUsage(_) => "X509v3 Extended Key Usage".into(),
        ParsedExtension::BasicConstraints(_) => "X509v3 Basic Constraints".into(),
        ParsedExtension::SubjectKeyIdentifier(_) => "X509v3 Subject Key Identifier".into(),
        ParsedExtension::AuthorityKeyIdentifier(_) => "X509v3 Authority Key Identifier".into(),
        ParsedExtension::AuthorityInfoAccess(_) => "Authority Information Access".into(),
        _ => oid_name(&ext.oid),
    }
}

fn extension_value(ext: &X509Extension<'_>) -> String {
    match ext.parsed_extension() {
        ParsedExtension::SubjectAlternativeName(san) => san
            .general_names
            .iter()
            .map(general_name)
            .collect::<Vec<_>>()
            .join(", "),
        ParsedExtension::KeyUsage(ku) => {
            let flags = [
                (ku.digital_signature(), "Digital Signature"),
                (ku.non_repudiation(), "Non Repudiation"),
                (ku.key_encipherment(), "Key Encipherment"),
                (ku.data_encipherment(), "Data Encipherment"),
                (ku.key_agreement(), "Key Agreement"),
                (ku.key_cert_sign(), "Certificate Sign"),
                (ku.crl_sign(), "CRL Sign"),
                (ku.encipher_only(), "Encipher Only"),
                (ku.decipher_only(), "Decipher Only"),
            ];
            flags
                .iter()
                .filter(|(set, _)| *set)
                .map(|(_, name)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        }
        ParsedExtension::ExtendedKeyUsage(eku) => {
            let mut usages = Vec::new();
            if eku.any {
                usages.push("Any Extended Key Usage".to_string());
            }
            if eku.server_auth {
                usages.push("TLS Web Server Authentication".to_string());
            }
            if eku.client_auth {
                usages.push("TLS Web Client Authentication".to_string());
            }
            if eku.code_signing {
                usages.push("Code Signing".to_string());
            }
            if eku.email_protection {
                usages.push("E-mail Protection".to_string());
            }
            if eku.time_stamping {
                usages.push("Time Stamping".to_string());
            }
            if eku.ocsp_signing {
                usages.push("OCSP Signing".to_string());
            }
            usages.extend(eku.other.iter().map(oid_name));
            usages.join(", ")
        }
        ParsedExtension::BasicConstraints(bc) => match bc.path_len_constraint {
            Some(len) => format!("CA:{}, pathlen:{}", bc.ca.to_string().to_uppercase(), len),
            None => format!("CA:{}", bc.ca.to_string().to_uppercase()),
        },
        ParsedExtension::SubjectKeyIdentifier(ski) => hex_colon(ski.0),
        ParsedExtension::AuthorityKeyIdentifier(aki) => match &aki.key_identifier {
            Some(id) => format!("keyid:{}", hex_colon(id.0)),
            None => String::new(),
        },
        ParsedExtension::AuthorityInfoAccess(aia) => aia
            .accessdescs
            .iter()
            .map(|desc| {
                format!(
                    "{} - {}",
                    oid_name(&desc.access_method),
                    general_name(&desc.access_location)
                )
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => hex_colon(ext.value),
    }
}

fn general_name(name: &GeneralName<'_>) -> String {
    match name {
        GeneralName::DNSName(dns) => format!("DNS:{}", dns),
        GeneralName::RFC822Name(email) => format!("email:{}", email),
        GeneralName::URI(uri) => format!("URI:{}", uri),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => format!("IP Address:{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3]),
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(bytes);
                format!("IP Address:{}", std::net::Ipv6Addr::from(octets))
            }
            _ => format!("IP Address:{}", hex_colon(bytes)),
        },
        other => format!("{:?}", other),
    }
}
