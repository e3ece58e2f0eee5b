//! Error types for ACME file extraction

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the PEM/X.509 codec functions.
#[derive(Debug, Error)]
pub enum PemError {
    /// Key material is not valid standard base64
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Input holds no PEM block at all
    #[error("no PEM block found")]
    MissingBlock,

    /// A PEM block is present but malformed
    #[error("malformed PEM block: {0}")]
    Pem(::pem::PemError),

    /// The DER payload is not an X.509 certificate
    #[error("malformed X.509 certificate: {0}")]
    X509(String),

    /// Validity timestamps outside the representable range
    #[error("certificate validity out of range: {0}")]
    InvalidValidity(i64),
}

impl PemError {
    /// Whether this error came from parsing the certificate structure rather
    /// than from decoding its transport encoding.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, PemError::X509(_) | PemError::InvalidValidity(_))
    }
}

impl From<::pem::PemError> for PemError {
    fn from(err: ::pem::PemError) -> Self {
        match err {
            ::pem::PemError::MissingBeginTag | ::pem::PemError::MissingData => PemError::MissingBlock,
            other => PemError::Pem(other),
        }
    }
}

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// ACME file missing or unreadable
    #[error("failed to read ACME file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ACME file is not a valid storage document
    #[error("invalid ACME document: {0}")]
    Format(#[from] serde_json::Error),

    /// Base64 or PEM encoding of an entry is broken
    #[error("failed to decode {artifact} for domain '{domain}': {source}")]
    Decode {
        domain: String,
        artifact: &'static str,
        #[source]
        source: PemError,
    },

    /// Leaf certificate DER is malformed
    #[error("failed to parse certificate for domain '{domain}': {source}")]
    Parse {
        domain: String,
        #[source]
        source: PemError,
    },

    /// Output directory or artifact file could not be written
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Domain name cannot be used as a directory name
    #[error("domain '{0}' is not a valid directory name")]
    InvalidDomain(String),
}

impl ExtractError {
    /// Attach domain context to a codec error, classifying it as a decode or
    /// parse failure.
    pub fn codec(domain: &str, artifact: &'static str, source: PemError) -> Self {
        if source.is_parse_error() {
            ExtractError::Parse {
                domain: domain.to_string(),
                source,
            }
        } else {
            ExtractError::Decode {
                domain: domain.to_string(),
                artifact,
                source,
            }
        }
    }

    /// Domain the failing entry belongs to, if the error is entry-specific
    pub fn domain(&self) -> Option<&str> {
        match self {
            ExtractError::Decode { domain, .. } | ExtractError::Parse { domain, .. } => {
                Some(domain)
            }
            ExtractError::InvalidDomain(domain) => Some(domain),
            _ => None,
        }
    }
}
