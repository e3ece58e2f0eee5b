//! Traefik ACME storage extraction
//!
//! Turns the certificates Traefik keeps in its ACME storage file into plain
//! PEM files, one directory per domain.
//!
//! # Architecture
//!
//! - [`AcmeDocument`] - Decodes the storage JSON (resolver → certificates)
//! - [`pem`] - Base64 decoding, chain splitting and leaf certificate parsing
//! - [`ArtifactStorage`] - Per-domain output directories and atomic writes
//! - [`Extractor`] - Runs the whole document through the steps above
//!
//! # Extraction Flow
//!
//! For every certificate entry with a non-empty main domain, in document
//! order:
//!
//! 1. The domain directory is created below the output directory
//! 2. The decoded certificate is written to `fullchain.pem`
//! 3. The full chain is split into `cert.pem` and `chain.pem`
//! 4. The leaf is parsed; its description goes to `info`
//! 5. The decoded key is written to `privkey.pem`
//! 6. Name and validity are recorded in the snapshot

mod document;
mod error;
mod extractor;
pub mod pem;
mod storage;

pub use document::{Account, AcmeDocument, CertificateEntry, Domain, Registration, RegistrationBody, Resolver};
pub use error::{ExtractError, PemError};
pub use extractor::Extractor;
pub use storage::{
    is_valid_domain_dir, ArtifactStorage, ARTIFACT_FILES, CERT_FILE, CHAIN_FILE, FULLCHAIN_FILE,
    INFO_FILE, PRIVKEY_FILE,
};
