//! certex Extractor Library
//!
//! Extracts TLS certificates and private keys from a Traefik ACME storage
//! file into one directory of PEM files per domain, and keeps an in-memory
//! index of the extracted certificates up to date while the file changes.
//!
//! This library provides:
//!
//! - **Extraction**: ACME document decoding, chain splitting, leaf parsing
//!   and atomic per-domain artifact writes
//! - **Index**: A lock-free, atomically swapped certificate snapshot for
//!   request handlers
//! - **Watching**: Debounced re-extraction on every write to the ACME file
//!
//! # Example
//!
//! ```ignore
//! use certex_config::ExtractorConfig;
//! use certex_extractor::{CertIndex, Watcher};
//!
//! let config = ExtractorConfig::from_env()?;
//! let index = CertIndex::new();
//!
//! // Background task; serving code only ever reads the index
//! tokio::spawn(Watcher::new(&config, index.clone()).run());
//!
//! for cert in index.list() {
//!     println!("{} {} - {}", cert.name, cert.not_before_string(), cert.not_after_string());
//! }
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod acme;
pub mod index;
pub mod watch;

#[cfg(test)]
mod test_support;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Extraction
pub use acme::{AcmeDocument, ArtifactStorage, ExtractError, Extractor, PemError};

// Certificate index
pub use index::{CertIndex, ExtractedCert, Snapshot};

// File watching
pub use watch::{wait_for_shutdown, ShutdownSignal, WatchError, Watcher};
