//! On-disk artifact storage for extracted certificates
//!
//! # Directory Structure
//!
//! ```text
//! certs_dir/
//! └── example.com/
//!     ├── fullchain.pem  # Leaf certificate followed by intermediates
//!     ├── cert.pem       # Leaf certificate
//!     ├── chain.pem      # Intermediates only (may be empty)
//!     ├── privkey.pem    # Private key
//!     └── info           # Text description of the leaf certificate
//! ```
//!
//! Directories are world-readable so a separate serving process can hand the
//! files out. Directories of domains that disappear from the ACME file are
//! never removed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use super::error::ExtractError;

/// Full chain as stored by Traefik
pub const FULLCHAIN_FILE: &str = "fullchain.pem";
/// Leaf certificate
pub const CERT_FILE: &str = "cert.pem";
/// Intermediate certificates
pub const CHAIN_FILE: &str = "chain.pem";
/// Private key
pub const PRIVKEY_FILE: &str = "privkey.pem";
/// Text description of the leaf certificate
pub const INFO_FILE: &str = "info";

/// Every artifact written per domain
pub const ARTIFACT_FILES: [&str; 5] = [FULLCHAIN_FILE, CERT_FILE, CHAIN_FILE, PRIVKEY_FILE, INFO_FILE];

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Whether `domain` can be used as a single directory name below the
/// output directory.
pub fn is_valid_domain_dir(domain: &str) -> bool {
    !domain.is_empty()
        && domain != "."
        && domain != ".."
        && !domain.contains(['/', '\\', '\0'])
}

/// Artifact storage rooted at the output directory
#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    /// Base output directory
    base_path: PathBuf,
}

impl ArtifactStorage {
    /// Create storage rooted at `base_path`.
    ///
    /// Nothing is created on disk until the first domain is prepared.
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
        }
    }

    /// Get the storage base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the path to a domain's artifact directory
    pub fn domain_path(&self, domain: &str) -> PathBuf {
        self.base_path.join(domain)
    }

    /// Ensure the artifact directory for `domain` exists.
    pub fn prepare_domain(&self, domain: &str) -> Result<PathBuf, ExtractError> {
        if !is_valid_domain_dir(domain) {
            return Err(ExtractError::InvalidDomain(domain.to_string()));
        }

        let domain_path = self.domain_path(domain);
        let write_err = |source| ExtractError::Write {
            path: domain_path.clone(),
            source,
        };

        fs::create_dir_all(&domain_path).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&domain_path, fs::Permissions::from_mode(DIR_MODE))
                .map_err(write_err)?;
        }

        trace!(domain = %domain, path = %domain_path.display(), "Prepared domain directory");
        Ok(domain_path)
    }

    /// Atomically write one artifact of `domain`.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the target, so readers see either the old or the
    /// new file.
    pub fn write_artifact(
        &self,
        domain: &str,
        file: &str,
        contents: &[u8],
    ) -> Result<PathBuf, ExtractError> {
        let domain_path = self.domain_path(domain);
        let path = domain_path.join(file);
        let write_err = |source| ExtractError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&domain_path).map_err(write_err)?;
        tmp.write_all(contents).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(FILE_MODE))
                .map_err(write_err)?;
        }

        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(domain = %domain, file = %file, bytes = contents.len(), "Wrote artifact");
        Ok(path)
    }

    /// Get the path of an existing artifact
    ///
    /// Returns `None` for unknown artifact names, invalid domain names and
    /// artifacts that have not been written.
    pub fn artifact_path(&self, domain: &str, file: &str) -> Option<PathBuf> {
        if !is_valid_domain_dir(domain) || !ARTIFACT_FILES.contains(&file) {
            return None;
        }

        let path = self.domain_path(domain).join(file);
        path.is_file().then_some(path)
    }

    /// List all domain directories on disk
    pub fn list_domains(&self) -> std::io::Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut domains = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    domains.push(name.to_string());
                }
            }
        }
        domains.sort();

        Ok(domains)
    }
}
