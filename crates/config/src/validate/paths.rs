//! Path validation
//!
//! Checks that the ACME storage file exists and that the output directory is
//! usable.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::ExtractorConfig;

/// Validate the input file and the output directory
pub fn validate_paths(config: &ExtractorConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    let acme = config.acme_file();
    if acme.as_os_str().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Path,
            "ACME file path is empty",
        ));
    } else if !acme.exists() {
        // Traefik may not have written its storage yet; the watch would fail anyway
        result.add_error(ValidationError::new(
            ErrorCategory::Path,
            format!("ACME file not found: {:?}", acme),
        ));
    } else if !acme.is_file() {
        result.add_error(ValidationError::new(
            ErrorCategory::Path,
            format!("ACME file is not a regular file: {:?}", acme),
        ));
    }

    let certs_dir = config.certs_dir();
    if certs_dir.as_os_str().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Path,
            "Certificate output directory is empty",
        ));
    } else if certs_dir.exists() {
        if !certs_dir.is_dir() {
            result.add_error(ValidationError::new(
                ErrorCategory::Path,
                format!("Certificate output path is not a directory: {:?}", certs_dir),
            ));
        }
    } else {
        result.add_warning(ValidationWarning::new(format!(
            "Certificate output directory {:?} does not exist and will be created",
            certs_dir
        )));
    }

    if acme.parent() == Some(certs_dir) && !certs_dir.as_os_str().is_empty() {
        result.add_warning(ValidationWarning::new(format!(
            "ACME file {:?} lives inside the output directory; it will be listed next to domain directories",
            acme
        )));
    }

    result
}
