//! Debounce and timeout validation

use std::time::Duration;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::ExtractorConfig;

/// Longest debounce window that does not look like a typo
const MAX_REASONABLE_SETTLE: Duration = Duration::from_secs(60);

/// Validate the debounce window and the extraction timeout
pub fn validate_timings(config: &ExtractorConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    let settle = config.settle_interval();
    if settle.is_zero() {
        result.add_warning(ValidationWarning::new(
            "Settle interval is 0ms; partially written ACME files may be read",
        ));
    } else if settle > MAX_REASONABLE_SETTLE {
        result.add_warning(ValidationWarning::new(format!(
            "Settle interval of {}ms delays every certificate update",
            config.settle_interval_ms
        )));
    }

    if let Some(timeout) = config.extract_timeout() {
        if timeout.is_zero() {
            result.add_error(ValidationError::new(
                ErrorCategory::Timing,
                "Extraction timeout must be at least 1 second",
            ));
        }
    }

    result
}
