//! In-memory index of extracted certificates
//!
//! The index holds an immutable snapshot behind an [`ArcSwap`]. The watcher
//! swaps in a complete new snapshot after every successful extraction;
//! readers always see one whole snapshot, never a mix of two.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Date format used when rendering validity dates (`DD.MM.YYYY`)
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Name and validity window of an extracted certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedCert {
    pub name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ExtractedCert {
    /// Start of validity as `DD.MM.YYYY`
    pub fn not_before_string(&self) -> String {
        self.not_before.format(DATE_FORMAT).to_string()
    }

    /// End of validity as `DD.MM.YYYY`
    pub fn not_after_string(&self) -> String {
        self.not_after.format(DATE_FORMAT).to_string()
    }
}

/// Certificates of one extraction run, keyed by name
pub type Snapshot = HashMap<String, ExtractedCert>;

/// Shared handle to the current certificate snapshot
///
/// Cloning is cheap; all clones observe the same snapshot.
#[derive(Clone)]
pub struct CertIndex {
    current: Arc<ArcSwap<Snapshot>>,
}

impl CertIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Snapshot::new())),
        }
    }

    /// Install `snapshot`, replacing the previous one as a whole
    pub fn replace(&self, snapshot: Snapshot) {
        debug!(certificates = snapshot.len(), "Replacing certificate index");
        self.current.store(Arc::new(snapshot));
    }

    /// All certificates, sorted by name in descending order
    pub fn list(&self) -> Vec<ExtractedCert> {
        let snapshot = self.current.load();
        let mut certs: Vec<ExtractedCert> = snapshot.values().cloned().collect();
        certs.sort_by(|a, b| b.name.cmp(&a.name));
        certs
    }

    /// Look up a single certificate
    pub fn get(&self, name: &str) -> Option<ExtractedCert> {
        self.current.load().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for CertIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CertIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertIndex")
            .field("certificates", &self.len())
            .finish()
    }
}
