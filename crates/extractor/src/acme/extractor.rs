//! Extraction of per-domain artifacts from the ACME storage file

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use certex_config::ExtractorConfig;

use super::document::{AcmeDocument, CertificateEntry};
use super::error::ExtractError;
use super::pem;
use super::storage::{ArtifactStorage, CERT_FILE, CHAIN_FILE, FULLCHAIN_FILE, INFO_FILE, PRIVKEY_FILE};
use crate::index::{ExtractedCert, Snapshot};

/// Materializes the certificates of an ACME storage file on disk
///
/// A run treats the whole document as one unit: the first failing entry
/// aborts the run and no snapshot is produced. Artifacts already written
/// for earlier entries stay on disk.
#[derive(Debug)]
pub struct Extractor {
    acme_file: PathBuf,
    storage: ArtifactStorage,
    /// Serializes runs against the output directory
    run_lock: Mutex<()>,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            acme_file: config.acme_file().to_path_buf(),
            storage: ArtifactStorage::new(config.certs_dir()),
            run_lock: Mutex::new(()),
        }
    }

    /// ACME storage file read by every run
    pub fn acme_file(&self) -> &Path {
        &self.acme_file
    }

    /// Output storage
    pub fn storage(&self) -> &ArtifactStorage {
        &self.storage
    }

    /// Block runs until the returned guard is dropped
    #[cfg(test)]
    pub(crate) fn hold_run_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.run_lock.lock()
    }

    /// Read the ACME file, write every certificate's artifacts and return
    /// the resulting snapshot.
    ///
    /// Blocks while another run is in progress.
    pub fn run(&self) -> Result<Snapshot, ExtractError> {
        let _guard = self.run_lock.lock();

        let raw = fs::read(&self.acme_file).map_err(|source| ExtractError::Read {
            path: self.acme_file.clone(),
            source,
        })?;
        let document = AcmeDocument::parse(&raw)?;

        let mut snapshot = Snapshot::new();
        for (resolver, entry) in document.entries() {
            if entry.domain.main.is_empty() {
                debug!(resolver = %resolver, "Skipping certificate without main domain");
                continue;
            }

            let cert = self.extract_entry(resolver, entry)?;
            snapshot.insert(cert.name.clone(), cert);
        }

        Ok(snapshot)
    }

    fn extract_entry(
        &self,
        resolver: &str,
        entry: &CertificateEntry,
    ) -> Result<ExtractedCert, ExtractError> {
        let domain = entry.domain.main.as_str();
        info!(resolver = %resolver, domain = %domain, "Extracting certificate");

        self.storage.prepare_domain(domain)?;

        let full_chain = pem::decode_key_material(&entry.certificate)
            .map_err(|e| ExtractError::codec(domain, "certificate", e))?;
        self.storage
            .write_artifact(domain, FULLCHAIN_FILE, &full_chain)?;

        let (leaf, chain) = pem::split_chain(&full_chain);
        self.storage.write_artifact(domain, CERT_FILE, &leaf)?;
        self.storage.write_artifact(domain, CHAIN_FILE, &chain)?;

        let info = pem::parse_leaf(&leaf).map_err(|e| ExtractError::codec(domain, "certificate", e))?;
        self.storage
            .write_artifact(domain, INFO_FILE, info.summary.as_bytes())?;

        let key = pem::decode_key_material(&entry.key)
            .map_err(|e| ExtractError::codec(domain, "private key", e))?;
        self.storage.write_artifact(domain, PRIVKEY_FILE, &key)?;

        debug!(
            domain = %domain,
            not_before = %info.not_before,
            not_after = %info.not_after,
            "Extracted certificate"
        );

        Ok(ExtractedCert {
            name: domain.to_string(),
            not_before: info.not_before,
            not_after: info.not_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CertIndex;
    use crate::acme::storage::ARTIFACT_FILES;
    use crate::test_support::{chained_entry, document, entry, issue, Workspace};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_extracts_all_artifacts() {
        let ws = Workspace::new(&document("le", vec![chained_entry("example.com")]));
        let extractor = Extractor::new(&ws.config());

        let snapshot = extractor.run().unwrap();

        for file in ARTIFACT_FILES {
            assert!(ws.artifact("example.com", file).is_file(), "missing {file}");
        }

        let fullchain = ws.read_artifact("example.com", FULLCHAIN_FILE);
        let cert = ws.read_artifact("example.com", CERT_FILE);
        let chain = ws.read_artifact("example.com", CHAIN_FILE);
        assert_eq!(fullchain.matches("BEGIN CERTIFICATE").count(), 2);
        assert_eq!(cert.matches("BEGIN CERTIFICATE").count(), 1);
        assert_eq!(chain.matches("BEGIN CERTIFICATE").count(), 1);
        assert!(cert.trim_end().ends_with(crate::acme::pem::END_CERTIFICATE));
        assert!(ws.read_artifact("example.com", PRIVKEY_FILE).contains("PRIVATE KEY"));
        assert!(ws.read_artifact("example.com", INFO_FILE).contains("example.com"));

        let cert = &snapshot["example.com"];
        assert_eq!(cert.not_before, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(cert.not_after, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());

        let index = CertIndex::new();
        index.replace(snapshot);
        let listed = index.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "example.com");
        assert_eq!(listed[0].not_before_string(), "02.01.2024");
        assert_eq!(listed[0].not_after_string(), "01.04.2024");
    }

    #[test]
    fn test_single_certificate_has_empty_chain() {
        let leaf = issue("solo.example.com", (2024, 2, 1), (2024, 5, 1));
        let ws = Workspace::new(&document(
            "le",
            vec![entry("solo.example.com", &leaf.cert_pem, &leaf.key_pem)],
        ));

        Extractor::new(&ws.config()).run().unwrap();

        assert!(ws.read_artifact("solo.example.com", CHAIN_FILE).is_empty());
        assert!(!ws.read_artifact("solo.example.com", CERT_FILE).is_empty());
    }

    #[test]
    fn test_entries_across_resolvers() {
        let a = issue("a.example.com", (2024, 1, 1), (2024, 3, 1));
        let b = issue("b.example.com", (2024, 1, 1), (2024, 3, 1));
        let raw = json!({
            "first": { "Account": null, "Certificates": [entry("a.example.com", &a.cert_pem, &a.key_pem)] },
            "second": { "Certificates": [entry("b.example.com", &b.cert_pem, &b.key_pem)] },
            "empty": { "Certificates": null }
        })
        .to_string();
        let ws = Workspace::new(&raw);

        let snapshot = Extractor::new(&ws.config()).run().unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(ws.domain_dir("a.example.com").is_dir());
        assert!(ws.domain_dir("b.example.com").is_dir());
    }

    #[test]
    fn test_decode_failure_aborts_run() {
        let mut broken = chained_entry("broken.example.com");
        broken["certificate"] = json!("not base64!");
        let ws = Workspace::new(&document(
            "le",
            vec![chained_entry("good.example.com"), broken],
        ));

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(
            err,
            ExtractError::Decode { ref domain, artifact: "certificate", .. } if domain == "broken.example.com"
        ));
        assert_eq!(err.domain(), Some("broken.example.com"));
        // Artifacts of the entry before the failure stay on disk
        assert!(ws.artifact("good.example.com", PRIVKEY_FILE).is_file());
        assert!(!ws.artifact("broken.example.com", FULLCHAIN_FILE).exists());
    }

    #[test]
    fn test_bad_private_key_encoding() {
        let mut bad_key = chained_entry("key.example.com");
        bad_key["key"] = json!("%%%");
        let ws = Workspace::new(&document("le", vec![bad_key]));

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::Decode { artifact: "private key", .. }));
        // Certificate artifacts were written before the key failed
        assert!(ws.artifact("key.example.com", INFO_FILE).is_file());
        assert!(!ws.artifact("key.example.com", PRIVKEY_FILE).exists());
    }

    #[test]
    fn test_certificate_without_pem_block() {
        let ws = Workspace::new(&document("le", vec![entry("junk.example.com", "no pem here", "key")]));

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::Decode { artifact: "certificate", .. }));
        assert!(ws.artifact("junk.example.com", FULLCHAIN_FILE).is_file());
        assert!(!ws.artifact("junk.example.com", INFO_FILE).exists());
    }

    #[test]
    fn test_unparseable_leaf() {
        let garbage = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let ws = Workspace::new(&document("le", vec![entry("junk.example.com", garbage, "key")]));

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::Parse { ref domain, .. } if domain == "junk.example.com"));
        assert!(ws.artifact("junk.example.com", CERT_FILE).is_file());
        assert!(!ws.artifact("junk.example.com", INFO_FILE).exists());
    }

    #[test]
    fn test_empty_main_domain_is_skipped() {
        let ws = Workspace::new(&document(
            "le",
            vec![entry("", "ignored", "ignored"), chained_entry("kept.example.com")],
        ));

        let snapshot = Extractor::new(&ws.config()).run().unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("kept.example.com"));
        let storage = ArtifactStorage::new(&ws.certs_dir);
        assert_eq!(storage.list_domains().unwrap(), vec!["kept.example.com"]);
    }

    #[test]
    fn test_null_resolver_and_entry_do_not_block_extraction() {
        let raw = json!({
            "stale": null,
            "le": { "Certificates": [null, chained_entry("kept.example.com")] }
        })
        .to_string();
        let ws = Workspace::new(&raw);

        let snapshot = Extractor::new(&ws.config()).run().unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("kept.example.com"));
    }

    #[test]
    fn test_runs_wait_for_run_in_progress() {
        let ws = Workspace::new(&document("le", vec![chained_entry("a.example.com")]));
        let extractor = Arc::new(Extractor::new(&ws.config()));

        let guard = extractor.hold_run_lock();
        let waiting: Vec<_> = (0..3)
            .map(|_| {
                let extractor = Arc::clone(&extractor);
                thread::spawn(move || extractor.run())
            })
            .collect();

        thread::sleep(Duration::from_millis(200));
        assert!(waiting.iter().all(|handle| !handle.is_finished()));
        assert!(!ws.domain_dir("a.example.com").exists());

        drop(guard);
        for handle in waiting {
            let snapshot = handle.join().unwrap().unwrap();
            assert!(snapshot.contains_key("a.example.com"));
        }
    }

    #[test]
    fn test_duplicate_domain_later_entry_wins() {
        let first = issue("dup.example.com", (2024, 1, 1), (2024, 2, 1));
        let second = issue("dup.example.com", (2024, 6, 1), (2024, 9, 1));
        let ws = Workspace::new(&document(
            "le",
            vec![
                entry("dup.example.com", &first.cert_pem, &first.key_pem),
                entry("dup.example.com", &second.cert_pem, &second.key_pem),
            ],
        ));

        let snapshot = Extractor::new(&ws.config()).run().unwrap();

        assert_eq!(snapshot.len(), 1);
        let cert = &snapshot["dup.example.com"];
        assert_eq!(cert.not_before, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(ws.read_artifact("dup.example.com", PRIVKEY_FILE), second.key_pem);
    }

    #[test]
    fn test_removed_domain_leaves_directory() {
        let ws = Workspace::new(&document(
            "le",
            vec![chained_entry("old.example.com"), chained_entry("new.example.com")],
        ));
        let extractor = Extractor::new(&ws.config());
        let index = CertIndex::new();
        index.replace(extractor.run().unwrap());
        assert_eq!(index.len(), 2);

        ws.write_document(&document("le", vec![chained_entry("new.example.com")]));
        index.replace(extractor.run().unwrap());

        let names: Vec<String> = index.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["new.example.com"]);
        assert!(ws.domain_dir("old.example.com").is_dir());
    }

    #[test]
    fn test_path_like_domain_is_rejected() {
        let ws = Workspace::new(&document("le", vec![chained_entry("../escape")]));

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::InvalidDomain(ref d) if d == "../escape"));
    }

    #[test]
    fn test_malformed_document() {
        let ws = Workspace::new("{ not json");

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::Format(_)));
        assert!(!ws.certs_dir.exists());
    }

    #[test]
    fn test_missing_acme_file() {
        let ws = Workspace::new("{}");
        std::fs::remove_file(&ws.acme_file).unwrap();

        let err = Extractor::new(&ws.config()).run().unwrap_err();

        assert!(matches!(err, ExtractError::Read { ref path, .. } if path == &ws.acme_file));
    }

    #[test]
    fn test_empty_document_yields_empty_snapshot() {
        let ws = Workspace::new("{}");

        let snapshot = Extractor::new(&ws.config()).run().unwrap();

        assert!(snapshot.is_empty());
    }
}
