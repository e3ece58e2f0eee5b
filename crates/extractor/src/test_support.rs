//! Fixtures shared by the extraction and watcher tests

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rcgen::{CertificateParams, DnType, KeyPair};
use serde_json::{json, Value};
use tempfile::TempDir;

use certex_config::ExtractorConfig;

/// Self-signed certificate and key as PEM text
pub(crate) struct Issued {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Issue a self-signed certificate for `domain` valid between the given
/// `(year, month, day)` dates.
pub(crate) fn issue(domain: &str, not_before: (i32, u8, u8), not_after: (i32, u8, u8)) -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![domain.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, domain);
    params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
    params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
    let cert = params.self_signed(&key).unwrap();

    Issued {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    }
}

/// One `Certificates` entry with base64 encoded certificate and key
pub(crate) fn entry(main: &str, certificate_pem: &str, key_pem: &str) -> Value {
    json!({
        "domain": { "main": main, "sans": [] },
        "certificate": STANDARD.encode(certificate_pem),
        "key": STANDARD.encode(key_pem),
        "Store": "default"
    })
}

/// Entry for a freshly issued certificate valid 2024-01-02 to 2024-04-01,
/// with one extra self-signed certificate standing in for the chain.
pub(crate) fn chained_entry(main: &str) -> Value {
    let leaf = issue(main, (2024, 1, 2), (2024, 4, 1));
    let intermediate = issue("intermediate.test", (2023, 1, 1), (2026, 1, 1));
    let full_chain = format!("{}\n{}", leaf.cert_pem, intermediate.cert_pem);
    entry(main, &full_chain, &leaf.key_pem)
}

/// ACME document with a single resolver holding `entries`
pub(crate) fn document(resolver: &str, entries: Vec<Value>) -> String {
    let mut root = serde_json::Map::new();
    root.insert(
        resolver.to_string(),
        json!({
            "Account": {
                "Email": "ops@example.com",
                "Registration": null,
                "PrivateKey": "",
                "KeyType": "4096"
            },
            "Certificates": entries
        }),
    );
    Value::Object(root).to_string()
}

/// Temporary ACME file and output directory
pub(crate) struct Workspace {
    _dir: TempDir,
    pub acme_file: PathBuf,
    pub certs_dir: PathBuf,
}

impl Workspace {
    pub fn new(initial_document: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let acme_file = dir.path().join("acme.json");
        let certs_dir = dir.path().join("ssl");
        std::fs::write(&acme_file, initial_document).unwrap();

        Self {
            _dir: dir,
            acme_file,
            certs_dir,
        }
    }

    pub fn config(&self) -> ExtractorConfig {
        ExtractorConfig::new(&self.acme_file, &self.certs_dir)
    }

    /// Overwrite the ACME file in place
    pub fn write_document(&self, document: &str) {
        std::fs::write(&self.acme_file, document).unwrap();
    }

    pub fn artifact(&self, domain: &str, file: &str) -> PathBuf {
        self.certs_dir.join(domain).join(file)
    }

    pub fn read_artifact(&self, domain: &str, file: &str) -> String {
        std::fs::read_to_string(self.artifact(domain, file)).unwrap()
    }

    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.certs_dir.join(domain)
    }
}
