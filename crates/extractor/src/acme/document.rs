//! Traefik ACME storage document
//!
//! ```json
//! {
//!   "letsencrypt": {
//!     "Account": { "Email": "admin@example.com", "Registration": { ... }, ... },
//!     "Certificates": [
//!       {
//!         "domain": { "main": "example.com", "sans": ["www.example.com"] },
//!         "certificate": "<base64 of the PEM full chain>",
//!         "key": "<base64 of the PEM private key>",
//!         "Store": "default"
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! The format belongs to Traefik, so unknown fields are ignored and missing
//! fields fall back to empty values. Resolvers keep their document order.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use super::error::ExtractError;

/// Decode a JSON `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a certificate list where both the list and its elements may be
/// `null`. A `null` element becomes an empty entry, which extraction skips.
fn certificate_list<'de, D>(deserializer: D) -> Result<Vec<CertificateEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Option<CertificateEntry>>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Parsed ACME storage file: resolver name to resolver, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcmeDocument {
    resolvers: Vec<(String, Resolver)>,
}

impl AcmeDocument {
    /// Decode an ACME storage document.
    pub fn parse(raw: &[u8]) -> Result<Self, ExtractError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Resolvers in document order
    pub fn resolvers(&self) -> impl Iterator<Item = (&str, &Resolver)> {
        self.resolvers.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Look up a resolver by name
    pub fn resolver(&self, name: &str) -> Option<&Resolver> {
        self.resolvers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
    }

    /// All certificate entries across resolvers, in document order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CertificateEntry)> {
        self.resolvers().flat_map(|(name, resolver)| {
            resolver.certificates.iter().map(move |entry| (name, entry))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl<'de> Deserialize<'de> for AcmeDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = AcmeDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of ACME resolver names to resolvers")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut resolvers = Vec::with_capacity(map.size_hint().unwrap_or(0));
                // A `null` resolver is an empty one
                while let Some((name, resolver)) = map.next_entry::<String, Option<Resolver>>()? {
                    resolvers.push((name, resolver.unwrap_or_default()));
                }
                Ok(AcmeDocument { resolvers })
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// A certificate resolver and the certificates it obtained
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolver {
    #[serde(rename = "Account")]
    pub account: Option<Account>,
    #[serde(rename = "Certificates", deserialize_with = "certificate_list")]
    pub certificates: Vec<CertificateEntry>,
}

/// ACME account of a resolver; carried through, never interpreted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(rename = "Email", deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(rename = "Registration")]
    pub registration: Option<Registration>,
    #[serde(rename = "PrivateKey", deserialize_with = "null_as_default")]
    pub private_key: String,
    #[serde(rename = "KeyType", deserialize_with = "null_as_default")]
    pub key_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registration {
    #[serde(deserialize_with = "null_as_default")]
    pub body: RegistrationBody,
    #[serde(deserialize_with = "null_as_default")]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationBody {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub contact: Vec<String>,
}

/// One stored certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub domain: Domain,
    /// Base64 of the PEM full chain
    #[serde(deserialize_with = "null_as_default")]
    pub certificate: String,
    /// Base64 of the PEM private key
    #[serde(deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(rename = "Store", deserialize_with = "null_as_default")]
    pub store: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    /// Canonical certificate name; artifacts are grouped under it
    #[serde(deserialize_with = "null_as_default")]
    pub main: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sans: Vec<String>,
}
