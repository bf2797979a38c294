//! Message catalog
//!
//! Maps HMC message numbers to classification rules. Lookup is an exact
//! `HashMap` hit on the message number, so classification cost does not grow
//! with the size of the catalog.

pub mod classification;
pub mod rule;

pub use classification::{Classification, UNKNOWN};
pub use rule::{CatalogRule, Outcome};

use crate::domain::LogEntry;
use crate::parser::TemplateError;
use rule::CatalogDocument;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// HMC versions (major.minor) the catalog format is known to describe.
pub const SUPPORTED_HMC_VERSIONS: &[&str] = &["2.13", "2.14", "2.15", "2.16"];

const BUILTIN_CATALOG: &str = include_str!("../../data/hmc_messages.yaml");

#[derive(Error, Debug)]
pub enum CatalogLoadError {
    #[error("cannot read message catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed message catalog: {0}")]
    Malformed(#[from] serde_yaml::Error),
    #[error("message catalog has no hmc_version tag")]
    MissingVersion,
    #[error("message catalog is for HMC version {0}, supported versions: {versions}", versions = SUPPORTED_HMC_VERSIONS.join(", "))]
    UnsupportedVersion(String),
    #[error("duplicate message number {0} in message catalog")]
    DuplicateNumber(String),
    #[error("invalid template for message {number}: {source}")]
    Template {
        number: String,
        #[source]
        source: TemplateError,
    },
    #[error("message {number}: placeholder {{{index}}} exceeds the highest supported index {max}", max = rule::MAX_PLACEHOLDER_INDEX)]
    PlaceholderIndex { number: String, index: usize },
    #[error("message {number}: initiator_address_item {item} does not name a placeholder of the message")]
    InitiatorItem { number: String, item: usize },
}

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    hmc_version: String,
    rules: HashMap<String, CatalogRule>,
}

impl MessageCatalog {
    /// Parse and validate a catalog document.
    pub fn load(document: &str) -> Result<Self, CatalogLoadError> {
        let doc: CatalogDocument = serde_yaml::from_str(document)?;

        let hmc_version = doc
            .hmc_version
            .filter(|v| !v.trim().is_empty())
            .ok_or(CatalogLoadError::MissingVersion)?;
        if major_minor(&hmc_version).is_none_or(|mm| !SUPPORTED_HMC_VERSIONS.contains(&mm)) {
            return Err(CatalogLoadError::UnsupportedVersion(hmc_version));
        }

        let mut rules = HashMap::with_capacity(doc.messages.len());
        for message in doc.messages {
            let rule = CatalogRule::from_document(message)?;
            if rules.contains_key(&rule.number) {
                return Err(CatalogLoadError::DuplicateNumber(rule.number));
            }
            rules.insert(rule.number.clone(), rule);
        }

        debug!(
            hmc_version = %hmc_version,
            rules = rules.len(),
            "Loaded message catalog"
        );

        Ok(Self { hmc_version, rules })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(&document)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogLoadError> {
        Self::load(BUILTIN_CATALOG)
    }

    pub fn hmc_version(&self) -> &str {
        &self.hmc_version
    }

    /// Whether this catalog was written for the given appliance version.
    pub fn is_applicable_to(&self, appliance_version: &str) -> bool {
        major_minor(&self.hmc_version) == major_minor(appliance_version)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, number: &str) -> Option<&CatalogRule> {
        self.rules.get(number)
    }

    /// Classify an entry. Total: unknown message numbers yield an
    /// unclassified result instead of an error.
    pub fn classify(&self, entry: &LogEntry) -> Classification<'_> {
        let Some(rule) = self.rules.get(&entry.message_number) else {
            debug!(
                message_number = %entry.message_number,
                log = %entry.log_type,
                "No catalog rule for message, forwarding unclassified"
            );
            return Classification::unclassified(entry.source_address.clone());
        };

        let args = rule.extract_args(&entry.message);
        let initiator_address = rule
            .initiator_address_item
            .and_then(|item| args.get(item))
            .filter(|address| !address.is_empty())
            .cloned()
            .or_else(|| entry.source_address.clone());

        Classification::classified(rule, args, initiator_address)
    }
}

fn major_minor(version: &str) -> Option<&str> {
    let version = version.trim();
    let mut parts = version.splitn(3, '.');
    let major = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty())?;
    let minor = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty())?;
    Some(&version[..major.len() + 1 + minor.len()])
}
