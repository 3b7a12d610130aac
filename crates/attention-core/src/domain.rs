//! Life-domain taxonomy.
//!
//! The taxonomy is a closed, ordered set of labels fixed by configuration.
//! Order doubles as priority: earlier labels win classification ties and
//! `priority_domain_wins` overlap splits. `Unclassified` is always present and
//! always ranks last.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::ConfigError;

/// Label of the catch-all domain.
pub const UNCLASSIFIED: &str = "Unclassified";

/// A life-domain label (Work, Health, Social, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn unclassified() -> Self {
        Self(UNCLASSIFIED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unclassified(&self) -> bool {
        self.0 == UNCLASSIFIED
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of domains known at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    domains: Vec<Domain>,
}

impl Taxonomy {
    /// Build a taxonomy from labels in priority order.
    ///
    /// Labels are trimmed; empty and duplicate labels are rejected (case
    /// insensitively). `Unclassified` is appended if the caller left it out.
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::MissingKey("taxonomy.domains".into()));
        }

        let mut domains: Vec<Domain> = Vec::with_capacity(labels.len() + 1);
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(ConfigError::invalid("taxonomy.domains", "domain labels must not be empty"));
            }
            if domains.iter().any(|d| d.as_str().eq_ignore_ascii_case(label)) {
                return Err(ConfigError::invalid(
                    "taxonomy.domains",
                    format!("duplicate domain '{label}'"),
                ));
            }
            if label.eq_ignore_ascii_case(UNCLASSIFIED) {
                continue;
            }
            domains.push(Domain::new(label));
        }
        if domains.is_empty() {
            return Err(ConfigError::invalid(
                "taxonomy.domains",
                "at least one domain besides Unclassified is required",
            ));
        }
        domains.push(Domain::unclassified());

        Ok(Self { domains })
    }

    /// All domains in priority order, `Unclassified` last.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Domains that real rules can target (everything but `Unclassified`).
    pub fn classifiable(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter().filter(|d| !d.is_unclassified())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Look up a configured label, matching case-insensitively.
    pub fn resolve(&self, label: &str) -> Option<&Domain> {
        let label = label.trim();
        self.domains
            .iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(label))
    }

    /// Priority rank (0 = highest). Unknown domains rank after everything.
    pub fn rank(&self, domain: &Domain) -> usize {
        self.domains
            .iter()
            .position(|d| d == domain)
            .unwrap_or(self.domains.len())
    }

    /// Order two domains by priority, then lexically.
    pub fn compare(&self, a: &Domain, b: &Domain) -> Ordering {
        self.rank(a)
            .cmp(&self.rank(b))
            .then_with(|| a.as_str().cmp(b.as_str()))
    }
}
