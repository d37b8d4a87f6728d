use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A Debian package version, `[epoch:]upstream[-revision]`.
///
/// Ordering is libapt's, so `1.01` and `1.1` compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub full: String,
}

impl Version {
    pub fn new(version_str: &str) -> Self {
        Self {
            full: version_str.trim().to_string(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        rust_apt::util::cmp_versions(&self.full, &other.full)
    }
}

/// A package the package manager would upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeCandidate {
    /// Short name, without the architecture qualifier.
    pub name: String,
    /// `name:arch`, unique across multi-arch installs.
    pub full_name: String,
    pub arch: String,
    pub current_version: Option<Version>,
    pub candidate_version: Version,
}

impl UpgradeCandidate {
    pub fn new(
        name: impl Into<String>,
        arch: impl Into<String>,
        current_version: Option<Version>,
        candidate_version: Version,
    ) -> Self {
        let name = name.into();
        let arch = arch.into();
        let full_name = if arch.is_empty() {
            name.clone()
        } else {
            format!("{}:{}", name, arch)
        };

        Self {
            name,
            full_name,
            arch,
            current_version,
            candidate_version,
        }
    }

    /// True for an installed package whose candidate is strictly newer.
    pub fn is_upgrade(&self) -> bool {
        self.current_version
            .as_ref()
            .is_some_and(|current| self.candidate_version > *current)
    }
}
