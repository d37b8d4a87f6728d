use apn_core::UpgradeCandidate;
use chrono::{DateTime, Utc};

/// One line of the upgradable-packages list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRow {
    pub upgrading: bool,
    pub name: String,
    pub full_name: String,
    pub version: String,
}

impl From<&UpgradeCandidate> for PackageRow {
    fn from(candidate: &UpgradeCandidate) -> Self {
        Self {
            upgrading: true,
            name: candidate.name.clone(),
            full_name: candidate.full_name.clone(),
            version: candidate.candidate_version.to_string(),
        }
    }
}

// which child of the package stack is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    Packages,
    #[default]
    Empty,
}

/// The rows mirroring the upgrades the package manager has marked.
#[derive(Debug, Clone, Default)]
pub struct PackageList {
    rows: Vec<PackageRow>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl PackageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[PackageRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn append(&mut self, row: PackageRow) {
        self.rows.push(row);
    }

    /// Flips a row's upgrade mark, returning the new value.
    pub fn set_upgrading(&mut self, full_name: &str, upgrading: bool) -> Option<bool> {
        let row = self.rows.iter_mut().find(|r| r.full_name == full_name)?;
        row.upgrading = upgrading;
        Some(row.upgrading)
    }

    pub fn marked(&self) -> Vec<&PackageRow> {
        self.rows.iter().filter(|r| r.upgrading).collect()
    }

    pub fn all_marked(&self) -> bool {
        self.rows.iter().all(|r| r.upgrading)
    }

    pub fn view(&self) -> ViewState {
        if self.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Packages
        }
    }

    // the Update button follows the model, not the marks
    pub fn can_upgrade(&self) -> bool {
        !self.is_empty()
    }
}
