use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Upgrade,
    SystemUpgrade,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Upgrade => write!(f, "Upgrade"),
            OperationKind::SystemUpgrade => write!(f, "System upgrade"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub packages: Vec<String>,
}

impl Operation {
    /// Upgrade only the named packages.
    pub fn upgrade(packages: Vec<String>) -> Self {
        Self {
            kind: OperationKind::Upgrade,
            packages,
        }
    }

    pub fn system_upgrade() -> Self {
        Self {
            kind: OperationKind::SystemUpgrade,
            packages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub status: OperationStatus,
    pub affected_packages: Vec<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl OperationResult {
    pub fn success(operation: Operation, affected: Vec<String>, duration_ms: u64) -> Self {
        Self {
            operation,
            status: OperationStatus::Completed,
            affected_packages: affected,
            warnings: Vec::new(),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(operation: Operation, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            operation,
            status: OperationStatus::Failed,
            affected_packages: Vec::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Completed
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// A progress report from the package manager.
///
/// Percentages are in `0.0..=100.0` as the package manager reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// Download progress across all items being fetched.
    Acquire {
        percent: Option<f64>,
        description: String,
    },
    /// One item was fetched or found up to date.
    AcquireDone { description: String },
    /// A cache phase such as reading the package lists.
    Operation {
        op: String,
        subop: Option<String>,
        percent: Option<f64>,
    },
    OperationDone,
    /// dpkg progress for one package.
    InstallStatus {
        package: String,
        percent: f64,
        status: String,
    },
    InstallError { package: String, message: String },
    Conffile { current: String, new: String },
}
