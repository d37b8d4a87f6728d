use thiserror::Error;

// everything that can go wrong between us and the package manager
#[derive(Error, Debug)]
pub enum Error {
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Could not get lock: {0}")]
    LockFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{command} exited with {code:?}: {message}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors after which the cached package lists are still usable.
    pub fn is_lock_or_permission(&self) -> bool {
        matches!(self, Error::LockFailed(_) | Error::PermissionDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
