//! Package source trait defining the backend interface.

use crate::error::Result;
use crate::operation::{Operation, OperationResult, ProgressEvent};
use crate::package::UpgradeCandidate;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback type for progress updates.
///
/// Shared so one adapter can follow a refresh and the listing after it.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Trait implemented by package backends.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Returns the unique identifier for this source (e.g., "apt").
    fn source_id(&self) -> &str;

    /// Returns a human-readable name for this source.
    fn display_name(&self) -> &str;

    /// Checks if this backend is available on the system.
    async fn is_available(&self) -> bool;

    /// Downloads fresh package lists.
    async fn refresh(&self, progress: ProgressCallback) -> Result<()>;

    /// Opens the package cache, marks an upgrade and returns the installed
    /// packages that would be upgraded.
    async fn list_upgrades(&self, progress: ProgressCallback) -> Result<Vec<UpgradeCandidate>>;

    /// Executes a package operation with progress reporting.
    async fn execute_with_progress(
        &self,
        operation: Operation,
        progress: ProgressCallback,
    ) -> Result<OperationResult>;

    /// Executes a package operation.
    async fn execute(&self, operation: Operation) -> Result<OperationResult> {
        self.execute_with_progress(operation, Arc::new(|_: ProgressEvent| {})).await
    }
}
