use crate::progress::{format_duration, ProgressAdapter, ProgressBar};
use crate::state::{PackageList, PackageRow};
use apn_apt::{AptBackend, AptConfig};
use apn_core::{
    error::{Error, Result},
    operation::{Operation, OperationResult},
    package::UpgradeCandidate,
    source::PackageSource,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// What an upgrade run did, plus the list as it stands afterwards.
#[derive(Debug, Clone)]
pub struct UpgradeReport {
    pub result: Option<OperationResult>,
    pub packages: PackageList,
}

impl UpgradeReport {
    pub fn summary(&self) -> String {
        match &self.result {
            None => "Nothing to upgrade".to_string(),
            Some(result) if result.is_success() => format!(
                "Upgrade finished in {}",
                format_duration(result.duration_ms as f64 / 1000.0)
            ),
            Some(result) => format!(
                "Upgrade failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

// runs the package manager on behalf of the dialog and owns its list model
pub struct UpdateManager {
    source: Arc<dyn PackageSource>,
    packages: Arc<RwLock<PackageList>>,
}

impl UpdateManager {
    pub fn with_config(config: AptConfig) -> Result<Self> {
        let backend = AptBackend::with_config(config)?;
        info!("{} backend initialized", backend.display_name());
        Ok(Self::with_source(Arc::new(backend)))
    }

    pub fn with_source(source: Arc<dyn PackageSource>) -> Self {
        Self {
            source,
            packages: Arc::new(RwLock::new(PackageList::new())),
        }
    }

    pub async fn is_available(&self) -> bool {
        self.source.is_available().await
    }

    pub async fn packages(&self) -> PackageList {
        self.packages.read().await.clone()
    }

    /// Refreshes the package lists and marks the upgrade.
    ///
    /// A refresh that fails inside apt, for example on a held lock or an
    /// unreachable mirror, still lists upgrades from the lists already on disk.
    pub async fn update(&self, bar: Arc<dyn ProgressBar>) -> Result<Vec<UpgradeCandidate>> {
        info!("Running update...");
        let progress = ProgressAdapter::new(bar.clone()).into_callback();

        match self.source.refresh(progress.clone()).await {
            Ok(()) => {}
            Err(e @ Error::LockFailed(_)) => {
                warn!("Can't get lock: {}", e);
                bar.set_text("Can't get lock");
            }
            Err(e @ Error::PermissionDenied(_)) => {
                warn!("Refresh not authorized: {}", e);
                bar.set_text("Not authorized to refresh package lists");
            }
            Err(e @ (Error::CommandFailed { .. } | Error::TransactionError(_))) => {
                warn!("Refresh failed: {}", e);
                bar.set_text("Failed to refresh package lists");
            }
            Err(e) => return Err(e),
        }

        self.source.list_upgrades(progress).await
    }

    pub async fn populate_packages(&self, bar: Arc<dyn ProgressBar>) -> Result<PackageList> {
        info!("Populating with upgradable packages");
        let upgrades = self.update(bar).await?;

        let mut packages = self.packages.write().await;
        packages.clear();
        for candidate in upgrades.iter().filter(|c| c.is_upgrade()) {
            packages.append(PackageRow::from(candidate));
        }
        packages.checked_at = Some(Utc::now());

        Ok(packages.clone())
    }

    /// Commits the marked rows, then repopulates the list.
    pub async fn upgrade(&self, bar: Arc<dyn ProgressBar>) -> Result<UpgradeReport> {
        info!("Running upgrade...");

        let operation = {
            let packages = self.packages.read().await;
            let marked = packages.marked();

            if marked.is_empty() {
                None
            } else if packages.all_marked() {
                Some(Operation::system_upgrade())
            } else {
                Some(Operation::upgrade(
                    marked.iter().map(|r| r.full_name.clone()).collect(),
                ))
            }
        };

        let result = match operation {
            Some(operation) => {
                let progress = ProgressAdapter::new(bar.clone()).into_callback();
                match self.source.execute_with_progress(operation, progress).await {
                    Ok(result) => {
                        if let Some(error) = &result.error {
                            warn!("Upgrade failed: {}", error);
                        }
                        Some(result)
                    }
                    Err(e @ Error::LockFailed(_)) => {
                        warn!("Can't get lock: {}", e);
                        bar.set_text("Can't get lock");
                        None
                    }
                    Err(e @ Error::PermissionDenied(_)) => {
                        warn!("Upgrade not authorized: {}", e);
                        bar.set_text("Not authorized to upgrade packages");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                info!("No packages marked for upgrade");
                None
            }
        };

        let packages = self.populate_packages(bar).await?;

        Ok(UpgradeReport { result, packages })
    }

    /// Marks or unmarks one row for the next upgrade.
    pub async fn mark_upgrade(&self, full_name: &str, upgrading: bool) -> Result<()> {
        let mut packages = self.packages.write().await;
        set_row(&mut packages, full_name, upgrading)
    }

    /// [`mark_upgrade`](Self::mark_upgrade) for callers outside the runtime,
    /// such as the UI thread. The mark is in place before this returns.
    pub fn mark_upgrade_blocking(&self, full_name: &str, upgrading: bool) -> Result<()> {
        let mut packages = self.packages.blocking_write();
        set_row(&mut packages, full_name, upgrading)
    }

    pub async fn cleanup(&self) {
        info!("Closing package cache");
        self.packages.write().await.clear();
    }
}

fn set_row(packages: &mut PackageList, full_name: &str, upgrading: bool) -> Result<()> {
    packages
        .set_upgrading(full_name, upgrading)
        .map(|_| ())
        .ok_or_else(|| Error::PackageNotFound(full_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::{BarCall, RecordingBar};
    use apn_core::{ProgressCallback, ProgressEvent, Version};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        refresh_error: Mutex<Option<Error>>,
        commit_error: Mutex<Option<Error>>,
        commit_failure: Mutex<Option<String>>,
        upgrades: Mutex<Vec<UpgradeCandidate>>,
        committed: Mutex<Vec<Operation>>,
    }

    fn candidate(name: &str, from: &str, to: &str) -> UpgradeCandidate {
        UpgradeCandidate::new(
            name,
            "amd64",
            Some(Version::new(from)),
            Version::new(to),
        )
    }

    #[async_trait]
    impl PackageSource for FakeSource {
        fn source_id(&self) -> &str {
            "fake"
        }

        fn display_name(&self) -> &str {
            "Fake"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn refresh(&self, progress: ProgressCallback) -> Result<()> {
            progress(ProgressEvent::AcquireDone {
                description: "http://deb.debian.org bookworm InRelease".into(),
            });
            match self.refresh_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn list_upgrades(&self, progress: ProgressCallback) -> Result<Vec<UpgradeCandidate>> {
            progress(ProgressEvent::Operation {
                op: "Reading package lists".into(),
                subop: None,
                percent: None,
            });
            Ok(self.upgrades.lock().unwrap().clone())
        }

        async fn execute_with_progress(
            &self,
            operation: Operation,
            progress: ProgressCallback,
        ) -> Result<OperationResult> {
            if let Some(e) = self.commit_error.lock().unwrap().take() {
                return Err(e);
            }
            if let Some(message) = self.commit_failure.lock().unwrap().take() {
                self.committed.lock().unwrap().push(operation.clone());
                return Ok(OperationResult::failure(operation, message, 800));
            }
            progress(ProgressEvent::InstallStatus {
                package: "bash".into(),
                percent: 100.0,
                status: "Installed bash".into(),
            });
            self.committed.lock().unwrap().push(operation.clone());
            // the upgrade went through, nothing left
            self.upgrades.lock().unwrap().clear();
            Ok(OperationResult::success(operation, Vec::new(), 1500))
        }
    }

    fn manager_with(source: FakeSource) -> (UpdateManager, Arc<FakeSource>) {
        let source = Arc::new(source);
        (UpdateManager::with_source(source.clone()), source)
    }

    #[tokio::test]
    async fn test_populate_appends_marked_rows() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![
            candidate("bash", "5.2.15-2", "5.2.15-2+b2"),
            candidate("curl", "7.88.1-10", "7.88.1-10+deb12u5"),
        ];
        let (manager, _) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());

        let list = manager.populate_packages(bar.clone()).await.unwrap();

        assert_eq!(list.len(), 2);
        assert!(list.all_marked());
        assert_eq!(list.rows()[1].version, "7.88.1-10+deb12u5");
        assert!(list.checked_at.is_some());
        assert_eq!(bar.last_text().as_deref(), Some("Reading package lists"));
    }

    #[tokio::test]
    async fn test_update_survives_lock_failure() {
        let source = FakeSource::default();
        *source.refresh_error.lock().unwrap() = Some(Error::LockFailed("held by 42".into()));
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, _) = manager_with(source);

        let upgrades = manager
            .update(Arc::new(RecordingBar::default()))
            .await
            .unwrap();
        assert_eq!(upgrades.len(), 1);
    }

    #[tokio::test]
    async fn test_update_survives_denied_refresh() {
        let source = FakeSource::default();
        *source.refresh_error.lock().unwrap() =
            Some(Error::PermissionDenied("authorization failed".into()));
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, _) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());

        let upgrades = manager.update(bar.clone()).await.unwrap();

        assert_eq!(upgrades.len(), 1);
        assert!(bar.calls().contains(&BarCall::Text(
            "Not authorized to refresh package lists".into()
        )));
    }

    #[tokio::test]
    async fn test_update_survives_offline_refresh() {
        let source = FakeSource::default();
        *source.refresh_error.lock().unwrap() = Some(Error::CommandFailed {
            command: "pkexec env apt-get update".into(),
            code: Some(100),
            message: "Some index files failed to download".into(),
        });
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, _) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());

        let list = manager.populate_packages(bar.clone()).await.unwrap();

        assert_eq!(list.len(), 1);
        assert!(bar
            .calls()
            .contains(&BarCall::Text("Failed to refresh package lists".into())));
    }

    #[tokio::test]
    async fn test_update_propagates_other_errors() {
        let source = FakeSource::default();
        *source.refresh_error.lock().unwrap() =
            Some(Error::BackendUnavailable("apt-get not found".into()));
        let (manager, _) = manager_with(source);

        let result = manager.update(Arc::new(RecordingBar::default())).await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_upgrade_all_marked_is_system_upgrade() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![
            candidate("bash", "5.2.15-2", "5.2.15-2+b2"),
            candidate("curl", "7.88.1-10", "7.88.1-10+deb12u5"),
        ];
        let (manager, source) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());
        manager.populate_packages(bar.clone()).await.unwrap();

        let report = manager.upgrade(bar).await.unwrap();

        assert_eq!(
            source.committed.lock().unwrap().as_slice(),
            &[Operation::system_upgrade()]
        );
        assert!(report.packages.is_empty());
        assert_eq!(report.summary(), "Upgrade finished in 2s");
    }

    #[tokio::test]
    async fn test_upgrade_only_marked_rows() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![
            candidate("bash", "5.2.15-2", "5.2.15-2+b2"),
            candidate("curl", "7.88.1-10", "7.88.1-10+deb12u5"),
        ];
        let (manager, source) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());
        manager.populate_packages(bar.clone()).await.unwrap();

        manager.mark_upgrade("bash:amd64", false).await.unwrap();
        manager.upgrade(bar).await.unwrap();

        assert_eq!(
            source.committed.lock().unwrap().as_slice(),
            &[Operation::upgrade(vec!["curl:amd64".into()])]
        );
    }

    #[tokio::test]
    async fn test_upgrade_lock_failure_still_repopulates() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, source) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());
        manager.populate_packages(bar.clone()).await.unwrap();

        *source.commit_error.lock().unwrap() = Some(Error::LockFailed("dpkg frontend".into()));
        let report = manager.upgrade(bar.clone()).await.unwrap();

        assert!(report.result.is_none());
        assert_eq!(report.packages.len(), 1);
        assert!(bar.calls().contains(&BarCall::Text("Can't get lock".into())));
    }

    #[tokio::test]
    async fn test_upgrade_not_authorized() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, source) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());
        manager.populate_packages(bar.clone()).await.unwrap();

        *source.commit_error.lock().unwrap() =
            Some(Error::PermissionDenied("authorization failed".into()));
        let report = manager.upgrade(bar.clone()).await.unwrap();

        assert!(report.result.is_none());
        assert!(bar
            .calls()
            .contains(&BarCall::Text("Not authorized to upgrade packages".into())));
        assert!(!bar.calls().contains(&BarCall::Text("Can't get lock".into())));
    }

    #[tokio::test]
    async fn test_failed_commit_still_repopulates() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, source) = manager_with(source);
        let bar = Arc::new(RecordingBar::default());
        manager.populate_packages(bar.clone()).await.unwrap();

        *source.commit_failure.lock().unwrap() =
            Some("Sub-process /usr/bin/dpkg returned an error code (1)".into());
        let report = manager.upgrade(bar).await.unwrap();

        assert_eq!(source.committed.lock().unwrap().len(), 1);
        assert!(report.result.as_ref().is_some_and(|r| !r.is_success()));
        assert_eq!(report.packages.len(), 1);
        assert_eq!(
            report.summary(),
            "Upgrade failed: Sub-process /usr/bin/dpkg returned an error code (1)"
        );
    }

    #[tokio::test]
    async fn test_upgrade_with_nothing_marked() {
        let (manager, source) = manager_with(FakeSource::default());

        let report = manager
            .upgrade(Arc::new(RecordingBar::default()))
            .await
            .unwrap();

        assert!(source.committed.lock().unwrap().is_empty());
        assert_eq!(report.summary(), "Nothing to upgrade");
    }

    #[tokio::test]
    async fn test_mark_unknown_package() {
        let (manager, _) = manager_with(FakeSource::default());
        let result = manager.mark_upgrade("ghost:amd64", true).await;
        assert!(matches!(result, Err(Error::PackageNotFound(_))));
    }

    #[test]
    fn test_mark_from_outside_the_runtime() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![
            candidate("bash", "5.2.15-2", "5.2.15-2+b2"),
            candidate("curl", "7.88.1-10", "7.88.1-10+deb12u5"),
        ];
        let (manager, source) = manager_with(source);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(manager.populate_packages(Arc::new(RecordingBar::default())))
            .unwrap();

        manager.mark_upgrade_blocking("curl:amd64", false).unwrap();
        assert!(matches!(
            manager.mark_upgrade_blocking("ghost:amd64", true),
            Err(Error::PackageNotFound(_))
        ));

        // an upgrade started right after sees the mark
        rt.block_on(manager.upgrade(Arc::new(RecordingBar::default())))
            .unwrap();
        assert_eq!(
            source.committed.lock().unwrap().as_slice(),
            &[Operation::upgrade(vec!["bash:amd64".into()])]
        );
    }

    #[tokio::test]
    async fn test_cleanup_clears_rows() {
        let source = FakeSource::default();
        *source.upgrades.lock().unwrap() = vec![candidate("bash", "5.2.15-2", "5.2.15-2+b2")];
        let (manager, _) = manager_with(source);
        manager
            .populate_packages(Arc::new(RecordingBar::default()))
            .await
            .unwrap();

        manager.cleanup().await;
        assert!(manager.packages().await.is_empty());
    }
}
