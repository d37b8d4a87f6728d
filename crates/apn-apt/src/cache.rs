//! In-process access to the APT cache through libapt.
//!
//! Everything here blocks and must run off the async executor.

use crate::command::{is_lock_message, NOT_ROOT_MARKER};
use crate::progress::{AcquireEvents, InstallEvents};
use apn_core::{
    error::{Error, Result},
    operation::{Operation, OperationKind},
    package::{UpgradeCandidate, Version},
    source::ProgressCallback,
    ProgressEvent,
};
use rust_apt::cache::{Cache, Upgrade};
use rust_apt::config::Config;
use rust_apt::error::AptErrors;
use rust_apt::new_cache;
use rust_apt::progress::{AcquireProgress, InstallProgress};
use tracing::{debug, info};

fn phase(progress: &ProgressCallback, op: &str) {
    progress(ProgressEvent::Operation {
        op: op.to_string(),
        subop: None,
        percent: None,
    });
}

fn open(progress: &ProgressCallback) -> Result<Cache> {
    phase(progress, "Reading package lists");
    let cache = new_cache!().map_err(|e| Error::DatabaseError(e.to_string()))?;
    progress(ProgressEvent::OperationDone);
    Ok(cache)
}

fn upgrade_kind(dist_upgrade: bool) -> Upgrade {
    if dist_upgrade {
        Upgrade::FullUpgrade
    } else {
        Upgrade::SafeUpgrade
    }
}

fn mark_upgrade(cache: &Cache, dist_upgrade: bool, progress: &ProgressCallback) -> Result<()> {
    phase(progress, "Calculating upgrade");
    cache
        .upgrade(upgrade_kind(dist_upgrade))
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    progress(ProgressEvent::OperationDone);
    Ok(())
}

/// Opens the cache, marks an upgrade and returns the installed packages it
/// would upgrade. Needs no privileges.
pub fn list_upgrades(dist_upgrade: bool, progress: &ProgressCallback) -> Result<Vec<UpgradeCandidate>> {
    let cache = open(progress)?;
    mark_upgrade(&cache, dist_upgrade, progress)?;

    let upgrades: Vec<UpgradeCandidate> = cache
        .get_changes(false)
        .filter(|pkg| pkg.marked_upgrade())
        .filter_map(|pkg| {
            let candidate = pkg.candidate()?;
            Some(UpgradeCandidate::new(
                pkg.name(),
                pkg.arch(),
                pkg.installed().map(|v| Version::new(v.version())),
                Version::new(candidate.version()),
            ))
        })
        .collect();

    debug!("{} packages marked for upgrade", upgrades.len());
    Ok(upgrades)
}

/// Downloads fresh package lists.
pub fn refresh(progress: ProgressCallback) -> Result<()> {
    let cache = open(&progress)?;
    let mut acquire = AcquireProgress::new(AcquireEvents::new(progress));

    cache.update(&mut acquire).map_err(apt_error)
}

/// Marks `operation` and commits it.
pub fn commit(operation: &Operation, dist_upgrade: bool, progress: ProgressCallback) -> Result<()> {
    let cache = open(&progress)?;

    match operation.kind {
        OperationKind::SystemUpgrade => mark_upgrade(&cache, dist_upgrade, &progress)?,
        OperationKind::Upgrade => {
            for name in &operation.packages {
                let pkg = cache
                    .get(name)
                    .ok_or_else(|| Error::PackageNotFound(name.clone()))?;
                pkg.mark_install(true, true);
                pkg.protect();
            }
            cache.resolve(true).map_err(apt_error)?;
        }
    }

    // keep the installed conffile, there is nobody to ask
    let config = Config::new();
    config.set("Dpkg::Options::", "--force-confdef");
    config.set("Dpkg::Options::", "--force-confold");

    info!("Committing {}", operation.kind);
    let mut acquire = AcquireProgress::new(AcquireEvents::new(progress.clone()));
    let mut install = InstallProgress::new(InstallEvents::new(progress));

    cache.commit(&mut acquire, &mut install).map_err(apt_error)
}

fn apt_error(errors: AptErrors) -> Error {
    error_from_message(errors.to_string())
}

fn error_from_message(message: String) -> Error {
    if message.contains(NOT_ROOT_MARKER) {
        Error::PermissionDenied(message)
    } else if message.lines().any(is_lock_message) {
        Error::LockFailed(message)
    } else {
        Error::TransactionError(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            error_from_message(
                "E: Could not get lock /var/lib/apt/lists/lock. It is held by process 42".into()
            ),
            Error::LockFailed(_)
        ));
        assert!(matches!(
            error_from_message(
                "E: Could not open lock file /var/lib/apt/lists/lock - open (13: Permission denied)\n\
                 E: Unable to lock directory /var/lib/apt/lists/, are you root?"
                    .into()
            ),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            error_from_message("E: Sub-process /usr/bin/dpkg returned an error code (1)".into()),
            Error::TransactionError(_)
        ));
    }

    #[test]
    fn test_list_upgrades_on_this_system() {
        if !Path::new("/var/lib/dpkg/status").exists() || !Path::new("/var/lib/apt/lists").exists()
        {
            return;
        }

        let progress: ProgressCallback = Arc::new(|_: ProgressEvent| {});
        let upgrades = list_upgrades(false, &progress).unwrap();

        // a safe upgrade only touches installed packages
        assert!(upgrades.iter().all(|c| c.current_version.is_some()));
    }
}
