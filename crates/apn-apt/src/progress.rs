//! libapt progress callbacks forwarded as [`ProgressEvent`]s.

use apn_core::{ProgressCallback, ProgressEvent};
use rust_apt::progress::{DynAcquireProgress, DynInstallProgress};
use rust_apt::raw::{AcqTextStatus, ItemDesc, PkgAcquire};
use tracing::{debug, warn};

// half a second, in microseconds
const PULSE_INTERVAL: usize = 500_000;

/// Download progress for `cache.update` and `cache.commit`.
pub struct AcquireEvents {
    progress: ProgressCallback,
}

impl AcquireEvents {
    pub fn new(progress: ProgressCallback) -> Self {
        Self { progress }
    }
}

fn pulse_event(percent: f64, current: u64, total: u64) -> ProgressEvent {
    ProgressEvent::Acquire {
        percent: Some(percent),
        description: format!("Retrieving file {} of {}", current, total),
    }
}

impl DynAcquireProgress for AcquireEvents {
    fn pulse_interval(&self) -> usize {
        PULSE_INTERVAL
    }

    fn hit(&mut self, item: &ItemDesc) {
        (self.progress)(ProgressEvent::AcquireDone {
            description: item.description(),
        });
    }

    fn fetch(&mut self, item: &ItemDesc) {
        debug!("fetching {}", item.description());
    }

    fn fail(&mut self, item: &ItemDesc) {
        warn!("Failed to fetch {}", item.uri());
    }

    fn pulse(&mut self, status: &AcqTextStatus, _owner: &PkgAcquire) {
        (self.progress)(pulse_event(
            status.percent(),
            status.current_items(),
            status.total_items(),
        ));
    }

    fn done(&mut self, item: &ItemDesc) {
        (self.progress)(ProgressEvent::AcquireDone {
            description: item.description(),
        });
    }

    fn start(&mut self) {}

    fn stop(&mut self, _status: &AcqTextStatus) {}
}

/// dpkg progress for `cache.commit`.
pub struct InstallEvents {
    progress: ProgressCallback,
}

impl InstallEvents {
    pub fn new(progress: ProgressCallback) -> Self {
        Self { progress }
    }
}

fn step_percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    done as f64 * 100.0 / total as f64
}

impl DynInstallProgress for InstallEvents {
    fn status_changed(&mut self, pkgname: String, steps_done: u64, total_steps: u64, action: String) {
        (self.progress)(ProgressEvent::InstallStatus {
            package: pkgname,
            percent: step_percent(steps_done, total_steps),
            status: action,
        });
    }

    fn error(&mut self, pkgname: String, _steps_done: u64, _total_steps: u64, error: String) {
        (self.progress)(ProgressEvent::InstallError {
            package: pkgname,
            message: error,
        });
    }
}
