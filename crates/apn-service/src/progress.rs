//! Adapters from package-manager progress reports to a progress bar.

use apn_core::{ProgressCallback, ProgressEvent};
use std::sync::Arc;
use tracing::{debug, warn};

/// The widget side: anything that can show a fraction and a line of text.
pub trait ProgressBar: Send + Sync {
    fn set_fraction(&self, fraction: f64);
    fn set_text(&self, text: &str);
}

fn fraction(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}

/// Download progress.
pub struct AcquireProgress {
    bar: Arc<dyn ProgressBar>,
}

impl AcquireProgress {
    pub fn new(bar: Arc<dyn ProgressBar>) -> Self {
        Self { bar }
    }

    pub fn update(&self, percent: Option<f64>, description: &str) {
        debug!("acquire {:?}: {}", percent, description);

        if let Some(percent) = percent {
            self.bar.set_text(description);
            self.bar.set_fraction(fraction(percent));
        }
    }

    pub fn done(&self, description: &str) {
        debug!("finished {}", description);
        self.bar.set_fraction(1.0);
        self.bar.set_text(description);
    }
}

/// Cache phases (reading lists, building the dependency tree).
pub struct OpProgress {
    bar: Option<Arc<dyn ProgressBar>>,
}

impl OpProgress {
    pub fn new(bar: Option<Arc<dyn ProgressBar>>) -> Self {
        Self { bar }
    }

    pub fn update(&self, op: &str, subop: Option<&str>, percent: Option<f64>) {
        let text = match subop {
            Some(subop) if !subop.is_empty() => format!("{}/{}", op, subop),
            _ => op.to_string(),
        };
        debug!("{}: {:?}", text, percent);

        if let Some(bar) = &self.bar {
            bar.set_text(&text);
            if let Some(percent) = percent {
                bar.set_fraction(fraction(percent));
            }
        }
    }

    pub fn done(&self) {
        if let Some(bar) = &self.bar {
            bar.set_fraction(1.0);
        }
    }
}

/// dpkg progress while packages are unpacked and configured.
pub struct InstallProgress {
    bar: Option<Arc<dyn ProgressBar>>,
}

impl InstallProgress {
    pub fn new(bar: Option<Arc<dyn ProgressBar>>) -> Self {
        Self { bar }
    }

    pub fn status_change(&self, package: &str, percent: f64, status: &str) {
        debug!("{} {:.1}%: {}", package, percent, status);

        if let Some(bar) = &self.bar {
            bar.set_text(&format!("{}: {}", package, status));
            bar.set_fraction(fraction(percent));
        }
    }

    // the old conffile is kept, nothing to show
    pub fn conffile(&self, current: &str, new: &str) {
        debug!("keeping {} (new version in {})", current, new);
    }

    pub fn error(&self, package: &str, message: &str) {
        warn!("{}: {}", package, message);
    }
}

/// Routes progress events to the matching adapter.
pub struct ProgressAdapter {
    acquire: AcquireProgress,
    op: OpProgress,
    install: InstallProgress,
}

impl ProgressAdapter {
    pub fn new(bar: Arc<dyn ProgressBar>) -> Self {
        Self {
            acquire: AcquireProgress::new(bar.clone()),
            op: OpProgress::new(Some(bar.clone())),
            install: InstallProgress::new(Some(bar)),
        }
    }

    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Acquire {
                percent,
                description,
            } => self.acquire.update(percent, &description),
            ProgressEvent::AcquireDone { description } => self.acquire.done(&description),
            ProgressEvent::Operation { op, subop, percent } => {
                self.op.update(&op, subop.as_deref(), percent)
            }
            ProgressEvent::OperationDone => self.op.done(),
            ProgressEvent::InstallStatus {
                package,
                percent,
                status,
            } => self.install.status_change(&package, percent, &status),
            ProgressEvent::InstallError { package, message } => {
                self.install.error(&package, &message)
            }
            ProgressEvent::Conffile { current, new } => self.install.conffile(&current, &new),
        }
    }

    pub fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| self.handle(event))
    }
}

pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;

    if total < 60 {
        format!("{}s", total)
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}
