use crate::command::{AptAction, AptCommand, CommandOutput};
use crate::{cache, status};
use apn_core::{
    error::{Error, Result},
    operation::{Operation, OperationResult},
    package::UpgradeCandidate,
    source::{PackageSource, ProgressCallback},
};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_APT_GET: &str = "apt-get";
const DEFAULT_ESCALATE: &str = "pkexec";
const DEFAULT_LISTS_DIR: &str = "/var/lib/apt/lists";

#[derive(Debug, Clone)]
pub struct AptConfig {
    pub apt_get: String,
    /// Helper that runs `apt-get` as root for refresh and commit. Without one
    /// both go through libapt in this process.
    pub escalate: Option<String>,
    pub dist_upgrade: bool,
    pub lists_dir: String,
}

impl Default for AptConfig {
    fn default() -> Self {
        // root needs no helper
        let is_root = unsafe { libc::geteuid() } == 0;

        Self {
            apt_get: DEFAULT_APT_GET.to_string(),
            escalate: (!is_root).then(|| DEFAULT_ESCALATE.to_string()),
            dist_upgrade: false,
            lists_dir: DEFAULT_LISTS_DIR.to_string(),
        }
    }
}

impl AptConfig {
    /// Defaults overridden by `APT_NOTIFIER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(apt_get) = var("APT_NOTIFIER_APT_GET").filter(|s| !s.is_empty()) {
            config.apt_get = apt_get;
        }

        if let Some(escalate) = var("APT_NOTIFIER_ESCALATE") {
            let escalate = escalate.trim().to_string();
            config.escalate = (!escalate.is_empty()).then_some(escalate);
        }

        if let Some(value) = var("APT_NOTIFIER_DIST_UPGRADE") {
            config.dist_upgrade = parse_bool("APT_NOTIFIER_DIST_UPGRADE", &value)?;
        }

        if let Some(dir) = var("APT_NOTIFIER_LISTS_DIR").filter(|s| !s.is_empty()) {
            config.lists_dir = dir;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::ConfigError(format!(
            "{} expects a boolean, got {:?}",
            key, other
        ))),
    }
}

pub struct AptBackend {
    config: AptConfig,
}

impl AptBackend {
    pub fn with_config(config: AptConfig) -> Result<Self> {
        if config.apt_get.is_empty() {
            return Err(Error::ConfigError("apt-get path is empty".into()));
        }

        Ok(Self { config })
    }

    // run apt-get behind the helper, streaming its status records
    async fn run_escalated(
        &self,
        helper: &str,
        action: &AptAction,
        progress: &ProgressCallback,
    ) -> Result<CommandOutput> {
        let command = AptCommand::build(&self.config, helper, action);
        let progress = progress.clone();

        command
            .run(move |line| {
                if let Some(event) = status::parse_line(line) {
                    progress(event);
                }
            })
            .await
    }
}

#[async_trait]
impl PackageSource for AptBackend {
    fn source_id(&self) -> &str {
        "apt"
    }

    fn display_name(&self) -> &str {
        "APT"
    }

    async fn is_available(&self) -> bool {
        Path::new(&self.config.lists_dir).exists()
    }

    async fn refresh(&self, progress: ProgressCallback) -> Result<()> {
        info!("Refreshing package lists");

        let Some(helper) = self.config.escalate.as_deref() else {
            return tokio::task::spawn_blocking(move || cache::refresh(progress))
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
        };

        let output = self
            .run_escalated(helper, &AptAction::Refresh, &progress)
            .await?;
        for warning in &output.warnings {
            warn!("apt-get update: {}", warning);
        }

        output.check()
    }

    async fn list_upgrades(&self, progress: ProgressCallback) -> Result<Vec<UpgradeCandidate>> {
        let dist_upgrade = self.config.dist_upgrade;

        let upgrades =
            tokio::task::spawn_blocking(move || cache::list_upgrades(dist_upgrade, &progress))
                .await
                .map_err(|e| Error::Other(e.to_string()))??;

        info!("{} upgradable packages", upgrades.len());
        Ok(upgrades)
    }

    async fn execute_with_progress(
        &self,
        operation: Operation,
        progress: ProgressCallback,
    ) -> Result<OperationResult> {
        let start = std::time::Instant::now();

        info!("Executing operation: {}", operation.kind);

        let (outcome, warnings) = match self.config.escalate.as_deref() {
            Some(helper) => {
                let action = AptAction::Commit(operation.clone());
                let output = self.run_escalated(helper, &action, &progress).await?;
                (output.check(), output.warnings)
            }
            None => {
                let dist_upgrade = self.config.dist_upgrade;
                let op = operation.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    cache::commit(&op, dist_upgrade, progress)
                })
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
                (outcome, Vec::new())
            }
        };
        let elapsed = start.elapsed().as_millis() as u64;

        // lock and authorization problems are for the caller to handle
        let result = match outcome {
            Ok(()) => OperationResult::success(operation.clone(), operation.packages, elapsed),
            Err(e) if e.is_lock_or_permission() => return Err(e),
            Err(e) => {
                warn!("{} failed: {}", operation.kind, e);
                OperationResult::failure(operation, e.to_string(), elapsed)
            }
        };

        Ok(warnings
            .into_iter()
            .fold(result, |result, warning| result.with_warning(warning)))
    }
}
