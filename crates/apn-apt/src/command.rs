//! Building and running `apt-get` invocations.

use crate::backend::AptConfig;
use apn_core::{
    error::{Error, Result},
    operation::{Operation, OperationKind},
};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

const LOCK_MARKERS: [&str; 4] = [
    "Could not get lock",
    "Unable to lock",
    "Unable to acquire",
    "Could not open lock file",
];

pub(crate) const NOT_ROOT_MARKER: &str = "are you root?";

pub(crate) fn is_lock_message(line: &str) -> bool {
    LOCK_MARKERS.iter().any(|m| line.contains(m))
}

/// What the helper runs `apt-get` for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AptAction {
    Refresh,
    Commit(Operation),
}

/// An `apt-get` run behind the escalation helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AptCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AptCommand {
    pub fn build(config: &AptConfig, helper: &str, action: &AptAction) -> Self {
        // the helper scrubs the environment, so pass it through env(1)
        let mut args = vec![
            "env".to_string(),
            "DEBIAN_FRONTEND=noninteractive".to_string(),
            "LC_ALL=C".to_string(),
            config.apt_get.clone(),
            "-o".to_string(),
            "APT::Status-Fd=1".to_string(),
        ];

        match action {
            AptAction::Refresh => args.push("update".to_string()),
            AptAction::Commit(operation) => {
                // keep the installed conffile, there is nobody to ask
                args.extend([
                    "-y".to_string(),
                    "-o".to_string(),
                    "Dpkg::Options::=--force-confdef".to_string(),
                    "-o".to_string(),
                    "Dpkg::Options::=--force-confold".to_string(),
                ]);

                match operation.kind {
                    OperationKind::Upgrade if !operation.packages.is_empty() => {
                        args.push("install".to_string());
                        args.push("--only-upgrade".to_string());
                        args.extend(operation.packages.iter().cloned());
                    }
                    _ => args.push(upgrade_verb(config.dist_upgrade).to_string()),
                }
            }
        }

        Self {
            program: helper.to_string(),
            args,
        }
    }

    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Runs the command, handing every stdout line to `on_line`.
    pub async fn run<F>(&self, mut on_line: F) -> Result<CommandOutput>
    where
        F: FnMut(&str) + Send,
    {
        info!("Running {}", self.display());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::BackendUnavailable(format!("{} not found", self.program))
                }
                _ => Error::IoError(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("stderr not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("apt stderr: {}", line);
                collected.push(line);
            }
            collected
        });

        let mut warnings = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(warning) = crate::status::parse_warning(&line) {
                warnings.push(warning.to_string());
            }
            on_line(&line);
        }

        let status = child.wait().await?;
        let stderr = stderr_task
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

        for line in &stderr {
            if let Some(warning) = crate::status::parse_warning(line) {
                warnings.push(warning.to_string());
            }
        }

        Ok(CommandOutput {
            command: self.display(),
            code: status.code(),
            stderr,
            warnings,
        })
    }
}

fn upgrade_verb(dist_upgrade: bool) -> &'static str {
    if dist_upgrade {
        "dist-upgrade"
    } else {
        "upgrade"
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub code: Option<i32>,
    pub stderr: Vec<String>,
    pub warnings: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Maps a failed run onto the error the caller can act on.
    pub fn check(&self) -> Result<()> {
        if self.success() {
            return Ok(());
        }

        let errors: Vec<&str> = self
            .stderr
            .iter()
            .map(|l| l.trim())
            .filter(|l| l.starts_with("E:"))
            .map(|l| l.trim_start_matches("E:").trim())
            .collect();
        let message = if errors.is_empty() {
            self.stderr.last().cloned().unwrap_or_default()
        } else {
            errors.join("; ")
        };

        // pkexec: 126 dismissed, 127 not authorized
        if matches!(self.code, Some(126) | Some(127)) {
            return Err(Error::PermissionDenied(format!(
                "authorization failed for {}",
                self.command
            )));
        }

        // the lock files are not readable either, so check this first
        if self.stderr.iter().any(|l| l.contains(NOT_ROOT_MARKER)) {
            return Err(Error::PermissionDenied(message));
        }

        if self.stderr.iter().any(|l| is_lock_message(l)) {
            return Err(Error::LockFailed(message));
        }

        Err(Error::CommandFailed {
            command: self.command.clone(),
            code: self.code,
            message,
        })
    }
}
