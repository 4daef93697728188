//! Shell tool: allowlisted command heads, no shell interpretation

use super::{Tool, ToolOutcome};
use crate::config::ToolingConfig;
use crate::security;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::warn;

/// The built-in shell tool, disabled by default
///
/// Commands are executed directly (no `/bin/sh`); the head must appear in
/// the configured allowlist and metacharacters reject the whole command.
pub struct ShellTool {
    config: ToolingConfig,
}

impl ShellTool {
    /// Create the tool from the tooling configuration
    pub fn new(config: ToolingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run an allowlisted command; the last stdout line is the result"
    }

    async fn execute(&self, input: &str) -> ToolOutcome {
        let report = security::review_shell(input, &self.config.allowed_shell);
        if !report.safe {
            warn!("Shell command blocked: {}", report.rationale());
            return ToolOutcome::blocked(report.rationale());
        }

        let mut parts = input.split_whitespace();
        let head = match parts.next() {
            Some(head) => head,
            None => return ToolOutcome::error("Empty command"),
        };

        let start = Instant::now();
        let mut command = Command::new(head);
        command
            .args(parts)
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Err(e) = std::fs::create_dir_all(&self.config.workdir) {
            return ToolOutcome::error(format!("Failed to create workdir: {}", e));
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolOutcome::error(format!("Failed to spawn '{}': {}", head, e)),
            Err(_) => {
                return ToolOutcome::timeout(format!(
                    "Killed after {}s",
                    self.config.timeout_seconds
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if output.status.success() {
            let result = stdout
                .lines()
                .filter(|l| !l.trim().is_empty())
                .last()
                .unwrap_or_default()
                .trim()
                .to_string();
            ToolOutcome {
                status: crate::types::ToolStatus::Ok,
                result,
                stdout,
                stderr,
                elapsed_ms,
            }
        } else {
            ToolOutcome {
                status: crate::types::ToolStatus::Error,
                result: String::new(),
                stdout,
                stderr,
                elapsed_ms,
            }
        }
    }
}
