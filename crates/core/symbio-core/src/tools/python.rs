//! Python tool: review-gated subprocess execution with a wall-clock timeout

use super::{Tool, ToolOutcome};
use crate::config::ToolingConfig;
use crate::security;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured stdout/stderr are truncated past this many bytes
const DEFAULT_MAX_OUTPUT_BYTES: usize = 256 * 1024;

fn truncate_output(mut text: String, limit: usize) -> String {
    if text.len() > limit {
        text.truncate(limit);
        text.push_str("\n[truncated]");
    }
    text
}

/// Run a reviewed code string through the interpreter
///
/// Shared by the python tool, the test tool, and the python verifier
/// variants. The review gate has already been applied by the caller.
pub(crate) async fn run_python(
    code: &str,
    config: &ToolingConfig,
    max_output_bytes: usize,
) -> ToolOutcome {
    if let Err(e) = std::fs::create_dir_all(&config.workdir) {
        return ToolOutcome::error(format!(
            "Failed to create workdir {}: {}",
            config.workdir.display(),
            e
        ));
    }

    let start = Instant::now();
    let mut command = Command::new("python3");
    command
        .arg("-c")
        .arg(code)
        .current_dir(&config.workdir)
        .env("PYTHONDONTWRITEBYTECODE", "1")
        .env("PYTHONUNBUFFERED", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let timeout = Duration::from_secs(config.timeout_seconds);
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return ToolOutcome::error(format!("Failed to spawn python3: {}", e)),
        Err(_) => {
            warn!("Python execution timed out after {:?}", timeout);
            let mut outcome =
                ToolOutcome::timeout(format!("Killed after {}s", config.timeout_seconds));
            outcome.elapsed_ms = start.elapsed().as_millis() as u64;
            return outcome;
        }
    };

    let stdout = truncate_output(
        String::from_utf8_lossy(&output.stdout).into_owned(),
        max_output_bytes,
    );
    let stderr = truncate_output(
        String::from_utf8_lossy(&output.stderr).into_owned(),
        max_output_bytes,
    );
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if output.status.success() {
        let result = stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .last()
            .unwrap_or_default()
            .trim()
            .to_string();
        debug!("Python completed in {}ms", elapsed_ms);
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

/// The built-in python tool
pub struct PythonTool {
    config: ToolingConfig,
    max_output_bytes: usize,
}

impl PythonTool {
    /// Create the tool from the tooling configuration
    pub fn new(config: ToolingConfig) -> Self {
        Self {
            config,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Override the captured-output ceiling
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        "Execute a short program; the last printed line is the result"
    }

    async fn execute(&self, input: &str) -> ToolOutcome {
        let report = security::review(input);
        if !report.safe {
            warn!("Python code blocked: {}", report.rationale());
            return ToolOutcome::blocked(report.rationale());
        }

        run_python(input, &self.config, self.max_output_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolStatus;
    use tempfile::TempDir;

    fn tool_with_workdir(dir: &TempDir) -> PythonTool {
        let config = ToolingConfig {
            workdir: dir.path().to_path_buf(),
            timeout_seconds: 5,
            ..Default::default()
        };
        PythonTool::new(config)
    }

    #[tokio::test]
    async fn test_result_is_last_stdout_line() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_workdir(&dir);
        let outcome = tool.execute("print('intermediate')\nprint(2 + 2)").await;
        assert_eq!(outcome.status, ToolStatus::Ok);
        assert_eq!(outcome.result, "4");
        assert!(outcome.stdout.contains("intermediate"));
    }

    #[tokio::test]
    async fn test_blocked_code_is_not_executed() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_workdir(&dir);
        let outcome = tool
            .execute("import os; os.system(\"rm -rf /\")")
            .await;
        assert_eq!(outcome.status, ToolStatus::Blocked);
        assert!(outcome.stderr.contains("blocked import: os"));
        assert!(outcome.stderr.contains("dangerous pattern"));
    }

    #[tokio::test]
    async fn test_raising_code_is_error() {
        let dir = TempDir::new().unwrap();
        let tool = tool_with_workdir(&dir);
        let outcome = tool.execute("raise ValueError('boom')").await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.stderr.contains("ValueError"));
    }

    #[tokio::test]
    async fn test_timeout_kills_subprocess() {
        let dir = TempDir::new().unwrap();
        let config = ToolingConfig {
            workdir: dir.path().to_path_buf(),
            timeout_seconds: 1,
            ..Default::default()
        };
        let tool = PythonTool::new(config);
        let outcome = tool
            .execute("while True:\n    pass")
            .await;
        assert_eq!(outcome.status, ToolStatus::Timeout);
    }

    #[test]
    fn test_truncate_output() {
        let long = "a".repeat(100);
        let truncated = truncate_output(long, 10);
        assert!(truncated.starts_with("aaaaaaaaaa"));
        assert!(truncated.ends_with("[truncated]"));
    }
}
