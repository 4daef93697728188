//! Tool registry and multi-step plan execution

use crate::config::ToolingConfig;
use crate::types::ToolStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

mod composer;
mod math;
pub(crate) mod python;
mod shell;

pub use composer::{PlanComposer, PlanResult};
pub use math::MathTool;
pub use python::PythonTool;
pub use shell::ShellTool;
pub use test::TestTool;

/// What one tool invocation produced
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Outcome status
    pub status: ToolStatus,
    /// Primary result value
    pub result: String,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Wall-clock execution time
    pub elapsed_ms: u64,
}

impl ToolOutcome {
    /// Successful outcome with a result value
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Ok,
            result: result.into(),
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 0,
        }
    }

    /// Failed outcome with a reason on stderr
    pub fn error(stderr: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            result: String::new(),
            stdout: String::new(),
            stderr: stderr.into(),
            elapsed_ms: 0,
        }
    }

    /// Blocked outcome with the review rationale on stderr
    pub fn blocked(rationale: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Blocked,
            result: String::new(),
            stdout: String::new(),
            stderr: rationale.into(),
            elapsed_ms: 0,
        }
    }

    /// Timeout outcome
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Timeout,
            result: String::new(),
            stdout: String::new(),
            stderr: detail.into(),
            elapsed_ms: 0,
        }
    }
}

/// One executable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool id the parser refers to
    fn name(&self) -> &str;

    /// Short description for prompts and logs
    fn description(&self) -> &str;

    /// Execute the tool on an input string
    async fn execute(&self, input: &str) -> ToolOutcome;
}

/// A tool-call template inside a plan, before execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step id, unique within the plan
    pub step_id: String,
    /// Tool id
    pub tool: String,
    /// Input template; may reference `{{step_k.result}}` / `{{step_k.stdout}}`
    pub input: String,
    /// Declared dependencies
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Optional steps may fail without failing the plan
    #[serde(default)]
    pub optional: bool,
}

impl PlanStep {
    /// Build a step with no declared dependencies
    pub fn new(
        step_id: impl Into<String>,
        tool: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            input: input.into(),
            depends_on: Vec::new(),
            optional: false,
        }
    }

    /// Add a declared dependency
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    /// Mark the step optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Registry of enabled tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build the registry the tooling configuration enables
    pub fn from_config(config: &ToolingConfig) -> Self {
        let mut registry = Self::new();
        if config.enable_math {
            registry.register(Arc::new(MathTool::new()));
        }
        if config.enable_python {
            registry.register(Arc::new(PythonTool::new(config.clone())));
        }
        if config.enable_shell {
            registry.register(Arc::new(ShellTool::new(config.clone())));
        }
        if config.enable_tests {
            registry.register(Arc::new(TestTool::new(config.clone())));
        }
        registry
    }

    /// Register a tool under its name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!("Registering tool: {}", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Names of all registered tools
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Execute a named tool; an unknown name is an error outcome
    pub async fn execute(&self, name: &str, input: &str) -> ToolOutcome {
        match self.get(name) {
            Some(tool) => tool.execute(input).await,
            None => ToolOutcome::error(format!(
                "Unknown tool '{}'. Available: {:?}",
                name,
                self.names()
            )),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_respects_config_toggles() {
        let config = ToolingConfig::default();
        let registry = ToolRegistry::from_config(&config);
        assert!(registry.get("math").is_some());
        assert!(registry.get("python").is_some());
        assert!(registry.get("shell").is_none());
        assert!(registry.get("test").is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.execute("nope", "input").await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert!(outcome.stderr.contains("Unknown tool"));
    }
}
