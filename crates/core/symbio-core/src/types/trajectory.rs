//! Trajectory records emitted per evolution step

use super::Task;
use serde::{Deserialize, Serialize};

/// Outcome of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// Tool ran and produced a result
    Ok,
    /// Tool ran and failed
    Error,
    /// Tool was not run (review gate, missing dependency)
    Blocked,
    /// Tool exceeded its wall-clock budget
    Timeout,
}

/// Record of one tool invocation inside a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Step id, unique within the plan
    pub step_id: String,
    /// Tool id
    pub tool: String,
    /// Input after substitution (template form before execution)
    pub input: String,
    /// Step ids this step depends on
    pub depends_on: Vec<String>,
    /// Outcome
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

impl ToolCall {
    /// True when the call completed successfully
    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }
}

/// Reward component breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Uncertainty-targeting component
    pub uncertainty: f64,
    /// Tool-usage component
    pub tool_use: f64,
    /// Novelty component
    pub novelty: f64,
    /// Correctness component
    pub correctness: f64,
    /// Weighted total
    pub total: f64,
}

impl Default for RewardBreakdown {
    fn default() -> Self {
        Self {
            uncertainty: 0.0,
            tool_use: 0.0,
            novelty: 0.0,
            correctness: 0.0,
            total: 0.0,
        }
    }
}

/// The emitted record of one co-evolution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// The task that was attempted
    pub task: Task,
    /// Final extracted answer
    pub result: String,
    /// Tool calls in execution order
    pub tool_calls: Vec<ToolCall>,
    /// Raw model output the answer was parsed from
    pub reasoning: String,
    /// Verifier verdict
    pub success: bool,
    /// Calibrated success probability in [0, 1]
    pub confidence: f64,
    /// Reward components and total
    pub reward: RewardBreakdown,
    /// Self-verification consensus confidence, when enabled
    pub verification: Option<f64>,
    /// Informational routing tag
    pub route: String,
    /// Emission timestamp (ms since epoch)
    pub timestamp: i64,
}

impl Trajectory {
    /// Build a trajectory shell before verification and reward
    pub fn new(task: Task, result: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            task,
            result: result.into(),
            tool_calls: Vec::new(),
            reasoning: reasoning.into(),
            success: false,
            confidence: 0.0,
            reward: RewardBreakdown::default(),
            verification: None,
            route: "local".to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Number of successful tool calls
    pub fn ok_tool_calls(&self) -> usize {
        self.tool_calls.iter().filter(|c| c.is_ok()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Domain, VerifierSpec};

    #[test]
    fn test_tool_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ToolStatus::Blocked).unwrap(),
            "\"blocked\""
        );
        assert_eq!(
            serde_json::to_string(&ToolStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    #[test]
    fn test_trajectory_single_line_json() {
        let task = Task::new(
            "t1",
            Domain::Math,
            0.2,
            "Solve 2x + 3 = 11 for x.",
            VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
        );
        let trajectory = Trajectory::new(task, "4", "Answer: 4");
        let line = serde_json::to_string(&trajectory).unwrap();
        assert!(!line.contains('\n'));

        let parsed: Trajectory = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.result, "4");
        assert_eq!(parsed.task.task_id, "t1");
    }

    #[test]
    fn test_ok_tool_calls_counts_only_ok() {
        let task = Task::new(
            "t1",
            Domain::Math,
            0.2,
            "p",
            VerifierSpec::ExactString {
                expected: "x".into(),
            },
        );
        let mut trajectory = Trajectory::new(task, "x", "");
        trajectory.tool_calls = vec![
            ToolCall {
                step_id: "step_1".into(),
                tool: "math".into(),
                input: "1+1".into(),
                depends_on: vec![],
                status: ToolStatus::Ok,
                result: "2".into(),
                stdout: String::new(),
                stderr: String::new(),
                elapsed_ms: 1,
            },
            ToolCall {
                step_id: "step_2".into(),
                tool: "python".into(),
                input: "import os".into(),
                depends_on: vec![],
                status: ToolStatus::Blocked,
                result: String::new(),
                stdout: String::new(),
                stderr: "blocked import: os".into(),
                elapsed_ms: 0,
            },
        ];
        assert_eq!(trajectory.ok_tool_calls(), 1);
    }
}
