//! Task records emitted by the teacher agent

use crate::{Result, SymbioError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Maximum prompt length accepted at task validation
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Task domain
///
/// Variants are declared in lexicographic order so the derived `Ord`
/// matches the scheduler's tie-breaking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Function-writing tasks
    Code,
    /// Deduction and puzzle tasks
    Logic,
    /// Arithmetic and algebra tasks
    Math,
}

impl Domain {
    /// All domains in canonical (lexicographic) order
    pub const ALL: [Domain; 3] = [Domain::Code, Domain::Logic, Domain::Math];

    /// Stable string form used in signatures and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Math => "math",
            Domain::Logic => "logic",
            Domain::Code => "code",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = SymbioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "math" => Ok(Domain::Math),
            "logic" => Ok(Domain::Logic),
            "code" => Ok(Domain::Code),
            other => Err(SymbioError::validation(format!(
                "Unknown domain: '{}'",
                other
            ))),
        }
    }
}

/// How a candidate answer is judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifierSpec {
    /// Trimmed case-sensitive string equality
    ExactString {
        /// Expected answer
        expected: String,
    },
    /// Relative-tolerance numeric comparison
    Numeric {
        /// Expected value
        expected: f64,
        /// Relative tolerance
        tolerance: f64,
    },
    /// Multiset of numbers under tolerance; candidate is split on commas
    NumericSet {
        /// Expected values
        expected: Vec<f64>,
        /// Relative tolerance
        tolerance: f64,
    },
    /// Python boolean expression with a `{{candidate}}` placeholder
    PythonPredicate {
        /// Expression body
        body: String,
    },
    /// Python statement block that must complete without raising
    PythonAssert {
        /// Statement body
        body: String,
    },
    /// Anchored regular-expression match
    RegexMatch {
        /// Pattern, anchored by the verifier
        pattern: String,
    },
}

/// Immutable task record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within a run
    pub task_id: String,
    /// Task domain
    pub domain: Domain,
    /// Difficulty in [0, 1]
    pub difficulty: f64,
    /// Prompt shown to the student
    pub prompt: String,
    /// Informational constraints
    pub constraints: Vec<String>,
    /// Answer-judging spec
    pub verifier: VerifierSpec,
    /// Primitive metadata; always carries `created_at` (ms timestamp)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Build a task with `created_at` stamped into metadata
    pub fn new(
        task_id: impl Into<String>,
        domain: Domain,
        difficulty: f64,
        prompt: impl Into<String>,
        verifier: VerifierSpec,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "created_at".to_string(),
            serde_json::Value::from(chrono::Utc::now().timestamp_millis()),
        );
        Self {
            task_id: task_id.into(),
            domain,
            difficulty,
            prompt: prompt.into(),
            constraints: Vec::new(),
            verifier,
            metadata,
        }
    }

    /// Attach an informational constraint
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Self-validation applied before a task is emitted
    ///
    /// Rejects empty prompts, over-long prompts, NUL bytes, and control
    /// characters other than newline and tab.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(SymbioError::validation("Task prompt is empty"));
        }

        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(SymbioError::validation(format!(
                "Task prompt too long: {} > {} chars",
                self.prompt.chars().count(),
                MAX_PROMPT_CHARS
            )));
        }

        if self.prompt.contains('\0') {
            return Err(SymbioError::validation("Task prompt contains NUL"));
        }

        for ch in self.prompt.chars() {
            if ch.is_control() && ch != '\n' && ch != '\t' {
                return Err(SymbioError::validation(
                    "Task prompt contains control characters",
                ));
            }
        }

        if self.task_id.is_empty() {
            return Err(SymbioError::validation("Task id is empty"));
        }

        if !(0.0..=1.0).contains(&self.difficulty) {
            return Err(SymbioError::validation(format!(
                "Task difficulty out of range: {}",
                self.difficulty
            )));
        }

        Ok(())
    }
}
