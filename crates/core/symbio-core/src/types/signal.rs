//! Scheduler signals handed from the curriculum to the task generator

use super::{Domain, VerifierSpec};
use serde::{Deserialize, Serialize};

/// A caller-supplied prompt that bypasses the domain generators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOverride {
    /// The prompt to emit verbatim
    pub prompt: String,
    /// Verifier attached by whoever supplied the override
    pub verifier: VerifierSpec,
}

/// What the scheduler asks the teacher to generate next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumSignal {
    /// Domain to generate in
    pub domain: Domain,
    /// Difficulty in [0, 1]
    pub difficulty: f64,
    /// Task id the generator must use
    pub next_task_id: String,
    /// Optional verbatim prompt with its verifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<PromptOverride>,
}

/// Caller overrides merged into the scheduler signal; explicit keys win
#[derive(Debug, Clone, Default)]
pub struct SignalOverrides {
    /// Replace the scheduled domain
    pub domain: Option<Domain>,
    /// Replace the scheduled difficulty
    pub difficulty: Option<f64>,
    /// Replace the generated task id
    pub next_task_id: Option<String>,
    /// Bypass the domain generators entirely
    pub prompt_override: Option<PromptOverride>,
}

impl CurriculumSignal {
    /// Apply caller overrides, keeping scheduler values for unset keys
    pub fn merged_with(mut self, overrides: &SignalOverrides) -> Self {
        if let Some(domain) = overrides.domain {
            self.domain = domain;
        }
        if let Some(difficulty) = overrides.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(ref task_id) = overrides.next_task_id {
            self.next_task_id = task_id.clone();
        }
        if let Some(ref prompt_override) = overrides.prompt_override {
            self.prompt_override = Some(prompt_override.clone());
        }
        self
    }
}
