//! Tool-mediated solver driving the student model

use crate::config::{ModelConfig, VerificationConfig};
use crate::inference::{GenerateParams, InferenceEndpoint};
use crate::parser::parse_trace;
use crate::resilience::{retry_with_backoff, RetryConfig};
use crate::templates::TemplateEngine;
use crate::tools::{PlanComposer, ToolRegistry};
use crate::types::{Task, ToolCall};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Numeric extraction applied to tool output when no answer was parsed
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap());

/// What one solve produced, before verification and reward
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Final extracted answer; empty when nothing was extractable
    pub result: String,
    /// Tool calls in execution order
    pub tool_calls: Vec<ToolCall>,
    /// Raw model output
    pub reasoning: String,
    /// Consensus confidence when self-verification ran
    pub verification: Option<f64>,
    /// False when the consensus fell below the threshold
    pub verified: bool,
}

/// Drives the student model through a task
pub struct Solver {
    endpoint: Arc<dyn InferenceEndpoint>,
    model: ModelConfig,
    verification: VerificationConfig,
    templates: TemplateEngine,
    composer: PlanComposer,
    retry: RetryConfig,
}

impl Solver {
    /// Build a solver over the student endpoint
    pub fn new(
        endpoint: Arc<dyn InferenceEndpoint>,
        model: ModelConfig,
        verification: VerificationConfig,
    ) -> Self {
        Self {
            endpoint,
            model,
            verification,
            templates: TemplateEngine::new(),
            composer: PlanComposer::new(),
            retry: RetryConfig {
                max_retries: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(4),
                multiplier: 2.0,
            },
        }
    }

    /// Override the inference retry ladder
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Solve a task, optionally with self-verification
    pub async fn solve(&self, task: &Task, registry: &ToolRegistry) -> SolveOutcome {
        if !self.verification.enable {
            let mut outcome = self.solve_once(task, registry).await;
            outcome.verified = true;
            return outcome;
        }

        let samples = self.verification.num_samples.max(1);
        let mut attempts = Vec::with_capacity(samples);
        for _ in 0..samples {
            attempts.push(self.solve_once(task, registry).await);
        }

        // Modal answer with its share of the samples
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for attempt in &attempts {
            *counts.entry(attempt.result.as_str()).or_default() += 1;
        }
        let (modal, count) = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(a.0)))
            .expect("at least one attempt");
        let confidence = count as f64 / samples as f64;
        let modal = modal.to_string();

        let mut outcome = attempts
            .into_iter()
            .find(|a| a.result == modal)
            .expect("modal answer comes from an attempt");
        outcome.verification = Some(confidence);
        outcome.verified = confidence >= self.verification.confidence_threshold;

        if !outcome.verified {
            info!(
                task_id = %task.task_id,
                confidence,
                "Self-verification consensus below threshold"
            );
        }

        outcome
    }

    async fn solve_once(&self, task: &Task, registry: &ToolRegistry) -> SolveOutcome {
        let prompt = match self.templates.solver_prompt(task) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(task_id = %task.task_id, "Failed to render solver prompt: {}", e);
                return SolveOutcome::empty();
            }
        };

        let endpoint = self.endpoint.clone();
        let params_proto = GenerateParams::new(prompt)
            .with_temperature(self.model.temperature)
            .with_top_p(self.model.top_p);

        let text = match retry_with_backoff(self.retry.clone(), move || {
            let endpoint = endpoint.clone();
            let params = params_proto.clone();
            Box::pin(async move { endpoint.generate(params).await })
        })
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(task_id = %task.task_id, "Inference failed after retries: {}", e);
                return SolveOutcome::empty();
            }
        };

        let trace = parse_trace(&text);
        for issue in &trace.issues {
            debug!(
                task_id = %task.task_id,
                line = issue.line,
                "Parse issue: {}",
                issue.message
            );
        }

        let tool_calls = match self.composer.execute(&trace.steps, registry).await {
            Ok(plan) => plan.calls,
            Err(e) => {
                warn!(task_id = %task.task_id, "Tool plan rejected: {}", e);
                Vec::new()
            }
        };

        let result = extract_answer(&trace.answer, &tool_calls);

        SolveOutcome {
            result,
            tool_calls,
            reasoning: text,
            verification: None,
            verified: true,
        }
    }
}

impl SolveOutcome {
    fn empty() -> Self {
        Self {
            result: String::new(),
            tool_calls: Vec::new(),
            reasoning: String::new(),
            verification: None,
            verified: true,
        }
    }
}

/// Answer preference order: parsed answer, then the last ok tool result
/// through numeric extraction, then empty
fn extract_answer(parsed_answer: &str, tool_calls: &[ToolCall]) -> String {
    if !parsed_answer.is_empty() {
        return parsed_answer.to_string();
    }

    let last_ok = tool_calls
        .iter()
        .rev()
        .find(|c| c.status == crate::types::ToolStatus::Ok);
    if let Some(call) = last_ok {
        if let Some(matched) = NUMERIC_RE.find(&call.result) {
            return matched.as_str().to_string();
        }
    }

    String::new()
}
