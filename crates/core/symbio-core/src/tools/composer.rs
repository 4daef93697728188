//! Plan composer: DAG-ordered tool execution with inter-step substitution

use super::{PlanStep, ToolOutcome, ToolRegistry};
use crate::types::{ToolCall, ToolStatus};
use crate::{Result, SymbioError};
use once_cell::sync::Lazy;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// `{{step_k.result}}` / `{{step_k.stdout}}` references inside an input
static SUBSTITUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*(result|stdout)\s*\}\}").unwrap()
});

/// Outcome of executing a whole plan
#[derive(Debug, Clone)]
pub struct PlanResult {
    /// Tool calls in execution order
    pub calls: Vec<ToolCall>,
    /// True iff every required step completed ok
    pub ok: bool,
}

impl PlanResult {
    /// The last call that completed ok, if any
    pub fn last_ok(&self) -> Option<&ToolCall> {
        self.calls.iter().rev().find(|c| c.status == ToolStatus::Ok)
    }
}

/// Executes tool plans against a registry
pub struct PlanComposer {
    max_retries: usize,
}

impl PlanComposer {
    /// Composer with the default retry budget of one
    pub fn new() -> Self {
        Self { max_retries: 1 }
    }

    /// Override the per-step retry budget for transient errors
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Execute a plan in dependency order
    ///
    /// Steps run one at a time, earliest ready step first, so independent
    /// steps keep their declared order. A step whose dependency is missing
    /// or did not complete ok is recorded as blocked and its tool never
    /// runs. Transient errors are retried up to the configured budget;
    /// blocked and timed-out steps are not retried.
    pub async fn execute(&self, steps: &[PlanStep], registry: &ToolRegistry) -> Result<PlanResult> {
        if steps.is_empty() {
            return Ok(PlanResult {
                calls: Vec::new(),
                ok: true,
            });
        }

        let index_of: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.step_id.as_str(), i))
            .collect();
        if index_of.len() != steps.len() {
            return Err(SymbioError::tool("Plan contains duplicate step ids"));
        }

        // Effective dependencies: declared plus substitution references
        let mut deps: Vec<Vec<String>> = Vec::with_capacity(steps.len());
        for step in steps {
            let mut step_deps = step.depends_on.clone();
            for capture in SUBSTITUTION_RE.captures_iter(&step.input) {
                let referenced = capture[1].to_string();
                if !step_deps.contains(&referenced) {
                    step_deps.push(referenced);
                }
            }
            deps.push(step_deps);
        }

        self.check_cycles(steps, &deps)?;

        let mut done: Vec<Option<ToolCall>> = vec![None; steps.len()];
        let mut calls = Vec::with_capacity(steps.len());

        for _ in 0..steps.len() {
            let next = (0..steps.len())
                .find(|&i| done[i].is_none() && self.is_ready(&deps[i], &index_of, &done));
            // The cycle check guarantees a ready step exists
            let Some(i) = next else {
                return Err(SymbioError::tool("Plan made no progress"));
            };

            let call = self
                .execute_step(&steps[i], &deps[i], &index_of, &done, registry)
                .await;
            calls.push(call.clone());
            done[i] = Some(call);
        }

        let ok = steps.iter().zip(done.iter()).all(|(step, call)| {
            step.optional
                || call
                    .as_ref()
                    .map(|c| c.status == ToolStatus::Ok)
                    .unwrap_or(false)
        });

        Ok(PlanResult { calls, ok })
    }

    fn check_cycles(&self, steps: &[PlanStep], deps: &[Vec<String>]) -> Result<()> {
        let mut graph = DiGraph::<&str, ()>::new();
        let nodes: Vec<_> = steps
            .iter()
            .map(|s| graph.add_node(s.step_id.as_str()))
            .collect();
        let index_of: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.step_id.as_str(), i))
            .collect();

        for (i, step_deps) in deps.iter().enumerate() {
            for dep in step_deps {
                if let Some(&j) = index_of.get(dep.as_str()) {
                    graph.add_edge(nodes[j], nodes[i], ());
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let step = graph[cycle.node_id()].to_string();
            return Err(SymbioError::PlanCyclic { step });
        }
        Ok(())
    }

    fn is_ready(
        &self,
        step_deps: &[String],
        index_of: &HashMap<&str, usize>,
        done: &[Option<ToolCall>],
    ) -> bool {
        step_deps.iter().all(|dep| {
            match index_of.get(dep.as_str()) {
                // A dependency outside the plan cannot be waited for; the
                // step will be recorded as blocked when it executes.
                None => true,
                Some(&j) => done[j].is_some(),
            }
        })
    }

    async fn execute_step(
        &self,
        step: &PlanStep,
        step_deps: &[String],
        index_of: &HashMap<&str, usize>,
        done: &[Option<ToolCall>],
        registry: &ToolRegistry,
    ) -> ToolCall {
        // Any missing or non-ok dependency blocks the step outright
        for dep in step_deps {
            let blocked_reason = match index_of.get(dep.as_str()) {
                None => Some(format!("missing dependency: {}", dep)),
                Some(&j) => match &done[j] {
                    Some(call) if call.status == ToolStatus::Ok => None,
                    _ => Some(format!("dependency did not complete ok: {}", dep)),
                },
            };
            if let Some(reason) = blocked_reason {
                warn!("Step {} blocked: {}", step.step_id, reason);
                return self.to_call(step, step_deps, &step.input, ToolOutcome::blocked(reason));
            }
        }

        let input = self.substitute(&step.input, index_of, done);

        let mut outcome = registry.execute(&step.tool, &input).await;
        let mut attempts = 0;
        while outcome.status == ToolStatus::Error && attempts < self.max_retries {
            attempts += 1;
            debug!(
                "Retrying step {} ({}/{})",
                step.step_id, attempts, self.max_retries
            );
            outcome = registry.execute(&step.tool, &input).await;
        }

        self.to_call(step, step_deps, &input, outcome)
    }

    /// Purely textual replacement of step references with prior outputs
    fn substitute(
        &self,
        input: &str,
        index_of: &HashMap<&str, usize>,
        done: &[Option<ToolCall>],
    ) -> String {
        SUBSTITUTION_RE
            .replace_all(input, |capture: &regex::Captures<'_>| {
                let step_id = &capture[1];
                let field = &capture[2];
                match index_of.get(step_id).and_then(|&j| done[j].as_ref()) {
                    Some(call) if call.status == ToolStatus::Ok => {
                        if field == "stdout" {
                            call.stdout.clone()
                        } else {
                            call.result.clone()
                        }
                    }
                    // Unreachable after the blocked check, kept as a guard
                    _ => capture[0].to_string(),
                }
            })
            .into_owned()
    }

    fn to_call(
        &self,
        step: &PlanStep,
        step_deps: &[String],
        input: &str,
        outcome: ToolOutcome,
    ) -> ToolCall {
        ToolCall {
            step_id: step.step_id.clone(),
            tool: step.tool.clone(),
            input: input.to_string(),
            depends_on: step_deps.to_vec(),
            status: outcome.status,
            result: outcome.result,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            elapsed_ms: outcome.elapsed_ms,
        }
    }
}

impl Default for PlanComposer {
    fn default() -> Self {
        Self::new()
    }
}
