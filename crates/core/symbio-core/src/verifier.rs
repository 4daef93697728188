//! Domain-specific correctness checks over candidate answers

use crate::config::ToolingConfig;
use crate::security;
use crate::tools::python::run_python;
use crate::types::{Task, ToolStatus, VerifierSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Verdict status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    /// Candidate is correct
    Pass,
    /// Candidate is incorrect
    Fail,
    /// The check itself could not run
    Error,
}

/// The verifier's judgement of a candidate answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Pass, fail, or error
    pub status: VerdictStatus,
    /// Why
    pub reason: String,
}

impl Verdict {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Pass,
            reason: reason.into(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Fail,
            reason: reason.into(),
        }
    }

    fn error(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            reason: reason.into(),
        }
    }

    /// True only for a passing verdict
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }
}

/// Relative-tolerance acceptance: `|c − e| ≤ max(tol·|e|, tol)`
fn within_tolerance(candidate: f64, expected: f64, tolerance: f64) -> bool {
    (candidate - expected).abs() <= (tolerance * expected.abs()).max(tolerance)
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// Dispatches on a task's verifier spec; never mutates its inputs
pub struct Verifier {
    tooling: ToolingConfig,
}

impl Verifier {
    /// Build a verifier; the tooling config supplies the python runtime
    pub fn new(tooling: ToolingConfig) -> Self {
        Self { tooling }
    }

    /// Judge a candidate answer against the task's spec
    pub async fn verify(&self, task: &Task, candidate: &str) -> Verdict {
        let verdict = match &task.verifier {
            VerifierSpec::ExactString { expected } => self.verify_exact(expected, candidate),
            VerifierSpec::Numeric {
                expected,
                tolerance,
            } => self.verify_numeric(*expected, *tolerance, candidate),
            VerifierSpec::NumericSet {
                expected,
                tolerance,
            } => self.verify_numeric_set(expected, *tolerance, candidate),
            VerifierSpec::PythonPredicate { body } => {
                self.verify_python_predicate(body, candidate).await
            }
            VerifierSpec::PythonAssert { body } => self.verify_python_assert(body, candidate).await,
            VerifierSpec::RegexMatch { pattern } => self.verify_regex(pattern, candidate),
        };
        debug!(
            task_id = %task.task_id,
            status = ?verdict.status,
            "Verified candidate"
        );
        verdict
    }

    fn verify_exact(&self, expected: &str, candidate: &str) -> Verdict {
        if candidate.trim() == expected.trim() {
            Verdict::pass("exact match")
        } else {
            Verdict::fail(format!(
                "expected '{}', got '{}'",
                expected.trim(),
                candidate.trim()
            ))
        }
    }

    fn verify_numeric(&self, expected: f64, tolerance: f64, candidate: &str) -> Verdict {
        match parse_number(candidate) {
            Some(value) if within_tolerance(value, expected, tolerance) => {
                Verdict::pass("within tolerance")
            }
            Some(value) => Verdict::fail(format!(
                "expected {} ± tolerance, got {}",
                expected, value
            )),
            None => Verdict::fail(format!("candidate '{}' is not numeric", candidate.trim())),
        }
    }

    fn verify_numeric_set(&self, expected: &[f64], tolerance: f64, candidate: &str) -> Verdict {
        let mut values = Vec::new();
        for part in candidate.split(',') {
            match parse_number(part) {
                Some(value) => values.push(value),
                None => {
                    return Verdict::fail(format!(
                        "candidate part '{}' is not numeric",
                        part.trim()
                    ))
                }
            }
        }

        if values.len() != expected.len() {
            return Verdict::fail(format!(
                "expected {} values, got {}",
                expected.len(),
                values.len()
            ));
        }

        // Multiset comparison: sort both sides, then pair within tolerance
        let mut values = values;
        let mut expected = expected.to_vec();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for (value, target) in values.iter().zip(expected.iter()) {
            if !within_tolerance(*value, *target, tolerance) {
                return Verdict::fail(format!("{} does not match {}", value, target));
            }
        }

        Verdict::pass("multiset match")
    }

    async fn verify_python_predicate(&self, body: &str, candidate: &str) -> Verdict {
        let expression = body.replace("{{candidate}}", candidate);
        let program = format!("print(bool({}))", expression);
        self.run_reviewed(&program, |outcome| {
            if outcome.result == "True" {
                Verdict::pass("predicate true")
            } else {
                Verdict::fail("predicate false")
            }
        })
        .await
    }

    async fn verify_python_assert(&self, body: &str, candidate: &str) -> Verdict {
        let program = body.replace("{{candidate}}", candidate);
        self.run_reviewed(&program, |_| Verdict::pass("assertions held"))
            .await
    }

    async fn run_reviewed<F>(&self, program: &str, on_ok: F) -> Verdict
    where
        F: FnOnce(&crate::tools::ToolOutcome) -> Verdict,
    {
        let report = security::review(program);
        if !report.safe {
            warn!("Verifier body blocked: {}", report.rationale());
            return Verdict::error("verifier_blocked");
        }

        let outcome = run_python(program, &self.tooling, 64 * 1024).await;
        match outcome.status {
            ToolStatus::Ok => on_ok(&outcome),
            ToolStatus::Error => Verdict::fail(format!(
                "verifier program failed: {}",
                outcome.stderr.lines().last().unwrap_or_default()
            )),
            ToolStatus::Timeout => Verdict::error("verifier timeout"),
            ToolStatus::Blocked => Verdict::error("verifier_blocked"),
        }
    }

    fn verify_regex(&self, pattern: &str, candidate: &str) -> Verdict {
        let anchored = format!("^(?:{})$", pattern);
        match Regex::new(&anchored) {
            Ok(re) => {
                if re.is_match(candidate.trim()) {
                    Verdict::pass("pattern match")
                } else {
                    Verdict::fail(format!("'{}' does not match pattern", candidate.trim()))
                }
            }
            Err(e) => Verdict::error(format!("invalid pattern: {}", e)),
        }
    }
}
