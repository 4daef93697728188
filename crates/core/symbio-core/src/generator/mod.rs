//! Multi-domain task generation with difficulty tiers

use crate::types::{CurriculumSignal, Domain, Task};
use crate::{Result, SymbioError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

mod code;
mod logic;
mod math;

/// Attempts per tier before falling back to the easiest tier
const DEGENERATE_RETRIES: usize = 10;

/// Emits validated task records from scheduler signals
///
/// Every emitted task carries the generator's run id in its metadata, so
/// trajectories from different runs stay distinguishable after the logs
/// are merged for training.
pub struct TaskGenerator {
    rng: StdRng,
    run_id: Uuid,
    used_task_ids: HashSet<String>,
}

impl TaskGenerator {
    /// Generator seeded from entropy, under a fresh run id
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            run_id: Uuid::new_v4(),
            used_task_ids: HashSet::new(),
        }
    }

    /// Generator with a fixed seed for reproducible draws
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            run_id: Uuid::new_v4(),
            used_task_ids: HashSet::new(),
        }
    }

    /// Use a caller-assigned run id
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// The run id stamped into every emitted task
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Generate a task for a scheduler signal
    ///
    /// A task failing self-validation triggers one regeneration; a second
    /// failure surfaces as `GeneratorExhausted`.
    pub fn generate(&mut self, signal: &CurriculumSignal) -> Result<Task> {
        let mut last_reason = String::new();

        for attempt in 0..2 {
            let mut task = self.draw(signal);
            task.metadata.insert(
                "run_id".to_string(),
                serde_json::Value::String(self.run_id.to_string()),
            );
            match self.check(&task) {
                Ok(()) => {
                    self.used_task_ids.insert(task.task_id.clone());
                    debug!(
                        task_id = %task.task_id,
                        domain = %task.domain,
                        difficulty = task.difficulty,
                        "Generated task"
                    );
                    return Ok(task);
                }
                Err(e) => {
                    last_reason = e.to_string();
                    warn!(
                        attempt,
                        reason = %last_reason,
                        "Generated task failed validation"
                    );
                }
            }
        }

        Err(SymbioError::GeneratorExhausted {
            domain: signal.domain.as_str().to_string(),
            difficulty: signal.difficulty,
            reason: last_reason,
        })
    }

    fn draw(&mut self, signal: &CurriculumSignal) -> Task {
        if let Some(override_) = &signal.prompt_override {
            return Task::new(
                signal.next_task_id.clone(),
                signal.domain,
                signal.difficulty,
                override_.prompt.clone(),
                override_.verifier.clone(),
            );
        }

        match signal.domain {
            Domain::Math => math::generate(
                &mut self.rng,
                signal.difficulty,
                &signal.next_task_id,
                DEGENERATE_RETRIES,
            ),
            Domain::Logic => logic::generate(&mut self.rng, signal.difficulty, &signal.next_task_id),
            Domain::Code => code::generate(&mut self.rng, signal.difficulty, &signal.next_task_id),
        }
    }

    fn check(&self, task: &Task) -> Result<()> {
        task.validate()?;
        if self.used_task_ids.contains(&task.task_id) {
            return Err(SymbioError::validation(format!(
                "Task id '{}' already used in this run",
                task.task_id
            )));
        }
        Ok(())
    }
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptOverride, VerifierSpec};

    fn signal(domain: Domain, difficulty: f64, task_id: &str) -> CurriculumSignal {
        CurriculumSignal {
            domain,
            difficulty,
            next_task_id: task_id.to_string(),
            prompt_override: None,
        }
    }

    #[test]
    fn test_generates_every_domain_and_tier() {
        let mut generator = TaskGenerator::with_seed(7);
        let mut counter = 0;
        for domain in Domain::ALL {
            for difficulty in [0.1, 0.45, 0.8] {
                counter += 1;
                let task = generator
                    .generate(&signal(domain, difficulty, &format!("t{}", counter)))
                    .unwrap();
                assert_eq!(task.domain, domain);
                assert!(task.validate().is_ok());
            }
        }
    }

    #[test]
    fn test_duplicate_task_id_exhausts_generator() {
        let mut generator = TaskGenerator::with_seed(7);
        generator
            .generate(&signal(Domain::Math, 0.2, "t1"))
            .unwrap();
        let err = generator
            .generate(&signal(Domain::Math, 0.2, "t1"))
            .unwrap_err();
        assert!(matches!(err, SymbioError::GeneratorExhausted { .. }));
    }

    #[test]
    fn test_prompt_override_bypasses_domain_generators() {
        let mut generator = TaskGenerator::with_seed(7);
        let mut sig = signal(Domain::Math, 0.2, "t1");
        sig.prompt_override = Some(PromptOverride {
            prompt: "Solve 2x + 3 = 11 for x.".to_string(),
            verifier: VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
        });

        let task = generator.generate(&sig).unwrap();
        assert_eq!(task.prompt, "Solve 2x + 3 = 11 for x.");
        assert!(matches!(task.verifier, VerifierSpec::Numeric { .. }));
    }

    #[test]
    fn test_tasks_carry_the_run_id() {
        let run_id = Uuid::new_v4();
        let mut generator = TaskGenerator::with_seed(7).with_run_id(run_id);
        let task = generator
            .generate(&signal(Domain::Logic, 0.5, "t1"))
            .unwrap();
        assert_eq!(
            task.metadata.get("run_id"),
            Some(&serde_json::Value::String(run_id.to_string()))
        );
        assert_eq!(generator.run_id(), run_id);
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let mut a = TaskGenerator::with_seed(99);
        let mut b = TaskGenerator::with_seed(99);
        let task_a = a.generate(&signal(Domain::Math, 0.2, "t1")).unwrap();
        let task_b = b.generate(&signal(Domain::Math, 0.2, "t1")).unwrap();
        assert_eq!(task_a.prompt, task_b.prompt);
    }
}
