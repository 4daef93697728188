//! Coordinator: drives one co-evolution step end to end

use crate::config::SymbioConfig;
use crate::curriculum::{CurriculumScheduler, CurriculumState};
use crate::generator::TaskGenerator;
use crate::inference::InferenceEndpoint;
use crate::novelty::NoveltyIndex;
use crate::persistence::RunStore;
use crate::reward::{novelty_signature, RewardEngine};
use crate::security::{SecurityEvent, StepRateLimiter};
use crate::solver::Solver;
use crate::tools::ToolRegistry;
use crate::types::{SignalOverrides, ToolStatus, Trajectory};
use crate::uncertainty::UncertaintyEstimator;
use crate::verifier::{VerdictStatus, Verifier};
use crate::{Result, SymbioError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bounded acquisition timeout for the shared log files
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the step state machine and every piece of run-scoped state
///
/// Components communicate only through the records the coordinator passes
/// between them; none holds a reference to another.
pub struct Coordinator {
    config: SymbioConfig,
    run_id: Uuid,
    scheduler: CurriculumScheduler,
    generator: TaskGenerator,
    solver: Solver,
    verifier: Verifier,
    uncertainty: UncertaintyEstimator,
    novelty: NoveltyIndex,
    reward: RewardEngine,
    registry: ToolRegistry,
    store: RunStore,
    rate_limiter: StepRateLimiter,
    route: String,
}

impl Coordinator {
    /// Build a coordinator; configuration problems are fatal here
    pub fn new(
        config: SymbioConfig,
        endpoint: Arc<dyn InferenceEndpoint>,
        run_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        let store = RunStore::open(run_dir, LOCK_TIMEOUT)?;
        let registry = ToolRegistry::from_config(&config.tooling);
        let scheduler = CurriculumScheduler::new(config.curriculum.clone());
        let generator = TaskGenerator::new().with_run_id(run_id);
        let solver = Solver::new(
            endpoint.clone(),
            config.models.student.clone(),
            config.verification.clone(),
        );
        let verifier = Verifier::new(config.tooling.clone());
        let uncertainty = UncertaintyEstimator::new(
            endpoint.clone(),
            config.models.student.uncertainty_samples,
        );
        let novelty = if config.embedding.use_transformer {
            NoveltyIndex::new().with_endpoint(endpoint.clone())
        } else {
            NoveltyIndex::new()
        };
        let reward = RewardEngine::new(config.rewards.clone());
        let rate_limiter = StepRateLimiter::new(
            config.rate_limits.max_tasks_per_minute,
            config.rate_limits.max_tasks_per_hour,
        );
        let route = endpoint.name().to_string();

        info!(run_id = %run_id, route = %route, "Coordinator initialized");

        Ok(Self {
            config,
            run_id,
            scheduler,
            generator,
            solver,
            verifier,
            uncertainty,
            novelty,
            reward,
            registry,
            store,
            rate_limiter,
            route,
        })
    }

    /// Replace the solver (used to tune retry behavior in tests)
    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// The run id stamped into every task this coordinator emits
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Snapshot the curriculum state
    pub fn curriculum_state(&self) -> CurriculumState {
        self.scheduler.state()
    }

    /// Run one co-evolution step
    ///
    /// Never raises: a step either returns a complete trajectory, or logs
    /// its cause and returns `None` (skipped).
    pub async fn run_once(&mut self) -> Option<Trajectory> {
        self.run_once_with(SignalOverrides::default()).await
    }

    /// Run one step with caller-supplied overrides merged into the signal
    pub async fn run_once_with(&mut self, overrides: SignalOverrides) -> Option<Trajectory> {
        if !self.rate_limiter.check() {
            warn!("Step skipped: rate limit exceeded");
            self.store.security_events.record(&SecurityEvent::new(
                "rate_limited",
                format!(
                    "limits: {}/min, {}/hour",
                    self.config.rate_limits.max_tasks_per_minute,
                    self.config.rate_limits.max_tasks_per_hour
                ),
                "coordinator",
            ));
            return None;
        }

        // next_signal never raises; it is a precondition of the machine
        let signal = self.scheduler.next_signal().merged_with(&overrides);
        let step = self.scheduler.state().step;

        match self.step_inner(signal).await {
            Ok(trajectory) => {
                // Postcondition: the scheduler always observes the outcome
                self.scheduler.update(trajectory.success);
                Some(trajectory)
            }
            Err(SymbioError::GeneratorExhausted {
                domain,
                difficulty,
                reason,
            }) => {
                info!(
                    step,
                    domain = %domain,
                    difficulty,
                    reason = %reason,
                    "Step skipped: generator exhausted"
                );
                None
            }
            Err(e) => {
                error!(step, "Step failed: {}", e);
                None
            }
        }
    }

    async fn step_inner(
        &mut self,
        signal: crate::types::CurriculumSignal,
    ) -> Result<Trajectory> {
        let task = self.generator.generate(&signal)?;
        let task_id = task.task_id.clone();

        let solve = self.solver.solve(&task, &self.registry).await;
        self.record_blocked_calls(&task_id, &solve.tool_calls);

        let verdict = self.verifier.verify(&task, &solve.result).await;
        if verdict.status == VerdictStatus::Error {
            warn!(task_id = %task_id, reason = %verdict.reason, "Verifier error");
        }
        let success = verdict.passed() && solve.verified;

        let success_prob = self
            .uncertainty
            .estimate(&task.prompt, &solve.result)
            .await;

        let signature = novelty_signature(task.domain, &task.prompt);
        let embedding = self.novelty.embed(&task.prompt).await;
        let similarity = self.novelty.max_similarity(&embedding);
        self.novelty.add(embedding);

        let mut trajectory = Trajectory::new(task, solve.result, solve.reasoning);
        trajectory.tool_calls = solve.tool_calls;
        trajectory.success = success;
        trajectory.confidence = success_prob;
        trajectory.verification = solve.verification;
        trajectory.route = self.route.clone();
        trajectory.reward =
            self.reward
                .compute(&trajectory, success_prob, &signature, similarity);

        self.store.trajectories.append(&trajectory)?;

        info!(
            task_id = %task_id,
            success = trajectory.success,
            reward = trajectory.reward.total,
            "Step complete"
        );

        Ok(trajectory)
    }

    fn record_blocked_calls(&self, task_id: &str, calls: &[crate::types::ToolCall]) {
        for call in calls.iter().filter(|c| c.status == ToolStatus::Blocked) {
            self.store.security_events.record(&SecurityEvent::new(
                if call.tool == "shell" {
                    "blocked_shell"
                } else {
                    "blocked_code"
                },
                format!("task {}: step {}: {}", task_id, call.step_id, call.stderr),
                format!("{}_tool", call.tool),
            ));
        }
    }
}
