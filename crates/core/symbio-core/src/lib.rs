//! Symbio Core Runtime
//!
//! This crate provides the co-evolution core of a self-evolving dual-agent
//! training loop: a teacher that proposes tasks and a student that solves
//! them with tool assistance, coupled through one step state machine.
//! It includes:
//!
//! - Frontier curriculum scheduling over (domain, difficulty) pairs
//! - Multi-domain task generation with per-domain difficulty tiers
//! - A tool-mediated solver with DAG-ordered tool plans
//! - A multi-component reward engine with embedding-backed novelty
//! - Append-only trajectory persistence for offline fine-tuning
//!
//! # Example: one evolution step
//!
//! ```no_run
//! use symbio_core::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SymbioConfig::default();
//!     let endpoint: Arc<dyn InferenceEndpoint> = Arc::new(testing::MockEndpoint::new());
//!     let mut coordinator = Coordinator::new(config, endpoint, "./runs")?;
//!     let trajectory = coordinator.run_once().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export commonly used types
pub use uuid::Uuid;

// Core modules
pub mod config;
pub mod coordinator;
pub mod curriculum;
pub mod error;
pub mod generator;
pub mod inference;
pub mod novelty;
pub mod parser;
pub mod persistence;
pub mod resilience;
pub mod reward;
pub mod security;
pub mod solver;
pub mod templates;
pub mod testing;
pub mod tools;
pub mod types;
pub mod uncertainty;
pub mod verifier;

// Re-export main types
pub use config::{
    get_env_bool, get_env_float, get_env_int, get_env_or, load_env, CurriculumConfig,
    EmbeddingConfig, ModelConfig, ModelsConfig, RateLimitsConfig, ResourceLimitsConfig,
    ResourcesConfig, RewardsConfig, RouterConfig, SymbioConfig, ToolingConfig,
    VerificationConfig,
};
pub use coordinator::Coordinator;
pub use curriculum::{CurriculumScheduler, CurriculumState, MAX_DIFFICULTY, MIN_DIFFICULTY};
pub use error::{Result, SymbioError};
pub use generator::TaskGenerator;
pub use inference::{GenerateParams, InferenceEndpoint};
pub use novelty::{fallback_embedding, NoveltyIndex, NOVELTY_CAPACITY};
pub use parser::{parse_trace, ParseIssue, ParsedTrace};
pub use persistence::{FileLockGuard, RunStore, SecurityEventLog, TrajectoryLog};
pub use resilience::{retry_with_backoff, RetryConfig};
pub use reward::{novelty_signature, RewardEngine};
pub use security::{review, review_shell, RateLimiter, ReviewReport, SecurityEvent, StepRateLimiter};
pub use solver::{SolveOutcome, Solver};
pub use templates::TemplateEngine;
pub use tools::{
    MathTool, PlanComposer, PlanResult, PlanStep, PythonTool, ShellTool, TestTool, Tool,
    ToolOutcome, ToolRegistry,
};
pub use types::{
    CurriculumSignal, Domain, PromptOverride, RewardBreakdown, SignalOverrides, Task, ToolCall,
    ToolStatus, Trajectory, VerifierSpec,
};
pub use uncertainty::UncertaintyEstimator;
pub use verifier::{Verdict, VerdictStatus, Verifier};
