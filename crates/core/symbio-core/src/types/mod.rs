//! Core data model: tasks, verifier specs, tool calls, trajectories, signals

mod signal;
mod task;
mod trajectory;

pub use signal::{CurriculumSignal, PromptOverride, SignalOverrides};
pub use task::{Domain, Task, VerifierSpec};
pub use trajectory::{RewardBreakdown, ToolCall, ToolStatus, Trajectory};
