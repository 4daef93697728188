//! Configuration management and environment variable loading

use crate::{Result, SymbioError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Load environment variables from a .env file
///
/// Safe to call multiple times; a missing file is not an error.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(SymbioError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::warn!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(SymbioError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Get environment variable as float
pub fn get_env_float(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

/// One model endpoint (teacher or student)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend id, e.g. "ollama"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Model name at the backend
    #[serde(default = "default_model")]
    pub model: String,
    /// Backend host URL
    #[serde(default = "default_host")]
    pub host: String,
    /// Context window the backend is configured for
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling parameter
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Self-critique sample count for uncertainty estimation
    #[serde(default = "default_uncertainty_samples")]
    pub uncertainty_samples: usize,
}

fn default_backend() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "qwen2.5:7b".to_string()
}
fn default_host() -> String {
    "http://localhost:11434".to_string()
}
fn default_context_length() -> usize {
    8192
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.9
}
fn default_uncertainty_samples() -> usize {
    3
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_model(),
            host: default_host(),
            context_length: default_context_length(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            uncertainty_samples: default_uncertainty_samples(),
        }
    }
}

/// Teacher and student endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Task-proposing model
    #[serde(default)]
    pub teacher: ModelConfig,
    /// Task-solving model
    #[serde(default)]
    pub student: ModelConfig,
}

/// Host resource hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Device hint, e.g. "cuda" or "cpu"
    #[serde(default = "default_device")]
    pub device: String,
    /// GPU memory budget
    #[serde(default = "default_max_gpu_memory_gb")]
    pub max_gpu_memory_gb: f64,
    /// Worker thread hint
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Per-task generation budget
    #[serde(default = "default_max_tokens_per_task")]
    pub max_tokens_per_task: usize,
}

fn default_device() -> String {
    "cpu".to_string()
}
fn default_max_gpu_memory_gb() -> f64 {
    8.0
}
fn default_num_threads() -> usize {
    4
}
fn default_max_tokens_per_task() -> usize {
    1024
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            max_gpu_memory_gb: default_max_gpu_memory_gb(),
            num_threads: default_num_threads(),
            max_tokens_per_task: default_max_tokens_per_task(),
        }
    }
}

/// Tool availability and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolingConfig {
    /// Enable the python tool
    #[serde(default = "default_true")]
    pub enable_python: bool,
    /// Enable the shell tool (off by default)
    #[serde(default)]
    pub enable_shell: bool,
    /// Enable the math tool
    #[serde(default = "default_true")]
    pub enable_math: bool,
    /// Enable the test tool (off by default)
    #[serde(default)]
    pub enable_tests: bool,
    /// Wall-clock timeout per tool invocation
    #[serde(default = "default_tool_timeout")]
    pub timeout_seconds: u64,
    /// Working directory for subprocess tools
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Shell command heads permitted when the shell tool is enabled
    #[serde(default = "default_allowed_shell")]
    pub allowed_shell: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_workdir() -> PathBuf {
    PathBuf::from("./runs/work")
}
fn default_allowed_shell() -> Vec<String> {
    ["echo", "cat", "ls", "wc", "head", "tail"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            enable_python: true,
            enable_shell: false,
            enable_math: true,
            enable_tests: false,
            timeout_seconds: default_tool_timeout(),
            workdir: default_workdir(),
            allowed_shell: default_allowed_shell(),
        }
    }
}

/// Reward weights and targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Weight of the uncertainty component
    #[serde(default = "default_weight_uncertainty")]
    pub weight_uncertainty: f64,
    /// Weight of the tool-use component
    #[serde(default = "default_weight_tool_use")]
    pub weight_tool_use: f64,
    /// Weight of the novelty component
    #[serde(default = "default_weight_novelty")]
    pub weight_novelty: f64,
    /// Weight of the correctness component
    #[serde(default = "default_weight_correctness")]
    pub weight_correctness: f64,
    /// Success probability the uncertainty component targets
    #[serde(default = "default_target_success_rate")]
    pub target_success_rate: f64,
    /// Embedding similarity above which a prompt counts as a repeat
    #[serde(default = "default_repetition_threshold")]
    pub repetition_similarity_threshold: f64,
}

fn default_weight_uncertainty() -> f64 {
    0.5
}
fn default_weight_tool_use() -> f64 {
    0.3
}
fn default_weight_novelty() -> f64 {
    0.2
}
fn default_weight_correctness() -> f64 {
    0.3
}
fn default_target_success_rate() -> f64 {
    0.5
}
fn default_repetition_threshold() -> f64 {
    0.9
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            weight_uncertainty: default_weight_uncertainty(),
            weight_tool_use: default_weight_tool_use(),
            weight_novelty: default_weight_novelty(),
            weight_correctness: default_weight_correctness(),
            target_success_rate: default_target_success_rate(),
            repetition_similarity_threshold: default_repetition_threshold(),
        }
    }
}

/// Curriculum scheduling options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumConfig {
    /// Frontier mode (difficulty-targeting domain selection)
    #[serde(default = "default_true")]
    pub enable_frontier: bool,
    /// Target per-domain success rate
    #[serde(default = "default_target_success_rate")]
    pub target_success: f64,
    /// Band around the target before difficulty moves
    #[serde(default = "default_frontier_window")]
    pub frontier_window: f64,
    /// Domains in play
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
    /// Success history window per domain
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Exploration probability (picks the second-best domain)
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_frontier_window() -> f64 {
    0.1
}
fn default_domains() -> Vec<String> {
    vec!["math".to_string(), "logic".to_string(), "code".to_string()]
}
fn default_window_size() -> usize {
    20
}
fn default_epsilon() -> f64 {
    0.2
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            enable_frontier: true,
            target_success: default_target_success_rate(),
            frontier_window: default_frontier_window(),
            domains: default_domains(),
            window_size: default_window_size(),
            epsilon: default_epsilon(),
        }
    }
}

/// Solver self-verification options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Run the solve k times and take the modal answer
    #[serde(default)]
    pub enable: bool,
    /// Number of independent solves
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Consensus confidence below which success is downgraded
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Ask for chain-of-thought in verification prompts
    #[serde(default = "default_true")]
    pub enable_cot: bool,
}

fn default_num_samples() -> usize {
    3
}
fn default_confidence_threshold() -> f64 {
    0.7
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enable: false,
            num_samples: default_num_samples(),
            confidence_threshold: default_confidence_threshold(),
            enable_cot: true,
        }
    }
}

/// Cloud/local router options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Enable the routing wrapper
    #[serde(default)]
    pub enable: bool,
    /// Confidence above which a cloud result is accepted
    #[serde(default = "default_cloud_threshold")]
    pub cloud_confidence_threshold: f64,
    /// Confidence above which a local result is accepted
    #[serde(default = "default_local_threshold")]
    pub local_confidence_threshold: f64,
    /// Path of the router result cache
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

fn default_cloud_threshold() -> f64 {
    0.8
}
fn default_local_threshold() -> f64 {
    0.5
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("./runs/router_cache.json")
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enable: false,
            cloud_confidence_threshold: default_cloud_threshold(),
            local_confidence_threshold: default_local_threshold(),
            cache_path: default_cache_path(),
        }
    }
}

/// Embedding backend options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Use a transformer embedding endpoint instead of the hash fallback
    #[serde(default)]
    pub use_transformer: bool,
    /// Embedding model name at the endpoint
    #[serde(default = "default_embedding_model")]
    pub model_name: String,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            use_transformer: false,
            model_name: default_embedding_model(),
        }
    }
}

/// Step-rate ceilings enforced before each evolution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Sliding one-minute ceiling
    #[serde(default = "default_per_minute")]
    pub max_tasks_per_minute: usize,
    /// Sliding one-hour ceiling
    #[serde(default = "default_per_hour")]
    pub max_tasks_per_hour: usize,
}

fn default_per_minute() -> usize {
    30
}
fn default_per_hour() -> usize {
    1000
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_minute: default_per_minute(),
            max_tasks_per_hour: default_per_hour(),
        }
    }
}

/// Advisory resource limits passed to the tool runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimitsConfig {
    /// Memory ceiling
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// CPU time ceiling
    #[serde(default = "default_max_cpu_seconds")]
    pub max_cpu_seconds: u64,
    /// Captured output ceiling
    #[serde(default = "default_max_output_kb")]
    pub max_output_kb: usize,
}

fn default_max_memory_mb() -> usize {
    512
}
fn default_max_cpu_seconds() -> u64 {
    30
}
fn default_max_output_kb() -> usize {
    256
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: default_max_memory_mb(),
            max_cpu_seconds: default_max_cpu_seconds(),
            max_output_kb: default_max_output_kb(),
        }
    }
}

/// Full Symbio configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbioConfig {
    /// Teacher/student model endpoints
    #[serde(default)]
    pub models: ModelsConfig,
    /// Host resource hints
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Tool availability and limits
    #[serde(default)]
    pub tooling: ToolingConfig,
    /// Reward weights
    #[serde(default)]
    pub rewards: RewardsConfig,
    /// Curriculum scheduling
    #[serde(default)]
    pub curriculum: CurriculumConfig,
    /// Solver self-verification
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Cloud/local router
    #[serde(default)]
    pub router: RouterConfig,
    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Step rate ceilings
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Advisory resource limits
    #[serde(default)]
    pub resource_limits: ResourceLimitsConfig,
}

impl SymbioConfig {
    /// Load a configuration from a JSON file, then apply env overrides
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SymbioError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let mut config: SymbioConfig = serde_json::from_str(&raw)
            .map_err(|e| SymbioError::config(format!("Invalid config JSON: {}", e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlay recognized SYMBIO_* environment variables on scalar options
    pub fn apply_env_overrides(&mut self) {
        self.models.student.host = get_env_or("SYMBIO_STUDENT_HOST", &self.models.student.host);
        self.models.teacher.host = get_env_or("SYMBIO_TEACHER_HOST", &self.models.teacher.host);
        self.models.student.model = get_env_or("SYMBIO_STUDENT_MODEL", &self.models.student.model);
        self.models.teacher.model = get_env_or("SYMBIO_TEACHER_MODEL", &self.models.teacher.model);
        self.tooling.enable_shell = get_env_bool("SYMBIO_ENABLE_SHELL", self.tooling.enable_shell);
        self.tooling.timeout_seconds =
            get_env_int("SYMBIO_TOOL_TIMEOUT_SECONDS", self.tooling.timeout_seconds);
        self.curriculum.enable_frontier =
            get_env_bool("SYMBIO_ENABLE_FRONTIER", self.curriculum.enable_frontier);
        self.curriculum.target_success =
            get_env_float("SYMBIO_TARGET_SUCCESS", self.curriculum.target_success);
        self.rate_limits.max_tasks_per_minute = get_env_int(
            "SYMBIO_MAX_TASKS_PER_MINUTE",
            self.rate_limits.max_tasks_per_minute,
        );
    }

    /// Validate the configuration; failure is fatal at startup
    pub fn validate(&self) -> Result<()> {
        fn check_unit(name: &str, value: f64) -> Result<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(SymbioError::config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
            Ok(())
        }

        check_unit("curriculum.target_success", self.curriculum.target_success)?;
        check_unit("curriculum.epsilon", self.curriculum.epsilon)?;
        check_unit(
            "rewards.target_success_rate",
            self.rewards.target_success_rate,
        )?;
        check_unit(
            "rewards.repetition_similarity_threshold",
            self.rewards.repetition_similarity_threshold,
        )?;
        check_unit(
            "verification.confidence_threshold",
            self.verification.confidence_threshold,
        )?;

        if self.curriculum.window_size == 0 {
            return Err(SymbioError::config("curriculum.window_size must be >= 1"));
        }
        if self.verification.num_samples == 0 {
            return Err(SymbioError::config("verification.num_samples must be >= 1"));
        }
        if self.curriculum.domains.is_empty() {
            return Err(SymbioError::config("curriculum.domains must not be empty"));
        }
        for domain in &self.curriculum.domains {
            domain.parse::<crate::types::Domain>().map_err(|_| {
                SymbioError::config(format!("curriculum.domains: unknown domain '{}'", domain))
            })?;
        }
        if self.tooling.timeout_seconds == 0 {
            return Err(SymbioError::config("tooling.timeout_seconds must be >= 1"));
        }
        if self.rate_limits.max_tasks_per_minute == 0 || self.rate_limits.max_tasks_per_hour == 0 {
            return Err(SymbioError::config("rate_limits ceilings must be >= 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SymbioConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.tooling.enable_shell);
        assert!(!config.tooling.enable_tests);
        assert_eq!(config.rate_limits.max_tasks_per_minute, 30);
        assert_eq!(config.curriculum.window_size, 20);
        assert!((config.rewards.weight_correctness - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SymbioConfig =
            serde_json::from_str(r#"{"curriculum": {"epsilon": 0.1}}"#).unwrap();
        assert!((config.curriculum.epsilon - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.curriculum.window_size, 20);
        assert_eq!(config.models.student.backend, "ollama");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SymbioConfig::default();
        config.curriculum.target_success = 1.5;
        assert!(config.validate().is_err());

        let mut config = SymbioConfig::default();
        config.curriculum.domains = vec!["geometry".to_string()];
        assert!(config.validate().is_err());

        let mut config = SymbioConfig::default();
        config.verification.num_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_env_bool() {
        env::set_var("SYMBIO_TEST_BOOL", "yes");
        assert!(get_env_bool("SYMBIO_TEST_BOOL", false));
        env::remove_var("SYMBIO_TEST_BOOL");
        assert!(!get_env_bool("SYMBIO_TEST_BOOL", false));
    }

    #[test]
    fn test_get_env_int_and_float() {
        env::set_var("SYMBIO_TEST_INT", "42");
        assert_eq!(get_env_int("SYMBIO_TEST_INT", 0usize), 42);
        env::remove_var("SYMBIO_TEST_INT");

        env::set_var("SYMBIO_TEST_FLOAT", "0.25");
        assert!((get_env_float("SYMBIO_TEST_FLOAT", 0.0) - 0.25).abs() < f64::EPSILON);
        env::remove_var("SYMBIO_TEST_FLOAT");
    }
}
