//! Error types for the Symbio core

use thiserror::Error;

/// Main error type for Symbio operations
#[derive(Debug, Error)]
pub enum SymbioError {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inference endpoint error
    #[error("Inference error: {0}")]
    Inference(String),

    /// Task generation error
    #[error("Generator error: {0}")]
    Generator(String),

    /// Reasoning-trace parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Verifier error
    #[error("Verifier error: {0}")]
    Verifier(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limit error
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// File lock error
    #[error("Lock error: {0}")]
    Lock(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),

    /// A tool plan whose dependencies form a cycle
    #[error("Tool plan is cyclic: step '{step}' participates in a dependency cycle")]
    PlanCyclic {
        /// The step id flagged by the cycle check
        step: String,
    },

    /// The task generator exhausted its regeneration budget
    #[error("Generator exhausted for domain '{domain}' at difficulty {difficulty:.2}: {reason}")]
    GeneratorExhausted {
        /// Domain that failed to produce a valid task
        domain: String,
        /// Difficulty requested by the scheduler
        difficulty: f64,
        /// Why the last attempt was rejected
        reason: String,
    },
}

/// Convenient Result type using SymbioError
pub type Result<T> = std::result::Result<T, SymbioError>;

impl SymbioError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        SymbioError::Config(msg.into())
    }

    /// Create an inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        SymbioError::Inference(msg.into())
    }

    /// Create a generator error
    pub fn generator(msg: impl Into<String>) -> Self {
        SymbioError::Generator(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        SymbioError::Parse(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        SymbioError::Tool(msg.into())
    }

    /// Create a verifier error
    pub fn verifier(msg: impl Into<String>) -> Self {
        SymbioError::Verifier(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        SymbioError::Validation(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        SymbioError::RateLimit(msg.into())
    }

    /// Create a lock error
    pub fn lock(msg: impl Into<String>) -> Self {
        SymbioError::Lock(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        SymbioError::Timeout(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        SymbioError::Template(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        SymbioError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SymbioError::generator("no valid draw");
        assert_eq!(err.to_string(), "Generator error: no valid draw");

        let err = SymbioError::rate_limit("30/min");
        assert_eq!(err.to_string(), "Rate limit exceeded: 30/min");
    }

    #[test]
    fn test_structured_variants() {
        let err = SymbioError::PlanCyclic {
            step: "step_2".to_string(),
        };
        assert!(err.to_string().contains("step_2"));

        let err = SymbioError::GeneratorExhausted {
            domain: "math".to_string(),
            difficulty: 0.25,
            reason: "empty prompt".to_string(),
        };
        assert!(err.to_string().contains("math"));
        assert!(err.to_string().contains("empty prompt"));
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_result().unwrap(), 42);
    }
}
