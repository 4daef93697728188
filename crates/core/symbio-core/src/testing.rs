//! Test support: scripted inference endpoints and logging setup

use crate::inference::{GenerateParams, InferenceEndpoint};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, Once};

static INIT_LOGGING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process
///
/// Respects `RUST_LOG`; defaults to warnings only so test output stays
/// readable.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A scripted endpoint for driving the core without a model server
///
/// Solve prompts consume the scripted responses in order (the last one
/// repeats once exhausted); self-critique prompts get a fixed rating so
/// tests control the uncertainty path independently.
pub struct MockEndpoint {
    solve_responses: Mutex<VecDeque<String>>,
    last_response: Mutex<String>,
    critique_response: Mutex<String>,
    embeddings: bool,
}

impl MockEndpoint {
    /// Endpoint with no scripted responses yet
    pub fn new() -> Self {
        Self {
            solve_responses: Mutex::new(VecDeque::new()),
            last_response: Mutex::new(String::new()),
            critique_response: Mutex::new("0.5".to_string()),
            embeddings: false,
        }
    }

    /// Script the solve responses, served in order
    pub fn with_solve_responses(self, responses: &[&str]) -> Self {
        {
            let mut queue = self.solve_responses.lock().unwrap();
            queue.extend(responses.iter().map(|s| s.to_string()));
        }
        self
    }

    /// Fix the rating returned for self-critique prompts
    pub fn with_critique_response(self, rating: &str) -> Self {
        *self.critique_response.lock().unwrap() = rating.to_string();
        self
    }

    /// Advertise embedding support (served by the fallback embedder)
    pub fn with_embeddings(mut self) -> Self {
        self.embeddings = true;
        self
    }
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, params: GenerateParams) -> Result<String> {
        if params.prompt.contains("Rate the probability") {
            return Ok(self.critique_response.lock().unwrap().clone());
        }

        let mut queue = self.solve_responses.lock().unwrap();
        match queue.pop_front() {
            Some(response) => {
                *self.last_response.lock().unwrap() = response.clone();
                Ok(response)
            }
            None => Ok(self.last_response.lock().unwrap().clone()),
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.embeddings
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(crate::novelty::fallback_embedding(text))
    }
}
