//! Local inference endpoint for Symbio
//!
//! Supports local model inference via:
//! - Ollama
//! - llama.cpp HTTP server
//! - OpenAI-compatible servers (LocalAI, vLLM, llama-server)
//!
//! The OpenAI-compatible backend exposes per-token log-probabilities;
//! Ollama exposes embeddings. The core probes both capabilities and falls
//! back gracefully when a backend lacks one.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use symbio_core::{GenerateParams, InferenceEndpoint, ModelConfig, Result, SymbioError};

/// Shared HTTP client for connection pooling to local model servers
static HTTP_CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

/// Get or initialize the shared HTTP client
fn get_http_client() -> Arc<Client> {
    HTTP_CLIENT
        .get_or_init(|| {
            Arc::new(
                Client::builder()
                    .pool_max_idle_per_host(16)
                    .pool_idle_timeout(std::time::Duration::from_secs(300))
                    .tcp_keepalive(std::time::Duration::from_secs(60))
                    .timeout(std::time::Duration::from_secs(120))
                    .connect_timeout(std::time::Duration::from_secs(10))
                    .build()
                    .unwrap_or_else(|e| {
                        panic!("Failed to create HTTP client: {}. This is a configuration error.", e)
                    }),
            )
        })
        .clone()
}

/// Local inference backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalBackend {
    /// Ollama (https://ollama.ai)
    Ollama,
    /// llama.cpp HTTP server
    LlamaCpp,
    /// OpenAI-compatible completions API
    OpenAICompatible,
}

impl LocalBackend {
    /// Parse a backend id from configuration
    pub fn from_id(id: &str) -> Result<Self> {
        match id.trim().to_lowercase().as_str() {
            "ollama" => Ok(LocalBackend::Ollama),
            "llamacpp" | "llama.cpp" | "llama-cpp" => Ok(LocalBackend::LlamaCpp),
            "openai" | "openai-compatible" | "localai" | "vllm" => {
                Ok(LocalBackend::OpenAICompatible)
            }
            other => Err(SymbioError::config(format!(
                "Unknown inference backend: '{}'",
                other
            ))),
        }
    }
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Ollama generate response (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Ollama embeddings response
#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Local model endpoint
pub struct LocalEndpoint {
    client: Arc<Client>,
    backend: LocalBackend,
    base_url: String,
    default_model: String,
    embedding_model: Option<String>,
    max_response_size: usize,
}

impl LocalEndpoint {
    /// Create an endpoint against a backend
    ///
    /// # Errors
    /// Returns an error if the base URL or model name is invalid
    pub fn new(
        backend: LocalBackend,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let default_model = default_model.into();
        Self::validate_url(&base_url)?;
        Self::validate_model_name(&default_model)?;

        tracing::debug!(
            backend = ?backend,
            base_url = %base_url,
            model = %default_model,
            "Local endpoint configured"
        );

        Ok(Self {
            client: get_http_client(),
            backend,
            base_url,
            default_model,
            embedding_model: None,
            max_response_size: 10 * 1024 * 1024,
        })
    }

    /// Build an endpoint from a model configuration section
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let backend = LocalBackend::from_id(&config.backend)?;
        Self::new(backend, config.host.clone(), config.model.clone())
    }

    /// Enable embeddings through a named embedding model (Ollama only)
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Validate URL format
    pub fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(SymbioError::config("Base URL cannot be empty"));
        }
        if url.len() > 2048 {
            return Err(SymbioError::config("URL is too long (max 2048 characters)"));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SymbioError::config(format!(
                "Invalid URL format: '{}'. Must start with http:// or https://",
                url
            )));
        }
        Ok(())
    }

    /// Validate model name (basic sanitization)
    pub fn validate_model_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(SymbioError::config("Model name cannot be empty"));
        }
        if name.len() > 256 {
            return Err(SymbioError::config(
                "Model name is too long (max 256 characters)",
            ));
        }
        if name.contains('\0') || name.contains('\n') || name.contains('\r') {
            return Err(SymbioError::config("Model name contains invalid characters"));
        }
        Ok(())
    }

    fn resolve_model(&self, params: &GenerateParams) -> Result<String> {
        match &params.model {
            Some(model) => {
                Self::validate_model_name(model)?;
                Ok(model.clone())
            }
            None => Ok(self.default_model.clone()),
        }
    }

    fn check_params(params: &GenerateParams) -> Result<()> {
        if params.prompt.is_empty() {
            return Err(SymbioError::validation("Prompt cannot be empty"));
        }
        if params.prompt.len() > 1_000_000 {
            return Err(SymbioError::validation("Prompt is too long (max 1MB)"));
        }
        if let Some(temperature) = params.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(SymbioError::validation(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temperature
                )));
            }
        }
        Ok(())
    }

    fn check_size(&self, text: &str) -> Result<()> {
        if text.len() > self.max_response_size {
            return Err(SymbioError::inference(format!(
                "Response text too large: {} bytes (max {} bytes)",
                text.len(),
                self.max_response_size
            )));
        }
        Ok(())
    }

    async fn generate_ollama(&self, params: GenerateParams) -> Result<String> {
        let model = self.resolve_model(&params)?;
        Self::check_params(&params)?;

        let request = OllamaRequest {
            model,
            prompt: params.prompt,
            stream: false,
            options: Some(OllamaOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.max_tokens,
                seed: params.seed,
                stop: params.stop,
            }),
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SymbioError::inference(format!(
                    "Ollama API request failed: {}. Check if Ollama is running at {}",
                    e, self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(SymbioError::inference(format!(
                "Ollama API returned error status {}: {}",
                status, error_text
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|e| {
            SymbioError::inference(format!("Failed to parse Ollama response: {}", e))
        })?;
        self.check_size(&body.response)?;
        Ok(body.response)
    }

    async fn generate_llama_cpp(&self, params: GenerateParams) -> Result<String> {
        Self::check_params(&params)?;

        let request = serde_json::json!({
            "prompt": params.prompt,
            "n_predict": params.max_tokens.unwrap_or(512),
            "temperature": params.temperature.unwrap_or(0.7),
            "stop": params.stop.unwrap_or_default(),
        });

        let url = format!("{}/completion", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SymbioError::inference(format!(
                    "llama.cpp API request failed: {}. Check if server is running at {}",
                    e, self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(SymbioError::inference(format!(
                "llama.cpp API returned error status {}: {}",
                status, error_text
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            SymbioError::inference(format!("Failed to parse llama.cpp response: {}", e))
        })?;

        let text = json
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SymbioError::inference("Invalid llama.cpp response: missing 'content' field")
            })?;
        self.check_size(text)?;
        Ok(text.to_string())
    }

    async fn openai_completion(
        &self,
        params: GenerateParams,
        want_logprobs: bool,
    ) -> Result<serde_json::Value> {
        let model = self.resolve_model(&params)?;
        Self::check_params(&params)?;

        let mut request = serde_json::json!({
            "model": model,
            "prompt": params.prompt,
            "max_tokens": params.max_tokens.unwrap_or(512),
            "temperature": params.temperature.unwrap_or(0.7),
        });
        if let Some(top_p) = params.top_p {
            request["top_p"] = serde_json::json!(top_p);
        }
        if let Some(seed) = params.seed {
            request["seed"] = serde_json::json!(seed);
        }
        if let Some(stop) = params.stop {
            request["stop"] = serde_json::json!(stop);
        }
        if want_logprobs {
            request["logprobs"] = serde_json::json!(0);
        }

        let url = format!("{}/v1/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SymbioError::inference(format!(
                    "Completions API request failed: {}. Check if server is running at {}",
                    e, self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return Err(SymbioError::inference(format!(
                "Completions API returned error status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            SymbioError::inference(format!("Failed to parse completions response: {}", e))
        })
    }

    fn first_choice(json: &serde_json::Value) -> Result<&serde_json::Value> {
        json.get("choices")
            .and_then(|v| v.as_array())
            .and_then(|choices| choices.first())
            .ok_or_else(|| {
                SymbioError::inference("Invalid completions response: empty 'choices' array")
            })
    }
}

#[async_trait]
impl InferenceEndpoint for LocalEndpoint {
    fn name(&self) -> &str {
        match self.backend {
            LocalBackend::Ollama => "ollama",
            LocalBackend::LlamaCpp => "llama.cpp",
            LocalBackend::OpenAICompatible => "openai-compatible",
        }
    }

    async fn generate(&self, params: GenerateParams) -> Result<String> {
        match self.backend {
            LocalBackend::Ollama => self.generate_ollama(params).await,
            LocalBackend::LlamaCpp => self.generate_llama_cpp(params).await,
            LocalBackend::OpenAICompatible => {
                let json = self.openai_completion(params, false).await?;
                let choice = Self::first_choice(&json)?;
                let text = choice.get("text").and_then(|v| v.as_str()).ok_or_else(|| {
                    SymbioError::inference("Invalid completions response: missing 'text'")
                })?;
                self.check_size(text)?;
                Ok(text.to_string())
            }
        }
    }

    fn supports_logprobs(&self) -> bool {
        self.backend == LocalBackend::OpenAICompatible
    }

    async fn generate_with_logprobs(&self, params: GenerateParams) -> Result<(String, Vec<f64>)> {
        if self.backend != LocalBackend::OpenAICompatible {
            return Err(SymbioError::inference(format!(
                "Backend '{}' does not expose log-probabilities",
                self.name()
            )));
        }

        let json = self.openai_completion(params, true).await?;
        let choice = Self::first_choice(&json)?;
        let text = choice
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let logprobs = choice
            .get("logprobs")
            .and_then(|l| l.get("token_logprobs"))
            .and_then(|v| v.as_array())
            .map(|values| values.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();

        Ok((text, logprobs))
    }

    fn supports_embeddings(&self) -> bool {
        self.backend == LocalBackend::Ollama && self.embedding_model.is_some()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.embedding_model.as_ref().ok_or_else(|| {
            SymbioError::inference("No embedding model configured for this endpoint")
        })?;

        let request = serde_json::json!({
            "model": model,
            "prompt": text,
        });

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SymbioError::inference(format!("Embeddings request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SymbioError::inference(format!(
                "Embeddings API returned error status {}",
                status
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            SymbioError::inference(format!("Failed to parse embeddings response: {}", e))
        })?;
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!(LocalBackend::from_id("ollama").unwrap(), LocalBackend::Ollama);
        assert_eq!(
            LocalBackend::from_id("llama.cpp").unwrap(),
            LocalBackend::LlamaCpp
        );
        assert_eq!(
            LocalBackend::from_id("vllm").unwrap(),
            LocalBackend::OpenAICompatible
        );
        assert!(LocalBackend::from_id("quantum").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(LocalEndpoint::validate_url("http://localhost:11434").is_ok());
        assert!(LocalEndpoint::validate_url("https://example.com").is_ok());
        assert!(LocalEndpoint::validate_url("").is_err());
        assert!(LocalEndpoint::validate_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_model_name_validation() {
        assert!(LocalEndpoint::validate_model_name("qwen2.5:7b").is_ok());
        assert!(LocalEndpoint::validate_model_name("").is_err());
        assert!(LocalEndpoint::validate_model_name(&"a".repeat(257)).is_err());
        assert!(LocalEndpoint::validate_model_name("model\nname").is_err());
    }

    #[test]
    fn test_capabilities_by_backend() {
        let ollama =
            LocalEndpoint::new(LocalBackend::Ollama, "http://localhost:11434", "llama3").unwrap();
        assert!(!ollama.supports_logprobs());
        assert!(!ollama.supports_embeddings());

        let ollama = ollama.with_embedding_model("nomic-embed-text");
        assert!(ollama.supports_embeddings());

        let openai = LocalEndpoint::new(
            LocalBackend::OpenAICompatible,
            "http://localhost:8000",
            "qwen",
        )
        .unwrap();
        assert!(openai.supports_logprobs());
        assert!(!openai.supports_embeddings());
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig::default();
        let endpoint = LocalEndpoint::from_config(&config).unwrap();
        assert_eq!(endpoint.name(), "ollama");
    }
}
