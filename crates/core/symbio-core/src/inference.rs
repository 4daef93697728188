//! The inference-endpoint contract the core drives models through

use crate::{Result, SymbioError};
use async_trait::async_trait;

/// Parameters for one text generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    /// The prompt
    pub prompt: String,
    /// Model override; endpoint default when None
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling parameter
    pub top_p: Option<f64>,
    /// Generation budget
    pub max_tokens: Option<usize>,
    /// Sampling seed for reproducible draws
    pub seed: Option<u64>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

impl GenerateParams {
    /// Build params around a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the generation budget
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the nucleus sampling parameter
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// A language-model endpoint the core can call
///
/// `generate` is mandatory; log-probabilities and embeddings are optional
/// capabilities the core probes before choosing its fallback paths.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    /// Endpoint name for logs and routing tags
    fn name(&self) -> &str;

    /// Generate free text for a prompt
    async fn generate(&self, params: GenerateParams) -> Result<String>;

    /// Whether `generate_with_logprobs` is implemented
    fn supports_logprobs(&self) -> bool {
        false
    }

    /// Generate text along with per-token log-probabilities
    async fn generate_with_logprobs(&self, _params: GenerateParams) -> Result<(String, Vec<f64>)> {
        Err(SymbioError::inference(format!(
            "Endpoint '{}' does not expose log-probabilities",
            self.name()
        )))
    }

    /// Whether `embed` is implemented
    fn supports_embeddings(&self) -> bool {
        false
    }

    /// Embed a text into a dense vector
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SymbioError::inference(format!(
            "Endpoint '{}' does not expose embeddings",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TextOnly;

    #[async_trait]
    impl InferenceEndpoint for TextOnly {
        fn name(&self) -> &str {
            "text-only"
        }

        async fn generate(&self, params: GenerateParams) -> Result<String> {
            Ok(format!("echo: {}", params.prompt))
        }
    }

    #[tokio::test]
    async fn test_optional_capabilities_default_to_errors() {
        let endpoint = TextOnly;
        assert!(!endpoint.supports_logprobs());
        assert!(!endpoint.supports_embeddings());
        assert!(endpoint
            .generate_with_logprobs(GenerateParams::new("hi"))
            .await
            .is_err());
        assert!(endpoint.embed("hi").await.is_err());
    }

    #[test]
    fn test_params_builder() {
        let params = GenerateParams::new("p")
            .with_temperature(0.2)
            .with_max_tokens(64);
        assert_eq!(params.prompt, "p");
        assert_eq!(params.temperature, Some(0.2));
        assert_eq!(params.max_tokens, Some(64));
    }
}
