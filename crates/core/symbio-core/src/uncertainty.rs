//! Calibrated success-probability estimates for (task, answer) pairs

use crate::inference::{GenerateParams, InferenceEndpoint};
use crate::templates::TemplateEngine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ratings parsed out of self-critique responses
static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"0(?:\.\d+)?|1(?:\.0+)?").unwrap());

/// Returned when no estimation path produces a usable value
const NEUTRAL_ESTIMATE: f64 = 0.5;

/// Temperature for self-critique queries
const CRITIQUE_TEMPERATURE: f64 = 0.1;

/// Produces `p_success ∈ [0, 1]` for a (prompt, answer) pair
///
/// Preference order: endpoint log-probabilities, then self-critique
/// sampling, then a neutral 0.5.
pub struct UncertaintyEstimator {
    endpoint: Arc<dyn InferenceEndpoint>,
    templates: TemplateEngine,
    samples: usize,
}

impl UncertaintyEstimator {
    /// Build an estimator over an endpoint
    pub fn new(endpoint: Arc<dyn InferenceEndpoint>, samples: usize) -> Self {
        Self {
            endpoint,
            templates: TemplateEngine::new(),
            samples: samples.max(1),
        }
    }

    /// Estimate the probability that `answer` is a correct answer to `prompt`
    pub async fn estimate(&self, prompt: &str, answer: &str) -> f64 {
        if self.endpoint.supports_logprobs() {
            match self.estimate_from_logprobs(prompt, answer).await {
                Some(estimate) => return estimate,
                None => {
                    warn!("Logprob estimation failed, falling back to self-critique");
                }
            }
        }

        self.estimate_from_critique(prompt, answer).await
    }

    /// exp(mean per-token logprob) of the answer tokens, clamped to [0, 1]
    async fn estimate_from_logprobs(&self, prompt: &str, answer: &str) -> Option<f64> {
        let params = GenerateParams::new(format!("{}\n{}", prompt, answer)).with_max_tokens(1);
        let (_, logprobs) = match self.endpoint.generate_with_logprobs(params).await {
            Ok(result) => result,
            Err(e) => {
                debug!("generate_with_logprobs failed: {}", e);
                return None;
            }
        };

        if logprobs.is_empty() {
            return None;
        }

        let mean = logprobs.iter().sum::<f64>() / logprobs.len() as f64;
        Some(mean.exp().clamp(0.0, 1.0))
    }

    /// Mean of parsed self-ratings over N low-temperature queries
    async fn estimate_from_critique(&self, prompt: &str, answer: &str) -> f64 {
        let critique = match self.templates.critique_prompt(prompt, answer) {
            Ok(critique) => critique,
            Err(e) => {
                warn!("Failed to render critique prompt: {}", e);
                return NEUTRAL_ESTIMATE;
            }
        };

        let mut ratings = Vec::new();
        for sample in 0..self.samples {
            let params = GenerateParams::new(critique.clone())
                .with_temperature(CRITIQUE_TEMPERATURE)
                .with_max_tokens(8);
            match self.endpoint.generate(params).await {
                Ok(text) => {
                    if let Some(rating) = parse_rating(&text) {
                        ratings.push(rating);
                    } else {
                        debug!("Critique sample {} had no parsable rating", sample);
                    }
                }
                Err(e) => {
                    debug!("Critique sample {} failed: {}", sample, e);
                }
            }
        }

        if ratings.is_empty() {
            return NEUTRAL_ESTIMATE;
        }

        let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
        mean.clamp(0.0, 1.0)
    }
}

/// Extract the first rating-shaped number from a critique response
fn parse_rating(text: &str) -> Option<f64> {
    RATING_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
