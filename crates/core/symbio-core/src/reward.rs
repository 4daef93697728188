//! Reward engine: correctness, uncertainty, tool use, and novelty

use crate::config::RewardsConfig;
use crate::types::{Domain, RewardBreakdown, Trajectory};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::debug;

/// Signatures remembered for the repeat penalty
const SIGNATURE_MEMORY: usize = 100;

/// Reward for a correct solve
const CORRECT_REWARD: f64 = 1.0;

/// Penalty for an incorrect solve
const INCORRECT_PENALTY: f64 = -0.5;

/// Penalty when the student used no tools at all
const NO_TOOL_PENALTY: f64 = -0.2;

/// Reward granted per successful tool call, capped at 1.0
const PER_TOOL_REWARD: f64 = 0.25;

/// Penalty applied per repetition signal (signature hit, similarity hit)
const REPEAT_PENALTY: f64 = 0.5;

/// Compute the short symbolic novelty signature for a prompt
///
/// The reduced range (mod 10,000) collides readily; that collision rate is
/// part of the reward shaping, so the range is kept small on purpose.
pub fn novelty_signature(domain: Domain, prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut value: u64 = 0;
    for &byte in &digest[..8] {
        value = (value << 8) | byte as u64;
    }
    format!("{}:{}", domain.as_str(), value % 10_000)
}

/// Combines per-step signals into a scalar reward with a component breakdown
pub struct RewardEngine {
    config: RewardsConfig,
    recent_signatures: VecDeque<String>,
}

impl RewardEngine {
    /// Build an engine with the configured weights
    pub fn new(config: RewardsConfig) -> Self {
        Self {
            config,
            recent_signatures: VecDeque::new(),
        }
    }

    /// Compute the reward for one trajectory
    ///
    /// Deterministic in its inputs and the signature memory; the signature
    /// is recorded after the repeat check so a prompt never penalizes
    /// itself.
    pub fn compute(
        &mut self,
        trajectory: &Trajectory,
        success_prob: f64,
        signature: &str,
        max_similarity: f64,
    ) -> RewardBreakdown {
        let correctness = if trajectory.success {
            CORRECT_REWARD
        } else {
            INCORRECT_PENALTY
        };

        let uncertainty = 1.0 - (success_prob - self.config.target_success_rate).abs();

        let ok_calls = trajectory.ok_tool_calls();
        let tool_use = if trajectory.tool_calls.is_empty() {
            NO_TOOL_PENALTY
        } else {
            (PER_TOOL_REWARD * ok_calls as f64).min(1.0)
        };

        let mut novelty = 1.0;
        if self.recent_signatures.contains(&signature.to_string()) {
            novelty -= REPEAT_PENALTY;
        }
        if max_similarity > self.config.repetition_similarity_threshold {
            novelty -= REPEAT_PENALTY;
        }
        let novelty = novelty.max(-1.0);

        self.remember(signature);

        let total = self.config.weight_uncertainty * uncertainty
            + self.config.weight_tool_use * tool_use
            + self.config.weight_novelty * novelty
            + self.config.weight_correctness * correctness;

        debug!(
            task_id = %trajectory.task.task_id,
            total,
            "Computed reward"
        );

        RewardBreakdown {
            uncertainty,
            tool_use,
            novelty,
            correctness,
            total,
        }
    }

    fn remember(&mut self, signature: &str) {
        self.recent_signatures.push_back(signature.to_string());
        while self.recent_signatures.len() > SIGNATURE_MEMORY {
            self.recent_signatures.pop_front();
        }
    }
}
