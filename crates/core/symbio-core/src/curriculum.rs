//! Frontier curriculum scheduler

use crate::config::CurriculumConfig;
use crate::types::{CurriculumSignal, Domain};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Difficulty floor after every update
pub const MIN_DIFFICULTY: f64 = 0.1;

/// Difficulty ceiling after every update
pub const MAX_DIFFICULTY: f64 = 0.9;

/// Difficulty adjustment applied when the windowed rate leaves the band
const DIFFICULTY_STEP: f64 = 0.05;

/// Fixed-rotation stride when frontier mode is disabled
const ROTATION_STRIDE: u64 = 5;

/// Starting per-domain difficulty
const INITIAL_DIFFICULTY: f64 = 0.3;

/// FNV-1a over the scheduler seed and step, the deterministic source of
/// the exploration draw (`next_signal` stays pure)
fn exploration_draw(seed: u64, step: u64) -> f64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in seed.to_le_bytes().into_iter().chain(step.to_le_bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Snapshot of the scheduler state, for logs and assertions
#[derive(Debug, Clone)]
pub struct CurriculumState {
    /// Per-domain difficulty
    pub difficulty: HashMap<Domain, f64>,
    /// Per-domain windowed success rate
    pub success_rate: HashMap<Domain, f64>,
    /// Global step counter
    pub step: u64,
    /// Domain of the most recent update
    pub current_domain: Domain,
}

/// Selects the next (domain, difficulty) pair to keep the student near the
/// target success rate
///
/// `next_signal` is pure; `update` is the only mutator.
pub struct CurriculumScheduler {
    config: CurriculumConfig,
    domains: Vec<Domain>,
    difficulty: HashMap<Domain, f64>,
    history: HashMap<Domain, VecDeque<bool>>,
    step: u64,
    current_domain: Domain,
    seed: u64,
}

impl CurriculumScheduler {
    /// Build a scheduler from the curriculum configuration
    pub fn new(config: CurriculumConfig) -> Self {
        Self::with_seed(config, 0x5eed)
    }

    /// Build a scheduler with an explicit exploration seed
    pub fn with_seed(config: CurriculumConfig, seed: u64) -> Self {
        let mut domains: Vec<Domain> = config
            .domains
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        if domains.is_empty() {
            domains = Domain::ALL.to_vec();
        }
        // Lexicographic order makes tie-breaking well defined
        domains.sort();

        let difficulty = domains
            .iter()
            .map(|&d| (d, INITIAL_DIFFICULTY))
            .collect::<HashMap<_, _>>();
        let history = domains
            .iter()
            .map(|&d| (d, VecDeque::new()))
            .collect::<HashMap<_, _>>();
        let current_domain = domains[0];

        Self {
            config,
            domains,
            difficulty,
            history,
            step: 0,
            current_domain,
            seed,
        }
    }

    /// Windowed success rate for a domain; the target when the window is empty
    pub fn success_rate(&self, domain: Domain) -> f64 {
        let window = &self.history[&domain];
        if window.is_empty() {
            self.config.target_success
        } else {
            window.iter().filter(|&&s| s).count() as f64 / window.len() as f64
        }
    }

    /// The domain the next update will be attributed to
    fn select_domain(&self) -> Domain {
        if !self.config.enable_frontier {
            let index = (self.step / ROTATION_STRIDE) as usize % self.domains.len();
            return self.domains[index];
        }

        // Score every domain by distance from the target; closest wins,
        // ties broken by the lexicographic domain order.
        let mut scored: Vec<(f64, Domain)> = self
            .domains
            .iter()
            .map(|&d| ((self.success_rate(d) - self.config.target_success).abs(), d))
            .collect();
        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let explore = exploration_draw(self.seed, self.step) < self.config.epsilon;
        if explore && scored.len() > 1 {
            scored[1].1
        } else {
            scored[0].1
        }
    }

    /// Emit the next scheduling signal without mutating any state
    pub fn next_signal(&self) -> CurriculumSignal {
        let domain = self.select_domain();
        CurriculumSignal {
            domain,
            difficulty: self.difficulty[&domain],
            next_task_id: format!("task-{}", self.step + 1),
            prompt_override: None,
        }
    }

    /// Record the outcome of the step the latest signal described
    pub fn update(&mut self, success: bool) {
        let domain = self.select_domain();

        let window_size = self.config.window_size;
        let window = self.history.get_mut(&domain).expect("known domain");
        window.push_back(success);
        while window.len() > window_size {
            window.pop_front();
        }

        let rate = self.success_rate(domain);
        let difficulty = self.difficulty.get_mut(&domain).expect("known domain");
        if rate > self.config.target_success + self.config.frontier_window {
            *difficulty += DIFFICULTY_STEP;
        } else if rate < self.config.target_success - self.config.frontier_window {
            *difficulty -= DIFFICULTY_STEP;
        }
        *difficulty = difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

        self.current_domain = domain;
        self.step += 1;

        debug!(
            domain = %domain,
            rate,
            difficulty = *difficulty,
            step = self.step,
            "Curriculum updated"
        );
    }

    /// Snapshot the current state
    pub fn state(&self) -> CurriculumState {
        CurriculumState {
            difficulty: self.difficulty.clone(),
            success_rate: self
                .domains
                .iter()
                .map(|&d| (d, self.success_rate(d)))
                .collect(),
            step: self.step,
            current_domain: self.current_domain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frontier: bool) -> CurriculumConfig {
        CurriculumConfig {
            enable_frontier: frontier,
            ..Default::default()
        }
    }

    #[test]
    fn test_rotation_every_five_steps() {
        let mut scheduler = CurriculumScheduler::new(config(false));
        let mut seen = Vec::new();
        for _ in 0..15 {
            let signal = scheduler.next_signal();
            seen.push(signal.domain);
            scheduler.update(true);
        }

        // Domains are in lexicographic order: code, logic, math
        assert!(seen[0..5].iter().all(|&d| d == Domain::Code));
        assert!(seen[5..10].iter().all(|&d| d == Domain::Logic));
        assert!(seen[10..15].iter().all(|&d| d == Domain::Math));
    }

    #[test]
    fn test_next_signal_is_pure() {
        let scheduler = CurriculumScheduler::new(config(true));
        let a = scheduler.next_signal();
        let b = scheduler.next_signal();
        assert_eq!(a.domain, b.domain);
        assert_eq!(a.next_task_id, b.next_task_id);
        assert!((a.difficulty - b.difficulty).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_successes_push_difficulty_to_ceiling() {
        let mut scheduler = CurriculumScheduler::new(config(false));
        for _ in 0..200 {
            scheduler.update(true);
        }
        let state = scheduler.state();
        for (_, &difficulty) in state.difficulty.iter() {
            assert!((difficulty - MAX_DIFFICULTY).abs() < 1e-9);
        }
    }

    #[test]
    fn test_all_failures_push_difficulty_to_floor() {
        let mut scheduler = CurriculumScheduler::new(config(false));
        for _ in 0..200 {
            scheduler.update(false);
        }
        let state = scheduler.state();
        for (_, &difficulty) in state.difficulty.iter() {
            assert!((difficulty - MIN_DIFFICULTY).abs() < 1e-9);
        }
    }

    #[test]
    fn test_difficulty_stays_clamped() {
        let mut scheduler = CurriculumScheduler::new(config(true));
        for i in 0..500 {
            scheduler.update(i % 2 == 0);
            for &difficulty in scheduler.state().difficulty.values() {
                assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty));
            }
        }
    }

    #[test]
    fn test_empty_window_rate_is_target() {
        let scheduler = CurriculumScheduler::new(config(true));
        assert!((scheduler.success_rate(Domain::Math) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut scheduler = CurriculumScheduler::new(config(false));
        for _ in 0..100 {
            scheduler.update(true);
        }
        for window in scheduler.history.values() {
            assert!(window.len() <= scheduler.config.window_size);
        }
    }

    #[test]
    fn test_frontier_concentrates_on_target_domain() {
        // Mock student: math is easy, code is hopeless, logic sits at the
        // target. The frontier should spend most of its budget on logic.
        let mut scheduler = CurriculumScheduler::with_seed(config(true), 42);
        let rate_for = |domain: Domain| match domain {
            Domain::Math => 0.9,
            Domain::Logic => 0.5,
            Domain::Code => 0.1,
        };

        let mut visits: HashMap<Domain, usize> = HashMap::new();
        let mut draw_state = 0x12345u64;
        for step in 0..200 {
            let signal = scheduler.next_signal();
            if step >= 100 {
                *visits.entry(signal.domain).or_default() += 1;
            }
            // Deterministic Bernoulli draw at the domain's success rate
            draw_state = draw_state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let uniform = (draw_state >> 11) as f64 / (1u64 << 53) as f64;
            scheduler.update(uniform < rate_for(signal.domain));
        }

        let logic_visits = *visits.get(&Domain::Logic).unwrap_or(&0);
        assert!(
            logic_visits >= 60,
            "expected >= 60 logic visits in the last 100 steps, got {}",
            logic_visits
        );

        // The extreme domains drift toward their clamps
        let state = scheduler.state();
        assert!(state.difficulty[&Domain::Math] > INITIAL_DIFFICULTY);
        assert!(state.difficulty[&Domain::Code] < INITIAL_DIFFICULTY);
    }
}
