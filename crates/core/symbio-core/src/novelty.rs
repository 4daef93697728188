//! Novelty index: bounded store of recent prompt embeddings

use crate::inference::InferenceEndpoint;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum embeddings retained; insertion past this evicts the oldest
pub const NOVELTY_CAPACITY: usize = 200;

/// Dimension of the deterministic fallback embedding
const FALLBACK_DIM: usize = 256;

/// FNV-1a, hand-rolled for a hash that is stable across platforms and runs
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic fallback embedder: character trigram counts, hashed into
/// a fixed number of buckets and length-normalized
pub fn fallback_embedding(text: &str) -> Vec<f32> {
    let mut buckets = vec![0.0f32; FALLBACK_DIM];
    let chars: Vec<char> = text.to_lowercase().chars().collect();

    if chars.is_empty() {
        return buckets;
    }

    for window in chars.windows(3.min(chars.len())) {
        let gram: String = window.iter().collect();
        let bucket = (fnv1a(gram.as_bytes()) % FALLBACK_DIM as u64) as usize;
        buckets[bucket] += 1.0;
    }

    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut buckets {
            *value /= norm;
        }
    }
    buckets
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Bounded FIFO store of recent prompt embeddings
///
/// A flat index: with a capacity of 200 a linear max-similarity scan is
/// exact and cheap, so no ANN structure sits in front of it.
pub struct NoveltyIndex {
    capacity: usize,
    entries: VecDeque<Vec<f32>>,
    endpoint: Option<Arc<dyn InferenceEndpoint>>,
}

impl NoveltyIndex {
    /// Index with the default capacity and the fallback embedder only
    pub fn new() -> Self {
        Self::with_capacity(NOVELTY_CAPACITY)
    }

    /// Index with an explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
            endpoint: None,
        }
    }

    /// Use an embedding-capable endpoint, falling back when it fails
    pub fn with_endpoint(mut self, endpoint: Arc<dyn InferenceEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Number of stored embeddings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed a text, preferring the endpoint when it offers embeddings
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(endpoint) = &self.endpoint {
            if endpoint.supports_embeddings() {
                match endpoint.embed(text).await {
                    Ok(vector) => return vector,
                    Err(e) => {
                        warn!("Embedding endpoint failed, using fallback: {}", e);
                    }
                }
            }
        }
        fallback_embedding(text)
    }

    /// Highest cosine similarity against the stored embeddings, in [0, 1]
    ///
    /// An empty index yields 0.
    pub fn max_similarity(&self, vector: &[f32]) -> f64 {
        self.entries
            .iter()
            .map(|entry| cosine_similarity(entry, vector))
            .fold(0.0f32, f32::max)
            .clamp(0.0, 1.0) as f64
    }

    /// Insert an embedding, evicting the oldest at capacity
    pub fn add(&mut self, vector: Vec<f32>) {
        self.entries.push_back(vector);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            debug!("Novelty index evicted oldest entry");
        }
    }
}

impl Default for NoveltyIndex {
    fn default() -> Self {
        Self::new()
    }
}
