//! Cloud/local routing layer for Symbio
//!
//! An optional pre-step wrapper: a task whose fingerprint is already in
//! the cache can be answered without invoking the solver (the cached
//! result still passes through the verifier, reward engine, and the
//! trajectory log). The cache file is maintained here, never read during
//! a step by the core.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symbio_core::{FileLockGuard, Result, RouterConfig, SymbioError, Task};
use tracing::{debug, warn};

/// Default cache capacity; LRU eviction applies on write past this
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Lock acquisition timeout for cache writes
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a step's solve should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Confident enough for the local student
    Local,
    /// Escalate to the cloud endpoint
    Cloud,
}

/// Stable fingerprint of a task: domain, prompt, and verifier
pub fn task_fingerprint(task: &Task) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.domain.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(task.prompt.as_bytes());
    hasher.update(b"\x1f");
    if let Ok(verifier) = serde_json::to_vec(&task.verifier) {
        hasher.update(&verifier);
    }
    format!("{:x}", hasher.finalize())
}

/// One cached solve result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    /// The answer the solver produced
    pub result: String,
    /// Its confidence at solve time
    pub confidence: f64,
    /// Insertion timestamp (ms since epoch), doubles as LRU age
    pub timestamp: i64,
}

/// Fingerprint-keyed result cache persisted as `router_cache.json`
pub struct RouterCache {
    path: PathBuf,
    capacity: usize,
    entries: HashMap<String, CachedResult>,
}

impl RouterCache {
    /// Open a cache file, loading existing entries when present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_capacity(path, DEFAULT_CACHE_CAPACITY)
    }

    /// Open with an explicit capacity
    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Router cache at {} is corrupt, starting empty: {}", path.display(), e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            capacity,
            entries,
        })
    }

    /// Number of cached results
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a fingerprint, refreshing its LRU age on hit
    pub fn get(&mut self, fingerprint: &str) -> Option<CachedResult> {
        let entry = self.entries.get_mut(fingerprint)?;
        entry.timestamp = chrono::Utc::now().timestamp_millis();
        Some(entry.clone())
    }

    /// Insert a result, evicting the least-recently-used entries past
    /// capacity, and persist the cache file
    pub fn put(&mut self, fingerprint: String, result: CachedResult) -> Result<()> {
        self.entries.insert(fingerprint, result);

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.timestamp)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!("Router cache evicting {}", key);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }

        self.persist()
    }

    /// Atomic rewrite under the shared lock discipline
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let _guard = FileLockGuard::acquire(&self.path, LOCK_TIMEOUT)?;
        let temp = self.path.with_extension("json.tmp");
        let serialized = serde_json::to_string(&self.entries)?;
        std::fs::write(&temp, serialized)?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            SymbioError::other(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// The routing wrapper around a step
pub struct Router {
    config: RouterConfig,
    cache: RouterCache,
}

impl Router {
    /// Build a router from its configuration section
    pub fn new(config: RouterConfig) -> Result<Self> {
        let cache = RouterCache::open(&config.cache_path)?;
        Ok(Self { config, cache })
    }

    /// Whether routing is enabled at all
    pub fn enabled(&self) -> bool {
        self.config.enable
    }

    /// Serve a cached result for a task, if one exists
    pub fn lookup(&mut self, task: &Task) -> Option<CachedResult> {
        if !self.config.enable {
            return None;
        }
        let fingerprint = task_fingerprint(task);
        let hit = self.cache.get(&fingerprint);
        if hit.is_some() {
            debug!(task_id = %task.task_id, "Router cache hit");
        }
        hit
    }

    /// Record a solve result for future cache hits
    pub fn record(&mut self, task: &Task, result: &str, confidence: f64) -> Result<()> {
        if !self.config.enable {
            return Ok(());
        }
        self.cache.put(
            task_fingerprint(task),
            CachedResult {
                result: result.to_string(),
                confidence,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        )
    }

    /// Decide where a solve at this confidence should run
    pub fn decide(&self, confidence: f64) -> RouteDecision {
        if confidence >= self.config.local_confidence_threshold {
            RouteDecision::Local
        } else {
            RouteDecision::Cloud
        }
    }

    /// Whether a cloud answer at this confidence is accepted
    pub fn accepts_cloud(&self, confidence: f64) -> bool {
        confidence >= self.config.cloud_confidence_threshold
    }

    /// Path of the backing cache file
    pub fn cache_path(&self) -> &Path {
        &self.cache.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbio_core::{Domain, VerifierSpec};
    use tempfile::TempDir;

    fn sample_task(prompt: &str) -> Task {
        Task::new(
            "t1",
            Domain::Math,
            0.2,
            prompt,
            VerifierSpec::Numeric {
                expected: 4.0,
                tolerance: 1e-6,
            },
        )
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = task_fingerprint(&sample_task("Solve 2x + 3 = 11 for x."));
        let b = task_fingerprint(&sample_task("Solve 2x + 3 = 11 for x."));
        let c = task_fingerprint(&sample_task("Solve 3x - 1 = 8 for x."));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_round_trip_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router_cache.json");

        {
            let mut cache = RouterCache::open(&path).unwrap();
            cache
                .put(
                    "fp1".to_string(),
                    CachedResult {
                        result: "4".to_string(),
                        confidence: 0.9,
                        timestamp: 1,
                    },
                )
                .unwrap();
        }

        let mut cache = RouterCache::open(&path).unwrap();
        let hit = cache.get("fp1").unwrap();
        assert_eq!(hit.result, "4");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_lru_eviction_past_capacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router_cache.json");
        let mut cache = RouterCache::with_capacity(&path, 3).unwrap();

        for i in 0..3 {
            cache
                .put(
                    format!("fp{}", i),
                    CachedResult {
                        result: i.to_string(),
                        confidence: 0.5,
                        timestamp: i as i64,
                    },
                )
                .unwrap();
        }

        // Touch fp0 so fp1 becomes the LRU entry
        cache.get("fp0").unwrap();
        cache
            .put(
                "fp3".to_string(),
                CachedResult {
                    result: "3".to_string(),
                    confidence: 0.5,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            )
            .unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.get("fp1").is_none());
        assert!(cache.get("fp0").is_some());
    }

    #[test]
    fn test_router_thresholds() {
        let dir = TempDir::new().unwrap();
        let config = RouterConfig {
            enable: true,
            cloud_confidence_threshold: 0.8,
            local_confidence_threshold: 0.5,
            cache_path: dir.path().join("router_cache.json"),
        };
        let router = Router::new(config).unwrap();

        assert_eq!(router.decide(0.6), RouteDecision::Local);
        assert_eq!(router.decide(0.4), RouteDecision::Cloud);
        assert!(router.accepts_cloud(0.85));
        assert!(!router.accepts_cloud(0.7));
    }

    #[test]
    fn test_disabled_router_is_inert() {
        let dir = TempDir::new().unwrap();
        let config = RouterConfig {
            enable: false,
            cache_path: dir.path().join("router_cache.json"),
            ..Default::default()
        };
        let mut router = Router::new(config).unwrap();

        let task = sample_task("Solve 2x + 3 = 11 for x.");
        router.record(&task, "4", 0.9).unwrap();
        assert!(router.lookup(&task).is_none());
        assert!(!router.cache_path().exists());
    }

    #[test]
    fn test_corrupt_cache_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router_cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = RouterCache::open(&path).unwrap();
        assert!(cache.is_empty());
    }
}
