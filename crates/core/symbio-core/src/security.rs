//! Security features: the code review gate, rate limiting, security events

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Python modules whose import is always rejected
static BLOCKED_MODULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "os",
        "subprocess",
        "sys",
        "socket",
        "shutil",
        "ctypes",
        "multiprocessing",
    ]
    .into_iter()
    .collect()
});

/// Calls that are rejected regardless of context
static BLOCKED_CALLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["eval", "exec", "compile", "__import__", "open"]
        .iter()
        .map(|name| Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))).unwrap())
        .collect()
});

/// Import statements, captured for module-name checks
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s+([A-Za-z_][\w.]*)|from\s+([A-Za-z_][\w.]*)\s+import)")
        .unwrap()
});

/// Destructive textual patterns rejected outright
static DANGEROUS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"rm\s+-rf").unwrap(), "recursive delete"),
        (Regex::new(r"(?i)del\s+/").unwrap(), "recursive delete"),
        (
            Regex::new(r"(?i)format\s+[a-z]:").unwrap(),
            "drive format",
        ),
        (Regex::new(r"\.\.[\\/]").unwrap(), "path traversal"),
        (
            Regex::new(r"(?i)\b(winreg|regedit|HKEY_)").unwrap(),
            "registry access",
        ),
    ]
});

/// Result of reviewing a code string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    /// True when no issue was found
    pub safe: bool,
    /// Findings that caused rejection
    pub issues: Vec<String>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
}

impl ReviewReport {
    /// Join the issues into a one-line rationale for tool stderr
    pub fn rationale(&self) -> String {
        self.issues.join("; ")
    }
}

/// Static review applied to any code string before it executes
///
/// This is the sole defense in the default configuration; there is no
/// runtime isolation behind it.
pub fn review(code: &str) -> ReviewReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for capture in IMPORT_RE.captures_iter(code) {
        let module = capture
            .get(1)
            .or_else(|| capture.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let root = module.split('.').next().unwrap_or(module);
        if BLOCKED_MODULES.contains(root) || root.starts_with("win32") {
            issues.push(format!("blocked import: {}", root));
        }
    }

    for call in BLOCKED_CALLS.iter() {
        if let Some(found) = call.find(code) {
            issues.push(format!(
                "blocked call: {}",
                found.as_str().trim_end_matches(['(', ' '])
            ));
        }
    }

    for (pattern, label) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(code) {
            issues.push(format!("dangerous pattern: {}", label));
        }
    }

    if code.len() > 100_000 {
        warnings.push(format!("large code body: {} bytes", code.len()));
    }

    ReviewReport {
        safe: issues.is_empty(),
        issues,
        warnings,
    }
}

/// Shell metacharacters that reject a command outright
const SHELL_METACHARACTERS: [&str; 7] = [";", "&", "|", "`", "$(", ">", "<"];

/// Check a shell command against the allowlist and metacharacter rules
pub fn review_shell(command: &str, allowed_heads: &[String]) -> ReviewReport {
    let mut issues = Vec::new();

    let head = command.split_whitespace().next().unwrap_or_default();
    if head.is_empty() {
        issues.push("empty command".to_string());
    } else if !allowed_heads.iter().any(|h| h == head) {
        issues.push(format!("command not in allowlist: {}", head));
    }

    for meta in SHELL_METACHARACTERS {
        if command.contains(meta) {
            issues.push(format!("shell metacharacter: {}", meta));
        }
    }

    ReviewReport {
        safe: issues.is_empty(),
        issues,
        warnings: Vec::new(),
    }
}

/// A security-relevant event bound for `security_events.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event kind: blocked_code, blocked_shell, rate_limited
    pub kind: String,
    /// Human-readable detail
    pub detail: String,
    /// Component that raised the event
    pub source: String,
    /// Event timestamp (ms since epoch)
    pub timestamp: i64,
}

impl SecurityEvent {
    /// Build an event stamped with the current time
    pub fn new(
        kind: impl Into<String>,
        detail: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Sliding-window rate limiter
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    timestamps: RwLock<Vec<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            timestamps: RwLock::new(Vec::new()),
        }
    }

    /// Check whether a request is allowed, recording it if so
    pub fn check(&self) -> bool {
        let mut timestamps = self.timestamps.write().unwrap_or_else(|poisoned| {
            tracing::error!("RateLimiter lock was poisoned, recovering");
            poisoned.into_inner()
        });
        let now = Instant::now();

        timestamps.retain(|&t| now.duration_since(t) < self.window);

        if timestamps.len() < self.max_requests {
            timestamps.push(now);
            true
        } else {
            false
        }
    }

    /// Remaining requests in the current window
    pub fn remaining(&self) -> usize {
        let mut timestamps = self.timestamps.write().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();
        timestamps.retain(|&t| now.duration_since(t) < self.window);
        self.max_requests.saturating_sub(timestamps.len())
    }
}

/// The per-minute and per-hour ceilings applied before each evolution step
pub struct StepRateLimiter {
    per_minute: RateLimiter,
    per_hour: RateLimiter,
}

impl StepRateLimiter {
    /// Create limits from the configured ceilings
    pub fn new(max_per_minute: usize, max_per_hour: usize) -> Self {
        Self {
            per_minute: RateLimiter::new(Duration::from_secs(60), max_per_minute),
            per_hour: RateLimiter::new(Duration::from_secs(3600), max_per_hour),
        }
    }

    /// Check both windows; a step is admitted only when both allow it
    pub fn check(&self) -> bool {
        // The hour window is checked first so a minute-level rejection does
        // not consume an hour-level slot.
        if self.per_hour.remaining() == 0 {
            return false;
        }
        if !self.per_minute.check() {
            return false;
        }
        self.per_hour.check()
    }
}
