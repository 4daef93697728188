//! Append-only run persistence: trajectories and security events

use crate::security::SecurityEvent;
use crate::types::Trajectory;
use crate::{Result, SymbioError};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lock files older than this are considered abandoned and removed
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// Poll interval while waiting for a contended lock
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Writes demoted by lock contention are buffered up to this many lines
const MAX_BUFFERED_LINES: usize = 1000;

/// Exclusive advisory lock, held for the lifetime of the guard
///
/// The lock is a sibling `<file>.lock` created atomically; stale locks are
/// cleaned up before acquisition is attempted.
pub struct FileLockGuard {
    lock_path: PathBuf,
}

impl FileLockGuard {
    /// Acquire the lock for `path`, waiting up to `timeout`
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path_for(path);
        let deadline = Instant::now() + timeout;

        loop {
            remove_stale_lock(&lock_path);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    // Record the owner pid for debugging contended runs
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(SymbioError::lock(format!(
                            "Timed out acquiring {}",
                            lock_path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(SymbioError::lock(format!(
                        "Failed to create {}: {}",
                        lock_path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!("Failed to release lock {}: {}", self.lock_path.display(), e);
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    name.push_str(".lock");
    path.with_file_name(name)
}

fn remove_stale_lock(lock_path: &Path) {
    let Ok(metadata) = fs::metadata(lock_path) else {
        return;
    };
    let stale = metadata
        .modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .map(|age| age > STALE_LOCK_AGE)
        .unwrap_or(false);
    if stale {
        warn!("Removing stale lock {}", lock_path.display());
        let _ = fs::remove_file(lock_path);
    }
}

/// Append one pre-serialized line to a file under the advisory lock
fn append_line_locked(path: &Path, line: &str, lock_timeout: Duration) -> Result<()> {
    let _guard = FileLockGuard::acquire(path, lock_timeout)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// The append-only trajectory log
///
/// Each line is a self-contained JSON record. Writes that lose the lock
/// race past the timeout are demoted to an in-memory queue and drained on
/// the next successful append.
pub struct TrajectoryLog {
    path: PathBuf,
    lock_timeout: Duration,
    buffered: VecDeque<String>,
}

impl TrajectoryLog {
    /// Open (creating parent directories) a log at `path`
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock_timeout,
            buffered: VecDeque::new(),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines currently waiting for a successful lock
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Append a trajectory as one JSON line
    pub fn append(&mut self, trajectory: &Trajectory) -> Result<()> {
        let line = serde_json::to_string(trajectory)?;
        debug_assert!(!line.contains('\n'));

        match FileLockGuard::acquire(&self.path, self.lock_timeout) {
            Ok(_guard) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                while let Some(pending) = self.buffered.pop_front() {
                    writeln!(file, "{}", pending)?;
                }
                writeln!(file, "{}", line)?;
                debug!("Appended trajectory for task {}", trajectory.task.task_id);
                Ok(())
            }
            Err(SymbioError::Lock(reason)) => {
                warn!("Trajectory write demoted to buffer: {}", reason);
                if self.buffered.len() >= MAX_BUFFERED_LINES {
                    self.buffered.pop_front();
                    warn!("Trajectory buffer full, dropping oldest line");
                }
                self.buffered.push_back(line);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Read all persisted trajectories (test and trainer support)
    pub fn read_all(&self) -> Result<Vec<Trajectory>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let mut trajectories = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            trajectories.push(serde_json::from_str(line)?);
        }
        Ok(trajectories)
    }
}

/// The append-only security event log
pub struct SecurityEventLog {
    path: PathBuf,
    lock_timeout: Duration,
}

impl SecurityEventLog {
    /// Open (creating parent directories) a log at `path`
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path, lock_timeout })
    }

    /// Append one event as a JSON line; failures are logged, not raised
    pub fn record(&self, event: &SecurityEvent) {
        match serde_json::to_string(event) {
            Ok(line) => {
                if let Err(e) = append_line_locked(&self.path, &line, self.lock_timeout) {
                    warn!("Failed to record security event: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize security event: {}", e),
        }
    }
}

/// The per-run persistence root (`runs/` by default)
pub struct RunStore {
    /// Trajectory log, `trajectories.jsonl`
    pub trajectories: TrajectoryLog,
    /// Security event log, `security_events.jsonl`
    pub security_events: SecurityEventLog,
}

impl RunStore {
    /// Open a run directory, creating it if needed
    pub fn open(dir: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!("Run store at {}", dir.display());
        Ok(Self {
            trajectories: TrajectoryLog::open(dir.join("trajectories.jsonl"), lock_timeout)?,
            security_events: SecurityEventLog::open(
                dir.join("security_events.jsonl"),
                lock_timeout,
            )?,
        })
    }
}
