//! Advisory file lock shared by independently-scheduled sweep processes.
//! Best effort and non-reentrant: a fresh marker means another sweep is
//! running and this one simply skips; a stale marker is treated as an
//! abandoned lock from a crashed holder and reclaimed.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::types::PlanError;

/// How long to wait before re-reading the marker to confirm ownership.
const READBACK_SETTLE: Duration = Duration::from_millis(100);

pub struct ExecutionLock {
    path: PathBuf,
    staleness: Duration,
}

impl ExecutionLock {
    pub fn new(path: impl Into<PathBuf>, staleness: Duration) -> Self {
        Self {
            path: path.into(),
            staleness,
        }
    }

    /// Non-blocking acquisition. `Ok(None)` means the lock is held by a
    /// live sweep and the caller should skip; sweeps are periodic and
    /// idempotent, so skipping beats queueing.
    pub fn try_acquire(&self) -> Result<Option<LockGuard>, PlanError> {
        if self.path.exists() {
            let age = marker_age(&self.path)?;
            if age < self.staleness {
                debug!(
                    "another sweep holds the lock (age {}s), skipping",
                    age.as_secs()
                );
                return Ok(None);
            }
            warn!("removing stale lock (age {}s)", age.as_secs());
            fs::remove_file(&self.path)?;
        }

        let token = Uuid::new_v4().to_string();
        fs::write(&self.path, &token)?;

        // Two processes can both observe a free lock and write their
        // tokens; the re-read after a short settle decides the winner.
        thread::sleep(READBACK_SETTLE);
        let readback = fs::read_to_string(&self.path)?;
        if readback != token {
            warn!("lock claimed by another process, skipping");
            return Ok(None);
        }

        debug!("acquired execution lock {token}");
        Ok(Some(LockGuard {
            path: self.path.clone(),
            token,
        }))
    }
}

/// Releases the marker when dropped, so the lock is returned on every
/// exit path out of a sweep, panics included. Only the marker written by
/// this guard is removed.
pub struct LockGuard {
    path: PathBuf,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(current) if current == self.token => {
                if let Err(err) = fs::remove_file(&self.path) {
                    warn!("failed to release execution lock: {err}");
                } else {
                    debug!("released execution lock {}", self.token);
                }
            }
            Ok(_) => {}
            Err(err) => warn!("failed to read lock marker during release: {err}"),
        }
    }
}

fn marker_age(path: &std::path::Path) -> Result<Duration, PlanError> {
    let modified = fs::metadata(path)?.modified()?;
    // An mtime in the future (clock skew) counts as a fresh lock.
    Ok(modified.elapsed().unwrap_or_default())
}
