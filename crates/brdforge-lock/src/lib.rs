//! Advisory run lock for brdforge pipeline executions
//!
//! At most one pipeline execution may mutate a given checkpoint store at
//! a time. The lock is a marker file created with exclusive-create
//! semantics (never read-then-write, so there is no race window), with a
//! file-descriptor lock held for the guard's lifetime. A competing
//! acquirer polls until the marker disappears or its wait budget runs
//! out.
//!
//! The lock is advisory and path-scoped: it coordinates brdforge
//! processes but is not a security boundary, and it cannot protect two
//! distinct lock paths aimed at the same logical store. Callers configure
//! one lock path per checkpoint store.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{Duration, Instant};
use tracing::debug;

/// Marker document stored in the lock file while a run holds the lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Run that acquired the lock
    pub run_id: String,
    /// Process ID of the holder
    pub pid: u32,
    /// When the lock was acquired
    pub acquired_at_utc: DateTime<Utc>,
}

/// Lock errors for run lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Timeout acquiring pipeline lock at {path} after {waited_secs:.1}s (held by run '{holder}')"
    )]
    Timeout {
        path: String,
        waited_secs: f64,
        holder: String,
    },

    #[error("Lock at {path} is held by a live process (run '{run_id}', PID {pid})")]
    HeldByLiveProcess {
        path: String,
        run_id: String,
        pid: u32,
    },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive guard over one lock path.
///
/// The marker file exists exactly as long as the guard lives; it is
/// removed on [`release`](RunLock::release) and on drop, error paths
/// included.
pub struct RunLock {
    lock_path: Utf8PathBuf,
    // Held while active; dropping unlocks the descriptor before the
    // marker is removed.
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl RunLock {
    /// Acquire the lock at `lock_path` for `run_id`, waiting at most
    /// `timeout` and re-checking every `poll_interval`.
    ///
    /// # Errors
    /// [`LockError::Timeout`] when another holder outlasts the wait
    /// budget; [`LockError::AcquisitionFailed`] for anything else.
    pub fn acquire(
        lock_path: &Utf8Path,
        run_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, LockError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to create lock directory {parent}: {e}"),
            })?;
        }

        let start = Instant::now();
        loop {
            // Exclusive create is the whole guarantee: either we own the
            // brand-new file or someone else already does.
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(lock_path.as_std_path())
            {
                Ok(lock_file) => {
                    let info = LockInfo {
                        run_id: run_id.to_string(),
                        pid: process::id(),
                        acquired_at_utc: Utc::now(),
                    };
                    debug!(lock_path = %lock_path, run_id, "acquired run lock");
                    return Self::finalize(lock_path.to_owned(), lock_file, info);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        let holder = Self::read_info(lock_path)
                            .ok()
                            .flatten()
                            .map_or_else(|| "unknown".to_string(), |info| info.run_id);
                        return Err(LockError::Timeout {
                            path: lock_path.to_string(),
                            waited_secs: start.elapsed().as_secs_f64(),
                            holder,
                        });
                    }
                    std::thread::sleep(poll_interval);
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("Failed to create lock file at {lock_path}: {e}"),
                    });
                }
            }
        }
    }

    /// Write the marker under an exclusive fd lock and build the guard.
    fn finalize(
        lock_path: Utf8PathBuf,
        lock_file: fs::File,
        info: LockInfo,
    ) -> Result<Self, LockError> {
        let marker = serde_json::to_string_pretty(&info).map_err(|e| {
            LockError::AcquisitionFailed {
                reason: format!("Failed to serialize lock marker for run '{}': {e}", info.run_id),
            }
        })?;

        let mut rw_lock = Box::new(RwLock::new(lock_file));
        {
            let fd_lock = rw_lock
                .try_write()
                .map_err(|e| LockError::AcquisitionFailed {
                    reason: format!("Failed to take descriptor lock at {lock_path}: {e}"),
                })?;

            let mut file_ref = &*fd_lock;
            file_ref
                .write_all(marker.as_bytes())
                .and_then(|()| file_ref.flush())
                .and_then(|()| file_ref.sync_all())
                .map_err(|e| LockError::AcquisitionFailed {
                    reason: format!("Failed to write lock marker at {lock_path}: {e}"),
                })?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            info,
        })
    }

    /// Read the marker at `lock_path`, if any.
    ///
    /// A marker that exists but cannot be parsed yet (the holder may be
    /// mid-write) is reported as absent rather than an error.
    pub fn read_info(lock_path: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        let content = match fs::read_to_string(lock_path.as_std_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::Io(e)),
        };
        Ok(serde_json::from_str(&content).ok())
    }

    /// Whether a marker currently exists at `lock_path`.
    #[must_use]
    pub fn exists(lock_path: &Utf8Path) -> bool {
        lock_path.as_std_path().exists()
    }

    /// Release the lock explicitly (also happens on drop).
    pub fn release(mut self) -> Result<(), LockError> {
        self._fd_lock.take();
        match fs::remove_file(self.lock_path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: format!("Failed to remove lock file at {}: {e}", self.lock_path),
            }),
        }
    }

    /// Marker recorded by this guard.
    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Check whether it is safe to remove state guarded by `lock_path`.
    ///
    /// Refuses while the recorded holder process is still alive, unless
    /// `force` is set. Used by cleanup tooling, never by `acquire`.
    pub fn can_clean(lock_path: &Utf8Path, force: bool) -> Result<(), LockError> {
        if let Some(info) = Self::read_info(lock_path)? {
            if !force && process_alive(info.pid) {
                return Err(LockError::HeldByLiveProcess {
                    path: lock_path.to_string(),
                    run_id: info.run_id,
                    pid: info.pid,
                });
            }
        }
        Ok(())
    }

    /// Remove a lock marker regardless of holder (emergency cleanup).
    pub fn force_remove(lock_path: &Utf8Path) -> Result<(), LockError> {
        match fs::remove_file(lock_path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: format!("Failed to force remove lock at {lock_path}: {e}"),
            }),
        }
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .field("_fd_lock", &"<RwLock>")
            .finish()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Drop the descriptor lock first, then remove the marker
        // (ignore errors in drop).
        self._fd_lock.take();
        if self.lock_path.as_std_path().exists() {
            let _ = fs::remove_file(self.lock_path.as_std_path());
        }
    }
}

/// Best-effort process liveness probe for cleanup decisions.
fn process_alive(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessesToUpdate, System};
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system.process(target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("pipeline.lock")).unwrap()
    }

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let lock = RunLock::acquire(&path, "run-1", Duration::ZERO, POLL).unwrap();
        assert!(RunLock::exists(&path));
        assert_eq!(lock.info().run_id, "run-1");
        assert_eq!(lock.info().pid, process::id());

        lock.release().unwrap();
        assert!(!RunLock::exists(&path));

        // Reacquirable after release
        let _lock2 = RunLock::acquire(&path, "run-2", Duration::ZERO, POLL).unwrap();
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let _held = RunLock::acquire(&path, "holder", Duration::ZERO, POLL).unwrap();
        let result = RunLock::acquire(&path, "waiter", Duration::from_millis(50), POLL);
        match result {
            Err(LockError::Timeout { holder, .. }) => assert_eq!(holder, "holder"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_fails_fast_on_occupied_path() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        fs::write(path.as_std_path(), "occupied").unwrap();

        let result = RunLock::acquire(&path, "run-1", Duration::ZERO, POLL);
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let held = RunLock::acquire(&path, "first", Duration::ZERO, POLL).unwrap();
        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            RunLock::acquire(&waiter_path, "second", Duration::from_secs(5), POLL)
        });
        std::thread::sleep(Duration::from_millis(30));
        held.release().unwrap();

        let lock = waiter.join().unwrap().unwrap();
        assert_eq!(lock.info().run_id, "second");
    }

    #[test]
    fn concurrent_acquires_yield_exactly_one_holder() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    RunLock::acquire(&path, &format!("run-{i}"), Duration::ZERO, POLL)
                })
            })
            .collect();

        // Guards returned by winners stay alive in `results` until the
        // count is taken, so losers cannot sneak in after a release.
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn drop_removes_marker() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        {
            let _lock = RunLock::acquire(&path, "run-1", Duration::ZERO, POLL).unwrap();
            assert!(RunLock::exists(&path));
        }
        assert!(!RunLock::exists(&path));
    }

    #[test]
    fn marker_round_trips_lock_info() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        let _lock = RunLock::acquire(&path, "run-abc", Duration::ZERO, POLL).unwrap();

        let info = RunLock::read_info(&path).unwrap().unwrap();
        assert_eq!(info.run_id, "run-abc");
        assert_eq!(info.pid, process::id());
    }

    #[test]
    fn read_info_on_missing_path_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(RunLock::read_info(&lock_path(&dir)).unwrap().is_none());
    }

    #[test]
    fn can_clean_refuses_live_holder_without_force() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        let _lock = RunLock::acquire(&path, "run-1", Duration::ZERO, POLL).unwrap();

        let result = RunLock::can_clean(&path, false);
        assert!(matches!(result, Err(LockError::HeldByLiveProcess { .. })));
        assert!(RunLock::can_clean(&path, true).is_ok());
    }

    #[test]
    fn can_clean_allows_dead_holder() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        let stale = LockInfo {
            run_id: "dead-run".to_string(),
            pid: u32::MAX - 1,
            acquired_at_utc: Utc::now(),
        };
        fs::write(
            path.as_std_path(),
            serde_json::to_string_pretty(&stale).unwrap(),
        )
        .unwrap();

        assert!(RunLock::can_clean(&path, false).is_ok());
        RunLock::force_remove(&path).unwrap();
        assert!(!RunLock::exists(&path));
    }
}
