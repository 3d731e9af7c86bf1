//! Cross-process run lock.
//!
//! Cron may start a new invocation while the previous one is still running.
//! The lock file makes the second invocation back off instead of running a
//! concurrent pass.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Default age after which a lock file is considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(1800);

#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock.
    #[error("run lock {} is held{}", .path.display(), holder_suffix(.pid))]
    Held { path: PathBuf, pid: Option<u32> },

    #[error("run lock I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

fn holder_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" by pid {}", p)).unwrap_or_default()
}

/// A lock file guarding against overlapping passes.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RunLock {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Take over lock files older than `stale_after`.
    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock. The returned guard releases it on drop.
    pub fn acquire(&self) -> Result<RunLockGuard, LockError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut took_over = false;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    debug!(path = %self.path.display(), "Acquired run lock");
                    return Ok(RunLockGuard {
                        path: self.path.clone(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !took_over && self.is_stale()? {
                        self.take_over()?;
                        took_over = true;
                        continue;
                    }
                    return Err(self.held());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a stale lock file while holding the takeover marker.
    ///
    /// Two invocations can both see the same stale lock. Only the one holding
    /// the marker removes it, and only after checking again that it is still
    /// stale, so a lock recreated in between is left alone.
    fn take_over(&self) -> Result<(), LockError> {
        let marker = self.takeover_path();
        let _marker = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
        {
            Ok(_) => RunLockGuard {
                path: marker.clone(),
            },
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Left behind by an invocation that died mid-takeover.
                if is_older_than(&marker, self.stale_after)? {
                    warn!(path = %marker.display(), "Removing abandoned takeover marker");
                    remove_if_present(&marker)?;
                }
                return Err(self.held());
            }
            Err(e) => return Err(e.into()),
        };

        if !self.is_stale()? {
            debug!(path = %self.path.display(), "Run lock was renewed before takeover");
            return Err(self.held());
        }
        warn!(
            path = %self.path.display(),
            stale_after_secs = self.stale_after.as_secs(),
            "Taking over stale run lock"
        );
        remove_if_present(&self.path)
    }

    fn takeover_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".takeover");
        PathBuf::from(name)
    }

    fn held(&self) -> LockError {
        LockError::Held {
            path: self.path.clone(),
            pid: self.holder(),
        }
    }

    fn is_stale(&self) -> Result<bool, LockError> {
        is_older_than(&self.path, self.stale_after)
    }

    fn holder(&self) -> Option<u32> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

/// True when `path` was last modified at least `age` ago, or no longer exists.
fn is_older_than(path: &Path, age: Duration) -> Result<bool, LockError> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        // Released between our open and this check.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    Ok(modified.elapsed().unwrap_or_default() >= age)
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Releases the run lock when dropped.
#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let lock = RunLock::new(dir.path().join("run.lock"));

        let guard = lock.acquire().unwrap();
        let err = lock.acquire().unwrap_err();
        match err {
            LockError::Held { pid, .. } => assert_eq!(pid, Some(std::process::id())),
            other => panic!("unexpected error: {other}"),
        }

        drop(guard);
        assert!(!lock.path().exists());
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");
        fs::write(&path, "424242\n").unwrap();

        let lock = RunLock::new(&path).stale_after(Duration::ZERO);
        let guard = lock.acquire().unwrap();
        let pid = fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
        drop(guard);
    }

    fn backdate(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_takeover_in_progress_elsewhere_backs_off() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");
        fs::write(&path, "424242\n").unwrap();
        backdate(&path, Duration::from_secs(3600));

        let lock = RunLock::new(&path).stale_after(Duration::from_secs(60));
        fs::write(lock.takeover_path(), "").unwrap();

        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, LockError::Held { pid: Some(424242), .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "424242\n");
    }

    #[test]
    fn test_renewed_lock_is_not_removed_by_takeover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");
        let lock = RunLock::new(&path).stale_after(Duration::from_secs(60));

        // Stale when first seen, then released and recreated by another run.
        fs::write(&path, "424242\n").unwrap();
        backdate(&path, Duration::from_secs(3600));
        assert!(lock.is_stale().unwrap());
        fs::remove_file(&path).unwrap();
        fs::write(&path, "515151\n").unwrap();

        let err = lock.take_over().unwrap_err();
        assert!(matches!(err, LockError::Held { pid: Some(515151), .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "515151\n");
        assert!(!lock.takeover_path().exists());
    }

    #[test]
    fn test_abandoned_takeover_marker_is_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");
        fs::write(&path, "424242\n").unwrap();
        backdate(&path, Duration::from_secs(3600));

        let lock = RunLock::new(&path).stale_after(Duration::from_secs(60));
        let marker = lock.takeover_path();
        fs::write(&marker, "").unwrap();
        backdate(&marker, Duration::from_secs(3600));

        assert!(lock.acquire().is_err());
        assert!(!marker.exists());

        let guard = lock.acquire().unwrap();
        let pid = fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
        drop(guard);
    }

    #[test]
    fn test_fresh_foreign_lock_is_respected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");
        fs::write(&path, "424242\n").unwrap();

        let lock = RunLock::new(&path);
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, LockError::Held { pid: Some(424242), .. }));
        assert!(err.to_string().contains("by pid 424242"));
        assert!(path.exists());
    }
}
