//! Directory-scoped advisory lock with bounded wait.
//!
//! # Invariants
//! - The lock lives in `<root>/.lock` and is released when the guard drops.
//! - Acquisition never blocks longer than the caller's timeout.

use crate::repo::{RepoError, RepoResult};
use log::warn;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

pub const LOCK_FILE_NAME: &str = ".lock";

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock over one storage root.
#[derive(Debug)]
pub struct DirLock {
    file: File,
}

impl DirLock {
    /// Acquires the lock for `dir`, polling until `timeout` elapses.
    ///
    /// # Errors
    /// - `LockTimeout` when another handle keeps the lock past `timeout`.
    /// - `Io` when the lock file cannot be opened or locked.
    pub fn acquire(dir: &Path, timeout: Duration) -> RepoResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                RepoError::io(format!("open lock file `{}`", path.display()), err)
            })?;

        let started_at = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(Self { file }),
                Err(TryLockError::WouldBlock) => {
                    let waited = started_at.elapsed();
                    if waited >= timeout {
                        warn!(
                            "event=lock_timeout module=filestore status=error waited_ms={}",
                            waited.as_millis()
                        );
                        return Err(RepoError::LockTimeout { path, waited });
                    }
                    thread::sleep(RETRY_INTERVAL.min(timeout - waited));
                }
                Err(TryLockError::Error(err)) => {
                    return Err(RepoError::io(
                        format!("lock `{}`", path.display()),
                        err,
                    ));
                }
            }
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::{DirLock, LOCK_FILE_NAME};
    use crate::repo::RepoError;
    use std::time::Duration;

    #[test]
    fn second_acquire_times_out_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let _held = DirLock::acquire(dir.path(), Duration::from_secs(1)).unwrap();
        assert!(dir.path().join(LOCK_FILE_NAME).is_file());

        let err = DirLock::acquire(dir.path(), Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, RepoError::LockTimeout { .. }));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(DirLock::acquire(dir.path(), Duration::from_secs(1)).unwrap());

        DirLock::acquire(dir.path(), Duration::from_millis(50)).unwrap();
    }
}
