//! Cross-process table lock
//!
//! Every store operation holds an exclusive advisory lock on
//! `<table>.lock` for its whole load/mutate/save cycle. The lock is taken on
//! a fresh file handle each time, so it serializes threads of one process as
//! well as separate processes. Acquisition polls until `timeout` elapses
//! instead of blocking forever behind a stuck holder.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

/// Delay between acquisition attempts
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Named lock guarding one table file
#[derive(Debug, Clone)]
pub struct TableLock {
    path: PathBuf,
    timeout: Duration,
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl TableLock {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// Lock guarding `table_path`, stored beside it as `<table>.lock`
    pub fn for_table(table_path: &Path, timeout: Duration) -> Self {
        let mut name = table_path.as_os_str().to_owned();
        name.push(".lock");
        Self::new(PathBuf::from(name), timeout)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the lock, waiting at most `timeout`
    pub fn acquire(&self) -> StorageResult<LockGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    StorageError::CreateDirectory {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| StorageError::from_io(e, self.path.clone()))?;

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    if attempts > 0 {
                        warn!(
                            "Waited {:?} for lock {:?} ({} attempts)",
                            started.elapsed(),
                            self.path,
                            attempts + 1
                        );
                    } else {
                        debug!("Acquired lock {:?}", self.path);
                    }
                    return Ok(LockGuard {
                        file,
                        path: self.path.clone(),
                    });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(StorageError::from_io(e, self.path.clone())),
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(StorageError::LockTimeout {
                    path: self.path.clone(),
                    waited,
                });
            }
            attempts += 1;
            thread::sleep(POLL_INTERVAL.min(self.timeout - waited));
        }
    }
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {:?}: {}", self.path, e);
        } else {
            debug!("Released lock {:?}", self.path);
        }
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_sits_beside_table() {
        let lock = TableLock::for_table(Path::new("/data/Catalogo.csv"), Duration::from_secs(1));
        assert_eq!(lock.path(), Path::new("/data/Catalogo.csv.lock"));
    }

    #[test]
    fn test_acquire_and_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock = TableLock::for_table(&temp_dir.path().join("t.csv"), Duration::from_secs(1));

        let guard = lock.acquire().unwrap();
        assert!(guard.path().exists());
        drop(guard);

        // Released on drop, so a second acquisition succeeds at once
        lock.acquire().unwrap();
    }

    #[test]
    fn test_contended_lock_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let lock = TableLock::for_table(&temp_dir.path().join("t.csv"), Duration::from_millis(120));

        let _held = lock.acquire().unwrap();
        let started = Instant::now();
        let err = lock.acquire().unwrap_err();

        assert!(matches!(err, StorageError::LockTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_waiter_gets_lock_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock = TableLock::for_table(&temp_dir.path().join("t.csv"), Duration::from_secs(5));

        let held = lock.acquire().unwrap();
        let waiter = {
            let lock = lock.clone();
            thread::spawn(move || lock.acquire().map(|_| ()))
        };

        thread::sleep(Duration::from_millis(100));
        drop(held);

        assert!(waiter.join().unwrap().is_ok());
    }
}
