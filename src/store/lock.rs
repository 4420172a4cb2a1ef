use crate::error::{Result, StudyError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a subject directory, released on drop
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    pub const FILE_NAME: &'static str = ".store.lock";

    /// Lock `dir`, waiting up to `timeout` for another holder
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self> {
        let file = open_lock_file(dir)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLock { file }),
                Err(_) if start.elapsed() < timeout => std::thread::sleep(POLL_INTERVAL),
                Err(_) => return Err(StudyError::StoreLocked),
            }
        }
    }

    /// Same as `acquire`, but waits on the tokio timer instead of the thread
    pub async fn acquire_async(dir: &Path, timeout: Duration) -> Result<Self> {
        let file = open_lock_file(dir)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLock { file }),
                Err(_) if start.elapsed() < timeout => tokio::time::sleep(POLL_INTERVAL).await,
                Err(_) => return Err(StudyError::StoreLocked),
            }
        }
    }
}

fn open_lock_file(dir: &Path) -> Result<File> {
    let lock_path = dir.join(StoreLock::FILE_NAME);
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)
        .map_err(|e| StudyError::persistence(&lock_path, e))
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
