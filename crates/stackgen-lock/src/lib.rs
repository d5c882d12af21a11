//! Advisory commit lock for a stackgen base directory
//!
//! Two generators pointed at the same base directory would otherwise both
//! pick the same next version. The lock serializes only the commit step
//! (re-check target, rename staging dir); staging itself runs unlocked.
//!
//! The lock file is created with `create_new`, so at most one process holds
//! it at a time. An `fd-lock` write lock is taken on the open handle as well.
//! The lock is advisory: it coordinates stackgen processes but is not a
//! security boundary.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// File name of the lock inside the base directory
pub const LOCK_FILE_NAME: &str = ".stackgen.lock";

/// Age after which a leftover lock is treated as abandoned (in seconds)
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 600;

/// Lock information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Process ID that created the lock
    pub pid: u32,
    /// Seconds since UNIX epoch when the lock was created
    pub created_at: u64,
    /// What the holder is doing, e.g. `commit stack-v3`
    pub purpose: String,
    /// stackgen version that created the lock
    pub stackgen_version: String,
}

/// Lock errors
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Base directory is locked by PID {pid} ({purpose}, {age_secs}s ago)")]
    Held {
        pid: u32,
        purpose: String,
        age_secs: u64,
    },

    #[error("Lock file is corrupted or invalid: {reason}")]
    Corrupted { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive lock on a base directory, released on drop
#[derive(Debug)]
pub struct BaseLock {
    lock_path: Utf8PathBuf,
    fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl BaseLock {
    /// Acquire the lock for `base` with the default stale threshold.
    pub fn acquire(base: &Utf8Path, purpose: &str) -> Result<Self, LockError> {
        Self::acquire_with_threshold(base, purpose, DEFAULT_STALE_THRESHOLD_SECS)
    }

    /// Acquire the lock for `base`.
    ///
    /// An existing lock file younger than `stale_after_secs` yields
    /// [`LockError::Held`]. An older one is removed and acquisition retried
    /// once. The base directory must already exist.
    pub fn acquire_with_threshold(
        base: &Utf8Path,
        purpose: &str,
        stale_after_secs: u64,
    ) -> Result<Self, LockError> {
        let lock_path = Self::lock_path(base);

        for attempt in 0..2 {
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(lock_path.as_std_path())
            {
                Ok(file) => {
                    let info = LockInfo {
                        pid: process::id(),
                        created_at: now_secs(),
                        purpose: purpose.to_string(),
                        stackgen_version: env!("CARGO_PKG_VERSION").to_string(),
                    };
                    return Self::finalize(lock_path, file, info);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let Some(existing) = Self::read_info(base)? else {
                        // Removed between create_new and read
                        continue;
                    };
                    let age_secs = now_secs().saturating_sub(existing.created_at);
                    if attempt == 0 && age_secs > stale_after_secs {
                        remove_stale(&lock_path)?;
                        continue;
                    }
                    return Err(LockError::Held {
                        pid: existing.pid,
                        purpose: existing.purpose,
                        age_secs,
                    });
                }
                Err(e) => return Err(LockError::Io(e)),
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!("lock at {lock_path} kept reappearing"),
        })
    }

    fn finalize(
        lock_path: Utf8PathBuf,
        lock_file: fs::File,
        info: LockInfo,
    ) -> Result<Self, LockError> {
        let lock_json =
            serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to serialize lock info: {e}"),
            })?;

        let mut rw_lock = Box::new(RwLock::new(lock_file));
        {
            let guard = match rw_lock.try_write() {
                Ok(guard) => guard,
                Err(e) => {
                    let _ = fs::remove_file(lock_path.as_std_path());
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("fd lock unavailable: {e}"),
                    });
                }
            };
            let mut file_ref = &*guard;
            file_ref.write_all(lock_json.as_bytes())?;
            file_ref.flush()?;
            file_ref.sync_all()?;
        }

        Ok(Self {
            lock_path,
            fd_lock: Some(rw_lock),
            info,
        })
    }

    /// Read the current holder's information, if any
    pub fn read_info(base: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        let lock_path = Self::lock_path(base);
        let content = match fs::read_to_string(lock_path.as_std_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::Io(e)),
        };

        // A holder that has created the file but not yet written it
        if content.trim().is_empty() {
            return Ok(Some(LockInfo {
                pid: 0,
                created_at: now_secs(),
                purpose: "starting".to_string(),
                stackgen_version: String::new(),
            }));
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LockError::Corrupted {
                reason: format!("{lock_path}: {e}"),
            })
    }

    /// Path of the lock file for `base`
    #[must_use]
    pub fn lock_path(base: &Utf8Path) -> Utf8PathBuf {
        base.join(LOCK_FILE_NAME)
    }

    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Release the lock, reporting removal failures
    pub fn release(mut self) -> Result<(), LockError> {
        self.fd_lock.take();
        match fs::remove_file(self.lock_path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::Io(e)),
        }
    }
}

impl Drop for BaseLock {
    fn drop(&mut self) {
        if self.fd_lock.take().is_some() {
            let _ = fs::remove_file(self.lock_path.as_std_path());
        }
    }
}

fn remove_stale(lock_path: &Utf8Path) -> Result<(), LockError> {
    let stale_path = lock_path.with_extension(format!("stale.{}", process::id()));
    match fs::rename(lock_path.as_std_path(), stale_path.as_std_path()) {
        Ok(()) => {
            let _ = fs::remove_file(stale_path.as_std_path());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::AcquisitionFailed {
            reason: format!("Failed to clear stale lock {lock_path}: {e}"),
        }),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
