//! Single-instance lock derived from the cache path.
//!
//! One live process per configuration: the lock file sits next to the cache
//! it guards (`btc.cache` -> `btc.lock`) and is held for the process
//! lifetime. Contention means a duplicate run, which is fatal since two
//! processes writing one cache would corrupt it.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{self, CacheError};

#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Name(#[from] CacheError),
    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to acquire lock {path}: {source}")]
    Contended {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Exclusive-access guard for one bot configuration.
///
/// The flock is released when the guard drops, so any exit route through
/// the host's shutdown path frees the lock deterministically.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

impl InstanceLock {
    /// Derive the lock path from `cache_path` and take a non-blocking
    /// exclusive lock on it.
    pub fn acquire<P: AsRef<Path>>(cache_path: P) -> Result<Self, LockError> {
        let path = cache::lock_path(cache_path.as_ref())?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| LockError::Open {
                path: path.clone(),
                source: e,
            })?;
        FileExt::try_lock_exclusive(&file).map_err(|e| LockError::Contended {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), "instance lock acquired");
        Ok(Self { path, file })
    }

    /// Take the lock or terminate the process with exit status 1.
    ///
    /// Used at startup where contention is not recoverable.
    pub fn acquire_or_exit<P: AsRef<Path>>(cache_path: P) -> Self {
        match Self::acquire(cache_path) {
            Ok(lock) => lock,
            Err(err) => {
                eprintln!("ERROR: {err}");
                eprintln!("Is another process already running with this config?");
                std::process::exit(1);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %err, "failed to release instance lock");
        }
    }
}
