//! Persisted key-value cache with atomic writes and one backup generation.
//!
//! The on-disk layout around a canonical `<name>.cache` path:
//! - `<name>.cache-tmp`: transient write target, fsynced before rename
//! - `<name>.cache-prev`: previous generation, retained until the next write
//! - `<name>.lock`: derived instance-lock path (see [`crate::lock`])

use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Required suffix for cache file names.
pub const CACHE_SUFFIX: &str = ".cache";
/// Appended to the canonical path for the transient write target.
pub const TMP_SUFFIX: &str = "-tmp";
/// Appended to the canonical path for the backup generation.
pub const PREV_SUFFIX: &str = "-prev";
/// Substituted for [`CACHE_SUFFIX`] to derive the lock path.
pub const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache filenames must end in {CACHE_SUFFIX}: {0}")]
    InvalidName(PathBuf),
    #[error("corrupt cache file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode cache for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cache i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cache not initialized; call init_cache first")]
    NotInitialized,
}

/// True when `path` follows the cache naming convention.
pub fn has_cache_suffix(path: &Path) -> bool {
    path.to_string_lossy().ends_with(CACHE_SUFFIX)
}

/// Derive the instance-lock path for a cache path by suffix substitution,
/// so cache and lock identity are always 1:1.
pub fn lock_path(cache_path: &Path) -> Result<PathBuf, CacheError> {
    let name = cache_path.to_string_lossy();
    let stem = name
        .strip_suffix(CACHE_SUFFIX)
        .ok_or_else(|| CacheError::InvalidName(cache_path.to_path_buf()))?;
    Ok(PathBuf::from(format!("{stem}{LOCK_SUFFIX}")))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// In-memory key-value snapshot mirrored to a `.cache` file.
///
/// The map is mutated freely by the host between writes; nothing is flushed
/// implicitly. [`CacheStore::write`] persists the whole map atomically.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: HashMap<String, Value>,
}

impl CacheStore {
    /// Validate the path's suffix and load the existing cache if present,
    /// otherwise start with an empty map.
    ///
    /// A file that exists but does not decode is reported as
    /// [`CacheError::Corrupt`] rather than silently replaced: falling back
    /// to an empty map would let the next write clobber the only good
    /// backup generation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        if !has_cache_suffix(&path) {
            return Err(CacheError::InvalidName(path));
        }
        let entries = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| CacheError::Io {
                path: path.clone(),
                source: e,
            })?;
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                source: e,
            })?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "cache loaded");
        Ok(Self { path, entries })
    }

    /// Canonical on-disk path of this cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole map, for free-form host access.
    pub fn entries(&self) -> &HashMap<String, Value> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.entries
    }

    /// Write the in-memory map to disk atomically.
    ///
    /// Sequence: serialize to `<path>-tmp` and fsync it, rename the current
    /// file (if any) to `<path>-prev`, rename the tmp file into place.
    /// Rename is atomic on the same filesystem, so a valid file exists at
    /// the canonical path at every observable instant and the previous
    /// generation stays recoverable until the next write.
    pub fn write(&self) -> Result<(), CacheError> {
        let tmp = sibling(&self.path, TMP_SUFFIX);
        let prev = sibling(&self.path, PREV_SUFFIX);

        let bytes = serde_json::to_vec(&self.entries).map_err(|e| CacheError::Encode {
            path: self.path.clone(),
            source: e,
        })?;

        let mut fd = File::create(&tmp).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fd.write_all(&bytes).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fd.sync_all().map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        drop(fd);

        if self.path.exists() {
            fs::rename(&self.path, &prev).map_err(|e| CacheError::Io {
                path: prev.clone(),
                source: e,
            })?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| CacheError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "cache written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_rejects_bad_suffix() {
        for name in ["prices.cash", "prices", "prices.cache.bak", "cache"] {
            let err = CacheStore::open(name).unwrap_err();
            assert!(matches!(err, CacheError::InvalidName(_)), "{name}");
        }
    }

    #[test]
    fn test_open_missing_starts_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("btc.cache")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("btc.cache");

        let mut store = CacheStore::open(&path).unwrap();
        store.insert("last_price", json!(64123.5));
        store.insert("open_orders", json!(["a1", "a2"]));
        store.write().unwrap();

        let reloaded = CacheStore::open(&path).unwrap();
        assert_eq!(reloaded.entries(), store.entries());
    }

    #[test]
    fn test_backup_holds_previous_generation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("btc.cache");

        let mut store = CacheStore::open(&path).unwrap();
        for n in 0..3 {
            store.insert("gen", json!(n));
            store.write().unwrap();
        }

        let prev = sibling(&path, PREV_SUFFIX);
        assert!(prev.exists());
        assert!(!sibling(&path, TMP_SUFFIX).exists());

        let prev_map: HashMap<String, Value> =
            serde_json::from_slice(&fs::read(&prev).unwrap()).unwrap();
        assert_eq!(prev_map["gen"], json!(1));

        let current = CacheStore::open(&path).unwrap();
        assert_eq!(current.get("gen"), Some(&json!(2)));
    }

    #[test]
    fn test_first_write_leaves_no_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("btc.cache");

        let mut store = CacheStore::open(&path).unwrap();
        store.insert("k", json!(1));
        store.write().unwrap();

        assert!(path.exists());
        assert!(!sibling(&path, PREV_SUFFIX).exists());
    }

    #[test]
    fn test_corrupt_file_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("btc.cache");
        fs::write(&path, b"not json at all").unwrap();

        let err = CacheStore::open(&path).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_store_is_debug_printable() {
        let dir = tempdir().unwrap();
        let store = CacheStore::open(dir.path().join("btc.cache")).unwrap();
        assert!(format!("{store:?}").contains("CacheStore"));
    }

    #[test]
    fn test_lock_path_derivation() {
        let lock = lock_path(Path::new("/data/btc.cache")).unwrap();
        assert_eq!(lock, PathBuf::from("/data/btc.lock"));

        assert!(lock_path(Path::new("/data/btc.db")).is_err());
    }
}
