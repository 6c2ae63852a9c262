//! Content-addressed cache for transformation results.
//!
//! A cache entry is keyed by the transform's name, its option fingerprint and
//! the SHA-256 of the input bytes, so an unchanged file processed with
//! unchanged options is never transformed twice. Entries live under
//! `<dir>/<transform>/<first two hex digits>/<key>`.

use crate::transform::{Transform, TransformError};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Error during cache operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// IO error
    #[error("Cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The transformation behind a cache miss failed
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Entry counts reported by [`TransformCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// On-disk transformation cache.
#[derive(Debug, Clone)]
pub struct TransformCache {
    dir: PathBuf,
}

impl TransformCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compute the cache key for `input` processed by `transform`.
    pub fn key(transform: &dyn Transform, input: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(transform.name().as_bytes());
        hasher.update([0]);
        hasher.update(transform.fingerprint().as_bytes());
        hasher.update([0]);
        hasher.update(input);
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.dir.join(namespace).join(&key[..2]).join(key)
    }

    /// Look up a cached result.
    pub fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(namespace, key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Store a result. The entry appears atomically (write to temp, rename).
    pub fn put(&self, namespace: &str, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(namespace, key);
        let io_error = |source| CacheError::Io { path: path.clone(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        // Unique per writer: identical inputs may be stored from several threads
        static NEXT_TMP: AtomicU64 = AtomicU64::new(0);
        let serial = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{}-{}", std::process::id(), serial));
        fs::write(&tmp, bytes).map_err(io_error)?;
        fs::rename(&tmp, &path).map_err(io_error)?;
        Ok(())
    }

    /// Return the cached result for `input`, transforming and storing it on a miss.
    pub fn get_or_apply(
        &self,
        transform: &dyn Transform,
        path: &Path,
        input: &[u8],
    ) -> Result<(Vec<u8>, CacheStatus), CacheError> {
        let key = Self::key(transform, input);
        if let Some(bytes) = self.get(transform.name(), &key)? {
            tracing::trace!(file = %path.display(), "cache hit");
            return Ok((bytes, CacheStatus::Hit));
        }

        let output = transform.apply(path, input)?;
        self.put(transform.name(), &key, &output)?;
        Ok((output, CacheStatus::Miss))
    }

    /// Remove every cache entry. A cache that does not exist is already clear.
    pub fn clear_all(&self) -> Result<CacheStats, CacheError> {
        let stats = self.stats()?;
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(stats),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CacheStats::default()),
            Err(source) => Err(CacheError::Io { path: self.dir.clone(), source }),
        }
    }

    /// Count entries and bytes currently stored.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        if self.dir.exists() {
            self.accumulate(&self.dir, &mut stats)?;
        }
        Ok(stats)
    }

    fn accumulate(&self, dir: &Path, stats: &mut CacheStats) -> Result<(), CacheError> {
        let io_error = |source| CacheError::Io { path: dir.to_path_buf(), source };
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let meta = entry.metadata().map_err(io_error)?;
            if meta.is_dir() {
                self.accumulate(&entry.path(), stats)?;
            } else {
                stats.entries += 1;
                stats.bytes += meta.len();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Uppercases input and counts how often it ran.
    struct Upper {
        calls: AtomicUsize,
        option: &'static str,
    }

    impl Transform for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn fingerprint(&self) -> String {
            self.option.to_string()
        }

        fn apply(&self, _path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.to_ascii_uppercase())
        }
    }

    fn upper(option: &'static str) -> Upper {
        Upper { calls: AtomicUsize::new(0), option }
    }

    #[test]
    fn test_second_lookup_is_hit() {
        let temp = TempDir::new().unwrap();
        let cache = TransformCache::new(temp.path().join("cache"));
        let transform = upper("");

        let (first, status) = cache.get_or_apply(&transform, Path::new("a"), b"abc").unwrap();
        assert_eq!(status, CacheStatus::Miss);
        let (second, status) = cache.get_or_apply(&transform, Path::new("a"), b"abc").unwrap();
        assert_eq!(status, CacheStatus::Hit);

        assert_eq!(first, b"ABC");
        assert_eq!(first, second);
        assert_eq!(transform.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_key_depends_on_content_and_options() {
        let a = TransformCache::key(&upper("x"), b"one");
        assert_eq!(a, TransformCache::key(&upper("x"), b"one"));
        assert_ne!(a, TransformCache::key(&upper("x"), b"two"));
        assert_ne!(a, TransformCache::key(&upper("y"), b"one"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_clear_all_removes_entries() {
        let temp = TempDir::new().unwrap();
        let cache = TransformCache::new(temp.path().join("cache"));
        let transform = upper("");
        cache.get_or_apply(&transform, Path::new("a"), b"abc").unwrap();
        cache.get_or_apply(&transform, Path::new("b"), b"defg").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats, CacheStats { entries: 2, bytes: 7 });

        let cleared = cache.clear_all().unwrap();
        assert_eq!(cleared.entries, 2);
        assert!(!cache.dir().exists());

        let (_, status) = cache.get_or_apply(&transform, Path::new("a"), b"abc").unwrap();
        assert_eq!(status, CacheStatus::Miss);
    }

    #[test]
    fn test_clear_missing_cache_is_ok() {
        let temp = TempDir::new().unwrap();
        let cache = TransformCache::new(temp.path().join("never-created"));
        assert_eq!(cache.clear_all().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_failed_transform_is_not_cached() {
        struct Fails;
        impl Transform for Fails {
            fn name(&self) -> &'static str {
                "fails"
            }
            fn apply(&self, path: &Path, _input: &[u8]) -> Result<Vec<u8>, TransformError> {
                Err(TransformError::NotUtf8(path.to_path_buf()))
            }
        }

        let temp = TempDir::new().unwrap();
        let cache = TransformCache::new(temp.path().join("cache"));
        assert!(cache.get_or_apply(&Fails, Path::new("x"), b"x").is_err());
        assert_eq!(cache.stats().unwrap().entries, 0);
    }
}
