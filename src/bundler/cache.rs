//! Source and transform caches reused across rebuilds

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::transform::Transformed;

/// File stamp used to detect on-disk changes between builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl Stamp {
    fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Read-through cache of module sources
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: Mutex<HashMap<PathBuf, (Stamp, Arc<Vec<u8>>)>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file, reusing the cached bytes while its stamp is unchanged
    pub fn load(&self, path: &Path) -> io::Result<Arc<Vec<u8>>> {
        let stamp = Stamp::of(path)?;

        if let Some((cached, content)) = self.entries.lock().get(path) {
            if *cached == stamp {
                return Ok(content.clone());
            }
        }

        let content = Arc::new(fs::read(path)?);
        self.entries
            .lock()
            .insert(path.to_path_buf(), (stamp, content.clone()));

        Ok(content)
    }

    /// Forget cached sources
    pub fn invalidate(&self, paths: &[PathBuf]) {
        let mut entries = self.entries.lock();
        for path in paths {
            entries.remove(path);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Transform results keyed by module path and source hash
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: DashMap<PathBuf, (String, Arc<Transformed>)>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for a path, if it was produced from `source_hash`
    pub fn get(&self, path: &Path, source_hash: &str) -> Option<Arc<Transformed>> {
        self.entries
            .get(path)
            .filter(|entry| entry.0 == source_hash)
            .map(|entry| entry.1.clone())
    }

    pub fn insert(&self, path: PathBuf, source_hash: String, transformed: Arc<Transformed>) {
        self.entries.insert(path, (source_hash, transformed));
    }

    pub fn invalidate(&self, paths: &[PathBuf]) {
        for path in paths {
            self.entries.remove(path);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_cache_reuses_and_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "one").unwrap();

        let cache = SourceCache::new();
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        fs::write(&path, "two!").unwrap();
        cache.invalidate(&[path.clone()]);
        assert_eq!(cache.load(&path).unwrap().as_slice(), b"two!");
    }

    #[test]
    fn test_source_cache_detects_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "one").unwrap();

        let cache = SourceCache::new();
        cache.load(&path).unwrap();
        fs::write(&path, "a longer body").unwrap();
        assert_eq!(cache.load(&path).unwrap().as_slice(), b"a longer body");
    }

    #[test]
    fn test_transform_cache_checks_hash() {
        let cache = TransformCache::new();
        let path = PathBuf::from("/p/a.js");
        let out = Arc::new(Transformed {
            code: "x".into(),
            assets: Vec::new(),
        });
        cache.insert(path.clone(), "h1".into(), out);

        assert!(cache.get(&path, "h1").is_some());
        assert!(cache.get(&path, "h2").is_none());
        cache.invalidate(&[path.clone()]);
        assert!(cache.get(&path, "h1").is_none());
        assert_eq!(cache.len(), 0);
    }
}
