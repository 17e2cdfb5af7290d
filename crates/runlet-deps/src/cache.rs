//! Keyed dependency cache with budget-driven eviction.
//!
//! Each subdirectory of the cache root is one entry, named by the client's
//! cache key and holding a materialised `node_modules` tree. Entries are
//! evicted whole, least-recently-modified first, whenever the root exceeds
//! its byte budget.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use runlet_core::bytes::format_size;
use runlet_core::fs_size::dir_size;

/// Observed state of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// [`CacheEntry`] lookup result for a specific key.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub exists: bool,
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
    budget_bytes: u64,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>, budget_bytes: u64) -> Self {
        Self {
            root: root.into(),
            budget_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory an entry for `key` lives (or would live) at.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Enumerate current entries with their on-disk size and mtime.
    pub fn list(&self) -> Vec<CacheEntry> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(root = %self.root.display(), error = %err, "Cache root not readable");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_dir() {
                    return None;
                }
                Some(CacheEntry {
                    key: entry.file_name().to_string_lossy().into_owned(),
                    size_bytes: dir_size(&path),
                    modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    path,
                })
            })
            .collect()
    }

    pub fn entry_info(&self, key: &str) -> CacheEntryInfo {
        let path = self.entry_path(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => CacheEntryInfo {
                exists: true,
                key: key.to_string(),
                size_bytes: dir_size(&path),
                modified: meta.modified().ok(),
                path,
            },
            _ => CacheEntryInfo {
                exists: false,
                key: key.to_string(),
                size_bytes: 0,
                modified: None,
                path,
            },
        }
    }

    /// Total bytes currently stored under the cache root.
    pub fn total_size(&self) -> u64 {
        self.list().iter().map(|e| e.size_bytes).sum()
    }

    /// Evict least-recently-modified entries until the cache is a fifth of
    /// its budget below the limit, so the next install does not
    /// immediately re-trigger eviction. Returns the bytes freed.
    pub fn sweep(&self) -> u64 {
        let mut entries = self.list();
        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        if total <= self.budget_bytes {
            return 0;
        }

        let target = (total - self.budget_bytes) + self.budget_bytes / 5;
        info!(
            total = %format_size(total),
            budget = %format_size(self.budget_bytes),
            target = %format_size(target),
            "Cache over budget, evicting"
        );

        entries.sort_by_key(|e| e.modified);

        let mut freed = 0u64;
        for entry in entries {
            if freed >= target {
                break;
            }
            match fs::remove_dir_all(&entry.path) {
                Ok(()) => {
                    freed += entry.size_bytes;
                    info!(key = %entry.key, size = %format_size(entry.size_bytes), "Evicted cache entry");
                }
                Err(err) => {
                    warn!(key = %entry.key, error = %err, "Failed to evict cache entry");
                }
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn make_entry(root: &Path, key: &str, bytes: usize, age_rank: u64) {
        let dir = root.join(key);
        fs::create_dir_all(dir.join("node_modules")).unwrap();
        let mut file = File::create(dir.join("node_modules/blob.bin")).unwrap();
        file.write_all(&vec![0u8; bytes]).unwrap();
        // stagger mtimes so eviction order is deterministic
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000 + age_rank);
        let times = fs::FileTimes::new().set_modified(mtime);
        File::open(&dir).unwrap().set_times(times).unwrap();
    }

    #[test]
    fn list_reports_keys_and_sizes() {
        let root = tempfile::tempdir().unwrap();
        make_entry(root.path(), "alpha", 100, 1);
        make_entry(root.path(), "beta", 300, 2);
        File::create(root.path().join("stray.txt")).unwrap();

        let mut entries = CacheManager::new(root.path(), 1024).list();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "alpha");
        assert_eq!(entries[0].size_bytes, 100);
        assert_eq!(entries[1].key, "beta");
        assert_eq!(entries[1].size_bytes, 300);
    }

    #[test]
    fn entry_info_reflects_existence() {
        let root = tempfile::tempdir().unwrap();
        make_entry(root.path(), "here", 64, 1);

        let cache = CacheManager::new(root.path(), 1024);
        assert!(cache.entry_info("here").exists);
        assert_eq!(cache.entry_info("here").size_bytes, 64);
        assert!(!cache.entry_info("missing").exists);
    }

    #[test]
    fn sweep_is_a_noop_under_budget() {
        let root = tempfile::tempdir().unwrap();
        make_entry(root.path(), "small", 100, 1);

        let cache = CacheManager::new(root.path(), 10_000);
        assert_eq!(cache.sweep(), 0);
        assert!(cache.entry_info("small").exists);
    }

    #[test]
    fn sweep_evicts_oldest_first_with_hysteresis() {
        let root = tempfile::tempdir().unwrap();
        make_entry(root.path(), "oldest", 400, 1);
        make_entry(root.path(), "middle", 400, 2);
        make_entry(root.path(), "newest", 400, 3);

        // total 1200 over a 1000 budget: excess 200 + 200 hysteresis = 400,
        // so exactly the oldest entry goes
        let cache = CacheManager::new(root.path(), 1000);
        let freed = cache.sweep();

        assert_eq!(freed, 400);
        assert!(!cache.entry_info("oldest").exists);
        assert!(cache.entry_info("middle").exists);
        assert!(cache.entry_info("newest").exists);
        assert!(cache.total_size() <= 1000);
    }

    #[test]
    fn missing_root_lists_empty() {
        let root = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(root.path().join("nope"), 1024);
        assert!(cache.list().is_empty());
        assert_eq!(cache.sweep(), 0);
    }
}
