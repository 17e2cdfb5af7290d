//! On-disk size accounting.

use std::fs;
use std::path::Path;
use tracing::warn;

/// Recursively sum the bytes stored under `root`.
///
/// Symbolic links contribute zero and are never followed, so a cache entry
/// referenced from a workspace via symlink is only counted once. Entries
/// that disappear or cannot be read mid-walk are skipped; the walk itself
/// never fails.
pub fn dir_size(root: &Path) -> u64 {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            // symlink_metadata so links are observed, not followed
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unstatable entry");
                    continue;
                }
            };
            if meta.is_dir() {
                pending.push(path);
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }

    total
}
