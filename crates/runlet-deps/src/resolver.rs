//! npm dependency materialisation against the keyed cache.
//!
//! The resolver makes a workspace's `node_modules` match the request's
//! dependency set: by linking in a complete cache entry when one exists,
//! or by running `npm install` in the workspace and repopulating the cache
//! entry from the result.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheManager;
use crate::error::{DepsError, DepsResult};
use crate::extract::DependencySet;

const NODE_MODULES: &str = "node_modules";
const MANIFEST: &str = "package.json";

/// Outcome of one resolution: whether the cache entry covered the set, and
/// the versions actually present on disk afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    pub used_cache: bool,
    pub installed_versions: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DependencyResolver {
    cache: CacheManager,
    npm_binary: String,
}

impl DependencyResolver {
    pub fn new(cache: CacheManager) -> Self {
        Self {
            cache,
            npm_binary: if cfg!(windows) {
                "npm.cmd".to_string()
            } else {
                "npm".to_string()
            },
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Make `deps` available inside `workspace`, preferring the cache
    /// entry named by `cache_key`.
    #[instrument(skip(self, deps, workspace), fields(cache_key = %cache_key, deps = deps.len()))]
    pub async fn resolve(
        &self,
        deps: &DependencySet,
        workspace: &Path,
        cache_key: &str,
        force_update: bool,
    ) -> DepsResult<ResolveOutcome> {
        if deps.is_empty() {
            return Ok(ResolveOutcome::default());
        }

        let entry_path = self.cache.entry_path(cache_key);
        let cached_modules = entry_path.join(NODE_MODULES);
        let workspace_modules = workspace.join(NODE_MODULES);

        if !force_update && entry_covers(&cached_modules, deps) {
            match link_or_copy(&cached_modules, &workspace_modules).await {
                Ok(()) => {
                    debug!("Reusing cache entry");
                    let installed_versions =
                        read_installed_versions(&workspace_modules, deps).await;
                    return Ok(ResolveOutcome {
                        used_cache: true,
                        installed_versions,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Cache reuse failed, falling back to fresh install");
                }
            }
        }

        self.install_fresh(deps, workspace, &entry_path, force_update)
            .await?;
        let installed_versions = read_installed_versions(&workspace_modules, deps).await;
        Ok(ResolveOutcome {
            used_cache: false,
            installed_versions,
        })
    }

    /// Install into the workspace via npm, then repopulate the cache entry
    /// from the freshly installed tree.
    async fn install_fresh(
        &self,
        deps: &DependencySet,
        workspace: &Path,
        entry_path: &Path,
        force_update: bool,
    ) -> DepsResult<()> {
        write_manifest(workspace, deps).await?;

        info!(deps = deps.len(), "Installing dependencies");
        let output = Command::new(&self.npm_binary)
            .args(["install", "--no-audit", "--no-fund", "--loglevel", "error"])
            .current_dir(workspace)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DepsError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("npm exited with {}", output.status)
            } else {
                stderr
            };
            return Err(DepsError::InstallFailed(detail));
        }

        if !force_update {
            let cache = self.cache.clone();
            let freed = tokio::task::spawn_blocking(move || cache.sweep())
                .await
                .unwrap_or_else(|err| {
                    warn!(error = %err, "Cache sweep task failed");
                    0
                });
            if freed > 0 {
                debug!(freed, "Sweep reclaimed cache space");
            }
        }

        // Last-writer-wins repopulation; a concurrent request on the same
        // key may race here, and the completeness probe on the next read
        // is the safeguard against observing a partial entry.
        let _ = tokio::fs::remove_dir_all(entry_path).await;
        if let Err(err) = tokio::fs::create_dir_all(entry_path).await {
            warn!(error = %err, "Failed to create cache entry, skipping repopulation");
            return Ok(());
        }

        let src = workspace.join(NODE_MODULES);
        let dst = entry_path.join(NODE_MODULES);
        let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst)).await;
        match copied {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Failed to repopulate cache entry"),
            Err(err) => warn!(error = %err, "Cache repopulation task failed"),
        }

        Ok(())
    }
}

/// Reuse-completeness probe: every requested package must be present with
/// its own metadata file. Advisory only; a racing writer can still
/// invalidate the entry between probe and link.
fn entry_covers(modules_dir: &Path, deps: &DependencySet) -> bool {
    if !modules_dir.is_dir() {
        return false;
    }
    deps.keys().all(|name| {
        if let Some((scope, _)) = name.split_once('/') {
            if name.starts_with('@') && !modules_dir.join(scope).is_dir() {
                return false;
            }
        }
        let pkg_dir = modules_dir.join(name);
        pkg_dir.is_dir() && pkg_dir.join(MANIFEST).is_file()
    })
}

/// Write the workspace `package.json` naming `deps`.
async fn write_manifest(workspace: &Path, deps: &DependencySet) -> DepsResult<()> {
    let manifest = serde_json::json!({
        "name": "runlet-workspace",
        "version": "1.0.0",
        "private": true,
        "dependencies": deps,
    });
    let body = serde_json::to_vec_pretty(&manifest)?;
    tokio::fs::write(workspace.join(MANIFEST), body).await?;
    Ok(())
}

/// Symlink `src` at `dst`, falling back to a recursive copy where symlinks
/// are unavailable or fail.
async fn link_or_copy(src: &Path, dst: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        match tokio::fs::symlink(src, dst).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(error = %err, "Symlink failed, copying instead");
            }
        }
    }
    #[cfg(windows)]
    {
        match tokio::fs::symlink_dir(src, dst).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(error = %err, "Symlink failed, copying instead");
            }
        }
    }

    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst))
        .await
        .map_err(std::io::Error::other)?
}

/// Recursive directory copy preserving relative symlinks (npm trees use
/// them for `.bin` shims).
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            {
                let target = std::fs::read_link(&from)?;
                std::os::unix::fs::symlink(target, &to)?;
            }
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

/// Read the version each package actually landed at, from its own
/// metadata file. Packages whose metadata cannot be read are skipped.
async fn read_installed_versions(
    modules_dir: &Path,
    deps: &DependencySet,
) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    for name in deps.keys() {
        let manifest_path = modules_dir.join(name).join(MANIFEST);
        let body = match tokio::fs::read(&manifest_path).await {
            Ok(body) => body,
            Err(err) => {
                warn!(package = %name, error = %err, "Could not read package metadata");
                continue;
            }
        };
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(manifest) => {
                if let Some(version) = manifest.get("version").and_then(|v| v.as_str()) {
                    versions.insert(name.clone(), version.to_string());
                }
            }
            Err(err) => {
                warn!(package = %name, error = %err, "Invalid package metadata");
            }
        }
    }
    versions
}
