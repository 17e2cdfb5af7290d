//! The request pipeline: extract dependencies, allocate a workspace,
//! resolve, execute, merge telemetry, then reclaim or retain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, instrument};

use runlet_core::bytes::format_size;
use runlet_core::types::{
    CacheDebug, DebugInfo, ExecuteRequest, ExecutionDebug, ExecutionResult, ServerDebug,
};
use runlet_core::ServiceConfig;
use runlet_deps::cache::CacheManager;
use runlet_deps::extract::{extract_dependencies, DependencySet};
use runlet_deps::resolver::DependencyResolver;
use runlet_deps::DepsError;
use runlet_sandbox::runner::{NodeRunner, Runner};
use runlet_sandbox::workspace::{Workspace, WorkspaceManager};

use crate::scrub::scrub_stack;

/// Owns the per-request pipeline and the long-lived resource managers.
pub struct Orchestrator {
    config: Arc<ServiceConfig>,
    resolver: DependencyResolver,
    workspaces: WorkspaceManager,
    runner: Arc<dyn Runner>,
    node_version: String,
}

impl Orchestrator {
    pub fn new(config: Arc<ServiceConfig>, node_version: String) -> Self {
        let cache = CacheManager::new(config.cache_dir.clone(), config.cache_size_limit);
        Self {
            resolver: DependencyResolver::new(cache),
            workspaces: WorkspaceManager::new(
                config.execution_dir.clone(),
                config.prune_max_count,
            ),
            runner: Arc::new(NodeRunner::new()),
            node_version,
            config,
        }
    }

    /// Swap the guest runner implementation.
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    /// Run one validated request through the pipeline. Every outcome,
    /// including infrastructure failures, is rendered as an
    /// [`ExecutionResult`]; the workspace is reclaimed (or retained for
    /// pruning) no matter which path was taken.
    #[instrument(skip(self, request), fields(cache_key = %request.cache_key))]
    pub async fn execute(&self, request: ExecuteRequest) -> ExecutionResult {
        let started = Instant::now();
        let start_time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let timeout_ms = request
            .options
            .timeout
            .filter(|t| *t > 0)
            .unwrap_or(self.config.default_timeout_ms);

        let deps = extract_dependencies(&request.code);

        let workspace = match self.workspaces.allocate().await {
            Ok(workspace) => workspace,
            Err(err) => {
                error!(error = %err, "Workspace allocation failed");
                return ExecutionResult::failure(format!("Failed to allocate workspace: {err}"));
            }
        };

        let result = self
            .run_in_workspace(&request, &workspace, &deps, timeout_ms, started, &start_time)
            .await;

        if self.workspaces.retention_enabled() {
            debug!(workspace = %workspace.path().display(), "Retaining workspace");
        } else {
            self.workspaces.remove(&workspace).await;
        }

        result
    }

    async fn run_in_workspace(
        &self,
        request: &ExecuteRequest,
        workspace: &Workspace,
        deps: &DependencySet,
        timeout_ms: u64,
        started: Instant,
        start_time: &str,
    ) -> ExecutionResult {
        let mut used_cache = false;
        let mut installed = BTreeMap::new();

        let install_started = Instant::now();
        let resolved = self
            .resolver
            .resolve(
                deps,
                workspace.path(),
                &request.cache_key,
                request.options.force_update,
            )
            .await;
        #[allow(clippy::cast_possible_truncation)]
        let install_ms = install_started.elapsed().as_millis() as u64;

        let (mut result, execution_ms) = match resolved {
            Ok(outcome) => {
                used_cache = outcome.used_cache;
                installed = outcome.installed_versions;
                match self
                    .runner
                    .run(
                        workspace,
                        &request.code,
                        &request.items,
                        timeout_ms,
                        request.options.debug,
                    )
                    .await
                {
                    Ok(report) => (report.result, report.execution_time_ms),
                    Err(err) => {
                        error!(error = %err, "Runner infrastructure failure");
                        (ExecutionResult::failure(err.to_string()), 0)
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Dependency resolution failed");
                let message = match err {
                    DepsError::InstallFailed(detail) => detail,
                    other => other.to_string(),
                };
                (ExecutionResult::failure(message), 0)
            }
        };

        if let Some(stack) = result.stack.take() {
            result.stack = Some(scrub_stack(&stack, workspace.path()));
        }

        if request.options.debug {
            result.debug = Some(
                self.build_debug(
                    &request.cache_key,
                    deps.is_empty(),
                    used_cache,
                    installed,
                    install_ms,
                    execution_ms,
                    started,
                    start_time,
                )
                .await,
            );
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_debug(
        &self,
        cache_key: &str,
        deps_empty: bool,
        used_cache: bool,
        installed_dependencies: BTreeMap<String, String>,
        dependency_install_time_ms: u64,
        execution_time_ms: u64,
        started: Instant,
        start_time: &str,
    ) -> DebugInfo {
        // a dependency-free request never touches the cache root, so its
        // sizes are reported as zero rather than measured
        let (current, total) = if deps_empty {
            (0, 0)
        } else {
            let cache = self.resolver.cache().clone();
            let key = cache_key.to_string();
            tokio::task::spawn_blocking(move || {
                (cache.entry_info(&key).size_bytes, cache.total_size())
            })
            .await
            .unwrap_or((0, 0))
        };

        #[allow(clippy::cast_possible_truncation)]
        let total_response_time_ms = started.elapsed().as_millis() as u64;

        DebugInfo {
            server: ServerDebug {
                node_version: self.node_version.clone(),
            },
            cache: CacheDebug {
                used_cache,
                cache_key: cache_key.to_string(),
                current_cache_size: current,
                current_cache_size_formatted: format_size(current),
                total_cache_size: total,
                total_cache_size_formatted: format_size(total),
            },
            execution: ExecutionDebug {
                start_time: start_time.to_string(),
                installed_dependencies,
                dependency_install_time_ms,
                total_response_time_ms,
                execution_time_ms,
            },
        }
    }
}
