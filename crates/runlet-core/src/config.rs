//! Service configuration loaded from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bytes::parse_size;

/// Immutable service configuration, captured once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen port
    pub port: u16,
    /// Root directory for per-request workspaces
    pub execution_dir: PathBuf,
    /// Root directory for keyed dependency caches
    pub cache_dir: PathBuf,
    /// Bearer token; `None` disables authentication
    pub secret_key: Option<String>,
    /// Default execution deadline in milliseconds
    pub default_timeout_ms: u64,
    /// Byte budget for the dependency cache
    pub cache_size_limit: u64,
    /// Workspaces retained after execution; 0 deletes them eagerly
    pub prune_max_count: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            execution_dir: std::env::var("EXECUTION_DIR")
                .unwrap_or_else(|_| "./executions".to_string())
                .into(),
            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "./dependencies-cache".to_string())
                .into(),
            secret_key: std::env::var("SECRET_KEY").ok().filter(|k| !k.is_empty()),
            default_timeout_ms: std::env::var("DEFAULT_TIMEOUT")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(60_000),
            cache_size_limit: parse_size(
                &std::env::var("CACHE_SIZE_LIMIT").unwrap_or_else(|_| "1GB".to_string()),
            ),
            prune_max_count: std::env::var("EXECUTIONS_DATA_PRUNE_MAX_COUNT")
                .ok()
                .and_then(|n| n.parse::<i64>().ok())
                .map(|n| n.max(0) as usize)
                .unwrap_or(100),
        }
    }

    pub fn auth_enabled(&self) -> bool {
        self.secret_key.is_some()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            execution_dir: "./executions".into(),
            cache_dir: "./dependencies-cache".into(),
            secret_key: None,
            default_timeout_ms: 60_000,
            cache_size_limit: 1024 * 1024 * 1024,
            prune_max_count: 100,
        }
    }
}
