//! Dependency resolution error types.

use thiserror::Error;

/// Errors that can occur while materialising dependencies.
#[derive(Debug, Error)]
pub enum DepsError {
    /// Package manager exited non-zero; carries its captured diagnostics
    #[error("Dependency installation failed: {0}")]
    InstallFailed(String),

    /// Package manager binary could not be started
    #[error("Failed to spawn package manager: {0}")]
    SpawnFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest serialization error
    #[error("Failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type DepsResult<T> = Result<T, DepsError>;
