//! Sandbox error types.

use thiserror::Error;

/// Errors that can occur while preparing or running a guest execution.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Guest interpreter could not be started
    #[error("Failed to spawn interpreter: {0}")]
    SpawnFailed(String),

    /// Wall-clock deadline expired
    #[error("Execution timed out after {0}ms")]
    Timeout(u64),

    /// Input value could not be serialised for the guest
    #[error("Failed to serialise input: {0}")]
    Input(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;
