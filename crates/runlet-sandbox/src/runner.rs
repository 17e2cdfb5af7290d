//! Node child-process execution with framed output capture.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use runlet_core::types::ExecutionResult;

use crate::error::{SandboxError, SandboxResult};
use crate::workspace::{Workspace, WRAPPER_FILE};
use crate::wrapper::wrapper_source;

/// Report of one sandboxed run.
#[derive(Debug)]
pub struct RunReport {
    pub result: ExecutionResult,
    pub execution_time_ms: u64,
}

/// Seam over guest execution so the pipeline can be exercised without a
/// real interpreter.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Populate `workspace` with the user program and input, execute it
    /// under `timeout_ms`, and classify the framed output.
    async fn run(
        &self,
        workspace: &Workspace,
        code: &str,
        items: &Value,
        timeout_ms: u64,
        keep_raw_streams: bool,
    ) -> SandboxResult<RunReport>;
}

/// Executes guest code with the Node.js interpreter.
#[derive(Debug, Clone)]
pub struct NodeRunner {
    node_binary: String,
}

impl NodeRunner {
    pub fn new() -> Self {
        Self {
            node_binary: "node".to_string(),
        }
    }

    /// Override the interpreter binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.node_binary = binary.into();
        self
    }

    /// Version string of the configured interpreter (`node --version`).
    pub async fn interpreter_version(&self) -> SandboxResult<String> {
        let output = Command::new(&self.node_binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| SandboxError::SpawnFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(SandboxError::SpawnFailed(format!(
                "{} --version exited with {}",
                self.node_binary, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn populate(&self, workspace: &Workspace, code: &str, items: &Value) -> SandboxResult<()> {
        tokio::fs::write(workspace.user_code_path(), code).await?;
        tokio::fs::write(workspace.input_path(), serde_json::to_vec(items)?).await?;
        tokio::fs::write(workspace.wrapper_path(), wrapper_source()).await?;
        Ok(())
    }

    async fn wait_for_child(
        &self,
        workspace: &Workspace,
        timeout_ms: u64,
    ) -> SandboxResult<std::process::Output> {
        let child = Command::new(&self.node_binary)
            .arg(WRAPPER_FILE)
            .current_dir(workspace.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::SpawnFailed(e.to_string()))?;

        // dropping the future on timeout drops the child, which kills it
        match tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait_with_output())
            .await
        {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(SandboxError::SpawnFailed(err.to_string())),
            Err(_) => Err(SandboxError::Timeout(timeout_ms)),
        }
    }
}

impl Default for NodeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for NodeRunner {
    #[instrument(skip(self, code, items), fields(workspace = %workspace.path().display()))]
    async fn run(
        &self,
        workspace: &Workspace,
        code: &str,
        items: &Value,
        timeout_ms: u64,
        keep_raw_streams: bool,
    ) -> SandboxResult<RunReport> {
        self.populate(workspace, code, items).await?;

        let started = Instant::now();
        let result = match self.wait_for_child(workspace, timeout_ms).await {
            Ok(output) => {
                if keep_raw_streams {
                    write_debug_log(workspace, &output).await;
                }
                classify_output(
                    output.status.success(),
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                )
            }
            Err(err @ SandboxError::Timeout(_)) => {
                debug!(timeout_ms, "Guest execution hit its deadline");
                ExecutionResult::failure(err.to_string())
            }
            Err(SandboxError::SpawnFailed(reason)) => {
                warn!(error = %reason, "Could not spawn interpreter");
                ExecutionResult::failure(reason)
            }
            Err(err) => return Err(err),
        };

        #[allow(clippy::cast_possible_truncation)]
        let execution_time_ms = started.elapsed().as_millis() as u64;

        Ok(RunReport {
            result,
            execution_time_ms,
        })
    }
}

/// Map child exit state and streams onto a framed result.
///
/// A clean exit with a silent stderr means the wrapper's stdout frame is
/// authoritative; anything else means the failure frame (or raw stderr
/// noise) on the diagnostic stream wins.
fn classify_output(exited_clean: bool, stdout: &str, stderr: &str) -> ExecutionResult {
    if exited_clean && stderr.trim().is_empty() {
        match serde_json::from_str::<ExecutionResult>(stdout.trim()) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, raw = %stdout.trim(), "Unparsable output frame");
                ExecutionResult::failure("Invalid output format")
            }
        }
    } else {
        match serde_json::from_str::<ExecutionResult>(stderr.trim()) {
            Ok(result) => result,
            Err(_) => {
                let detail = stderr.trim();
                if detail.is_empty() {
                    ExecutionResult::failure("Unknown execution error")
                } else {
                    ExecutionResult::failure(detail)
                }
            }
        }
    }
}

/// Side-channel copy of the raw child streams, for debug requests.
async fn write_debug_log(workspace: &Workspace, output: &std::process::Output) {
    let body = format!(
        "exit: {}\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    if let Err(err) = tokio::fs::write(workspace.debug_log_path(), body).await {
        warn!(error = %err, "Failed to write debug side-channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceManager;

    #[test]
    fn clean_exit_with_valid_frame_passes_through() {
        let result = classify_output(
            true,
            r#"{"success":true,"data":[2,4,6],"console":[]}"#,
            "",
        );
        assert!(result.success);
        assert_eq!(result.data, Some(serde_json::json!([2, 4, 6])));
    }

    #[test]
    fn clean_exit_with_garbage_stdout_is_invalid_format() {
        let result = classify_output(true, "not json at all", "");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Invalid output format"));
    }

    #[test]
    fn failure_frame_on_stderr_wins() {
        let frame = r#"{"success":false,"error":"boom","stack":"Error: boom","console":[]}"#;
        let result = classify_output(false, "", frame);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.stack.is_some());
    }

    #[test]
    fn stderr_noise_on_clean_exit_still_fails() {
        let result = classify_output(true, r#"{"success":true,"console":[]}"#, "segfault-ish noise");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("segfault-ish noise"));
    }

    #[test]
    fn silent_nonzero_exit_is_unknown_error() {
        let result = classify_output(false, "", "");
        assert_eq!(result.error.as_deref(), Some("Unknown execution error"));
    }

    #[cfg(unix)]
    mod with_fake_interpreter {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        /// An executable that ignores its argument and behaves like a
        /// scripted interpreter run.
        fn fake_interpreter(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-node");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn framed_success_is_returned() {
            let dir = tempfile::tempdir().unwrap();
            let manager = WorkspaceManager::new(dir.path().join("exec"), 0);
            let workspace = manager.allocate().await.unwrap();

            let binary = fake_interpreter(
                dir.path(),
                r#"echo '{"success":true,"data":42,"console":[]}'"#,
            );
            let runner = NodeRunner::new().with_binary(binary);

            let report = runner
                .run(&workspace, "ignored", &serde_json::json!([]), 5_000, false)
                .await
                .unwrap();

            assert!(report.result.success);
            assert_eq!(report.result.data, Some(serde_json::json!(42)));
        }

        #[tokio::test]
        async fn deadline_kills_the_child() {
            let dir = tempfile::tempdir().unwrap();
            let manager = WorkspaceManager::new(dir.path().join("exec"), 0);
            let workspace = manager.allocate().await.unwrap();

            let binary = fake_interpreter(dir.path(), "sleep 30");
            let runner = NodeRunner::new().with_binary(binary);

            let started = Instant::now();
            let report = runner
                .run(&workspace, "ignored", &serde_json::json!([]), 300, false)
                .await
                .unwrap();

            assert!(started.elapsed() < Duration::from_secs(5));
            assert!(!report.result.success);
            assert!(report.result.error.unwrap().contains("timed out"));
        }

        #[tokio::test]
        async fn missing_interpreter_reports_spawn_failure() {
            let dir = tempfile::tempdir().unwrap();
            let manager = WorkspaceManager::new(dir.path().join("exec"), 0);
            let workspace = manager.allocate().await.unwrap();

            let runner = NodeRunner::new().with_binary("/nonexistent/interpreter");
            let report = runner
                .run(&workspace, "ignored", &serde_json::json!([]), 1_000, false)
                .await
                .unwrap();

            assert!(!report.result.success);
            assert!(report.result.error.is_some());
        }

        #[tokio::test]
        async fn debug_run_writes_the_side_channel() {
            let dir = tempfile::tempdir().unwrap();
            let manager = WorkspaceManager::new(dir.path().join("exec"), 0);
            let workspace = manager.allocate().await.unwrap();

            let binary = fake_interpreter(
                dir.path(),
                r#"echo '{"success":true,"data":null,"console":[]}'"#,
            );
            let runner = NodeRunner::new().with_binary(binary);

            runner
                .run(&workspace, "ignored", &serde_json::json!([]), 5_000, true)
                .await
                .unwrap();

            let log = std::fs::read_to_string(workspace.debug_log_path()).unwrap();
            assert!(log.contains("--- stdout ---"));
        }
    }
}
