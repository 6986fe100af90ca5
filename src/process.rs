//! Subprocess execution for the devops tools.

use crate::error::{ToolError, ToolResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error};

/// Runs commands in a fixed working directory and captures their output.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workspace_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Run `program` with `args` and return its stdout.
    ///
    /// A non-zero exit fails with `"<context>: <stderr>"`.
    pub async fn run(&self, program: &str, args: &[String], context: &str) -> ToolResult<String> {
        let start = Instant::now();
        debug!(
            program,
            args = ?args,
            cwd = %self.workspace_dir.display(),
            "Running command"
        );

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.workspace_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                error!(program, error = %e, "{}", context);
                ToolError::command_failed_with(format!(
                    "{}: failed to start {}: {}",
                    context, program, e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            debug!(
                program,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Command finished"
            );
            Ok(stdout)
        } else {
            error!(
                program,
                exit_code = ?output.status.code(),
                "{}: {}",
                context,
                stderr.trim_end()
            );
            Err(ToolError::command_failed_with(format!(
                "{}: {}",
                context, stderr
            )))
        }
    }
}
