//! Local command execution using `tokio::process`

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};
use crate::traits::CommandRunner;

/// Runs commands on the local machine via `tokio::process::Command`
#[derive(Debug, Clone)]
pub struct LocalRunner;

impl LocalRunner {
    /// Create a new local runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(command = %spec.display()), level = "debug")]
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!("executing local command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            // If the surrounding timeout fires and this future is dropped,
            // the child must not outlive the run.
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExecError::NotFound(spec.program.clone()),
            _ => ExecError::Spawn(e.to_string()),
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::Io(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(status, ?duration, "command completed");

        if !output.status.success() {
            error!(status, stderr = %stderr, "command failed");
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        self.execute(spec).await
    }

    async fn run_with_timeout(
        &self,
        spec: &CommandSpec,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        match timeout(timeout_duration, self.execute(spec)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %spec.display(),
                    timeout = ?timeout_duration,
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }
}
