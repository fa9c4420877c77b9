//! Command runner trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};

/// Executes external commands and captures their output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError>;

    /// Run the command, killing it if it exceeds the timeout
    async fn run_with_timeout(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;
}
