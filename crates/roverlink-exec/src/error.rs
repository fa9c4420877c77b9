//! Error types for roverlink-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running an external command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Binary was not found on the PATH
    #[error("command not found: {0}")]
    NotFound(String),

    /// Process could not be spawned
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    /// I/O error while waiting for the process
    #[error("I/O error: {0}")]
    Io(String),

    /// Command exceeded its timeout
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}
