//! Core error types for roverlink-core

use std::path::PathBuf;

use thiserror::Error;

use roverlink_exec::ExecError;

/// Errors from provisioning and state persistence
#[derive(Error, Debug)]
pub enum CoreError {
    /// Cached event id could not be written
    #[error("failed to write state file {path}: {source}")]
    StateWrite {
        /// State file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Secret token file could not be written
    #[error("failed to write token file {path}: {source}")]
    TokenWrite {
        /// Token file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// External tool exited non-zero on every attempt
    #[error("provisioning tool failed after {attempts} attempt(s)")]
    ProvisioningFailed {
        /// Number of attempts made
        attempts: u32,
    },

    /// External tool could not be run at all
    #[error("provisioning tool error: {0}")]
    Exec(#[from] ExecError),
}
