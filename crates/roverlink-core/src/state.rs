//! Cached event-id persistence

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use roverlink_client::EventId;

use crate::error::CoreError;

/// Single-file store for the cached event id.
///
/// Sole owner of the state file; one reader, one writer, no concurrent
/// access. Writes are plain overwrites, not crash-atomic: the next run
/// re-queries the control plane and re-derives correctness either way.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached event id.
    ///
    /// A missing file, an empty file, or an unreadable file all mean
    /// "never successfully configured"; read errors are logged, not
    /// surfaced, so a corrupt cache can only trigger a re-provision.
    pub fn load(&self) -> Option<EventId> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let id = EventId::new(&content);
                if id.is_empty() {
                    None
                } else {
                    info!(event_id = %id, "found cached event id");
                    Some(id)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "error reading cached event id");
                None
            }
        }
    }

    /// Persist the event id, creating parent directories as needed
    ///
    /// # Errors
    /// Returns `CoreError::StateWrite` if the directory or file cannot be
    /// written.
    pub fn save(&self, event_id: &EventId) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CoreError::StateWrite {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, event_id.as_str()).map_err(|source| CoreError::StateWrite {
            path: self.path.clone(),
            source,
        })?;
        info!(event_id = %event_id, "cached event id");
        Ok(())
    }
}
