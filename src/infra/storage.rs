//! Filesystem-backed single-slot draft storage.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::{
    application::adapters::{SnapshotStore, StorageError},
    domain::drafts::DraftSnapshot,
};

/// Stores the draft as one JSON document, replaced atomically on every save
/// so a crash mid-write cannot corrupt the previous copy.
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_vec(snapshot)?;

        // Stage next to the destination so the rename stays on one filesystem.
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(directory)?;
        staged.write_all(&payload)?;
        staged
            .persist(&self.path)
            .map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, StorageError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "unreadable snapshot treated as absent"
                );
                Ok(None)
            }
        }
    }

    /// Remove the slot. A missing file is treated as success.
    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
