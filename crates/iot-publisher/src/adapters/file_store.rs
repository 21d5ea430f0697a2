//! File backed identity and node stores.
//!
//! One JSON file per publisher:
//!
//! - `<folder>/<publisherID>-identity.json`, owner read-only on unix
//! - `<folder>/<publisherID>-nodes.json`

use crate::ports::outbound::{IdentityStore, NodeStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{FullIdentity, Node};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identity files in one folder.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    folder: PathBuf,
}

impl FileIdentityStore {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    /// Path of the identity file of `publisher_id`.
    #[must_use]
    pub fn path(&self, publisher_id: &str) -> PathBuf {
        self.folder.join(format!("{publisher_id}-identity.json"))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load_identity(&self, publisher_id: &str) -> Result<FullIdentity, StoreError> {
        read_json(&self.path(publisher_id))
    }

    /// Remove-then-write. A crash in between leaves no file, and the next
    /// start generates a fresh identity; it never leaves a partial one.
    fn save_identity(&self, identity: &FullIdentity) -> Result<(), StoreError> {
        let path = self.path(&identity.identity.publisher_id);
        write_json(&path, identity)?;
        restrict_to_owner(&path)?;
        debug!(path = %path.display(), "Identity saved");
        Ok(())
    }
}

/// Node snapshots in one folder.
#[derive(Debug, Clone)]
pub struct FileNodeStore {
    folder: PathBuf,
}

impl FileNodeStore {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    /// Path of the node snapshot of `publisher_id`.
    #[must_use]
    pub fn path(&self, publisher_id: &str) -> PathBuf {
        self.folder.join(format!("{publisher_id}-nodes.json"))
    }
}

impl NodeStore for FileNodeStore {
    fn load_nodes(&self, publisher_id: &str) -> Result<Vec<Node>, StoreError> {
        read_json(&self.path(publisher_id))
    }

    fn save_nodes(&self, publisher_id: &str, nodes: &[Node]) -> Result<(), StoreError> {
        let path = self.path(publisher_id);
        write_json(&path, &nodes)?;
        debug!(path = %path.display(), nodes = nodes.len(), "Nodes saved");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.display().to_string()))
        }
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_error(path, e)),
    }
    std::fs::write(path, bytes).map_err(|e| io_error(path, e))
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o400))
        .map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
fn restrict_to_owner(path: &Path) -> Result<(), StoreError> {
    let mut permissions = std::fs::metadata(path)
        .map_err(|e| io_error(path, e))?
        .permissions();
    permissions.set_readonly(true);
    std::fs::set_permissions(path, permissions).map_err(|e| io_error(path, e))
}
