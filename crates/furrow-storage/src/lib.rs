//! Local key-value storage for Furrow clients.
//!
//! Backends:
//! - **File**: a single JSON document under the Furrow base directory
//! - **Memory**: process-local map, used by tests and ephemeral sessions

mod file;
mod keys;
mod memory;
mod snapshot;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use snapshot::{ProviderSessionMeta, SnapshotManager};
pub use traits::LocalStorage;

use furrow_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage at `paths.storage_file()`.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn LocalStorage>> {
    let storage = FileStorage::open(paths.storage_file())?;
    Ok(Box::new(storage))
}

/// Create a SnapshotManager over the default file-backed storage.
pub fn create_snapshot_manager(paths: &Paths) -> StorageResult<SnapshotManager> {
    let storage = create_storage(paths)?;
    Ok(SnapshotManager::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_snapshot_manager_uses_storage_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let manager = create_snapshot_manager(&paths).unwrap();
        manager.set_access_token("token-1").unwrap();

        assert!(paths.storage_file().exists());
        let reopened = create_snapshot_manager(&paths).unwrap();
        assert_eq!(
            reopened.get_access_token().unwrap(),
            Some("token-1".to_string())
        );
    }

    #[test]
    fn test_serde_error_maps_to_encoding() {
        let err: StorageError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StorageError::Encoding(_)));
    }
}
