use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use tempfile::NamedTempFile;

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::Storage;

/// Environment variable naming the directory used by [`FileStorage::new_default`].
pub const STORAGE_DIR_ENV: &str = "PARKWATCH_STORAGE_DIR";

/// Directory-backed storage: the value of `key` lives in `<base_path>/<key>.json`.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create storage dir {}: {}", base_path.display(), e);
            StorageError::WriteFailed(format!("{}: {}", base_path.display(), e))
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Construct FileStorage using env var PARKWATCH_STORAGE_DIR if set, otherwise current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
            info!("Using FileStorage from {}: {}", STORAGE_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::ReadFailed(e.to_string())
        })?;
        info!("Using FileStorage at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let well_formed = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.item_path(key)?;
        let mut content = String::new();
        match File::open(&path) {
            Ok(mut f) => f.read_to_string(&mut content).map_err(|e| {
                error!("Failed to read {}: {}", path.display(), e);
                StorageError::ReadFailed(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!("Failed to open {}: {}", path.display(), e);
                return Err(StorageError::ReadFailed(format!("{}: {}", path.display(), e)));
            }
        };
        debug!("Read {} byte(s) from {}", content.len(), path.display());
        Ok(Some(content))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        let write_failed = |e: std::io::Error| {
            error!("Failed to write {}: {}", path.display(), e);
            StorageError::WriteFailed(format!("{}: {}", path.display(), e))
        };
        // Staged next to the target so the final rename stays on one filesystem.
        let mut staged = NamedTempFile::new_in(&self.base_path).map_err(write_failed)?;
        staged.write_all(value.as_bytes()).map_err(write_failed)?;
        staged.as_file().sync_all().map_err(write_failed)?;
        staged.persist(&path).map_err(|e| write_failed(e.error))?;
        debug!("Wrote {} byte(s) to {}", value.len(), path.display());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!("Failed to remove {}: {}", path.display(), e);
                Err(StorageError::WriteFailed(format!("{}: {}", path.display(), e)))
            }
        }
    }
}
